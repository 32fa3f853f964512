//! Guest reading plan kept in a local key/value store.
//!
//! The whole plan is one JSON array under a single key, the same blob the web
//! frontend keeps in `localStorage`, so a plan written by either side reads
//! back on the other. Reads fail open: a missing or unparseable value is an
//! empty plan. Writes are last-write-wins with no merge; a failed write is
//! logged and otherwise ignored, since the guest plan is a convenience and
//! must never block the caller.

use crate::book::{BookId, BookSummary};
use crate::status::{HasStatus, PlanStatus};
use crate::storage::KeyValueStore;
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Storage key used by the deployed frontend.
pub const DEFAULT_STORAGE_KEY: &str = "living-books-reading-plan";

/// One book queued by a guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub book: BookSummary,
    #[serde(default)]
    pub status: PlanStatus,
    /// ISO-8601 insertion time.
    #[serde(rename = "addedAt")]
    pub added_at: String,
    #[serde(default)]
    pub notes: String,
}

impl PlanEntry {
    pub fn new(book: BookSummary, added_at: DateTime<Utc>) -> Self {
        Self {
            book,
            status: PlanStatus::ToRead,
            added_at: added_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            notes: String::new(),
        }
    }

    pub fn book_id(&self) -> BookId {
        self.book.id
    }
}

impl HasStatus for PlanEntry {
    fn status(&self) -> PlanStatus {
        self.status
    }
}

/// Local Store Adapter: sole owner of the guest plan key.
#[derive(Clone)]
pub struct LocalPlanStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl LocalPlanStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the stored plan. Never fails: absent, unreadable or corrupt data
    /// all come back as an empty list.
    pub fn load(&self) -> Vec<PlanEntry> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::debug!(key = %self.key, "local plan unreadable: {:#}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<PlanEntry>>(&raw) {
            Ok(entries) => dedupe(entries),
            Err(e) => {
                tracing::debug!(key = %self.key, "local plan unparseable, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Overwrite the stored plan unconditionally.
    pub fn save(&self, entries: &[PlanEntry]) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        self.store.set(&self.key, &json)
    }

    /// Toggle `book` in the plan: removes it when already present, otherwise
    /// appends it as `to-read` with empty notes.
    pub fn add(&self, book: BookSummary) -> Vec<PlanEntry> {
        self.add_at(book, Utc::now())
    }

    pub fn add_at(&self, book: BookSummary, added_at: DateTime<Utc>) -> Vec<PlanEntry> {
        self.toggle_in(self.load(), book, added_at)
    }

    pub fn update_status(&self, book_id: BookId, status: PlanStatus) -> Vec<PlanEntry> {
        self.update_status_in(self.load(), book_id, status)
    }

    pub fn update_notes(&self, book_id: BookId, notes: &str) -> Vec<PlanEntry> {
        self.update_notes_in(self.load(), book_id, notes)
    }

    pub fn remove(&self, book_id: BookId) -> Vec<PlanEntry> {
        self.remove_from(self.load(), book_id)
    }

    // The `*_in` / `*_from` variants apply the change to a list the caller
    // already holds and then persist it, so a store that cannot be written
    // does not make later changes start over from stale data.

    /// Toggle `book` in `entries` and persist the result.
    pub fn toggle_in(
        &self,
        mut entries: Vec<PlanEntry>,
        book: BookSummary,
        added_at: DateTime<Utc>,
    ) -> Vec<PlanEntry> {
        if entries.iter().any(|e| e.book_id() == book.id) {
            tracing::debug!(book_id = book.id, "book already in local plan, removing");
            entries.retain(|e| e.book_id() != book.id);
        } else {
            tracing::debug!(book_id = book.id, "adding book to local plan");
            entries.push(PlanEntry::new(book, added_at));
        }
        self.persist(&entries);
        entries
    }

    pub fn update_status_in(
        &self,
        entries: Vec<PlanEntry>,
        book_id: BookId,
        status: PlanStatus,
    ) -> Vec<PlanEntry> {
        self.modify(entries, book_id, |entry| entry.status = status)
    }

    pub fn update_notes_in(&self, entries: Vec<PlanEntry>, book_id: BookId, notes: &str) -> Vec<PlanEntry> {
        self.modify(entries, book_id, |entry| entry.notes = notes.to_string())
    }

    pub fn remove_from(&self, mut entries: Vec<PlanEntry>, book_id: BookId) -> Vec<PlanEntry> {
        let before = entries.len();
        entries.retain(|e| e.book_id() != book_id);
        if entries.len() != before {
            self.persist(&entries);
        }
        entries
    }

    pub fn contains(&self, book_id: BookId) -> bool {
        self.load().iter().any(|e| e.book_id() == book_id)
    }

    /// Drop the stored key entirely.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!(key = %self.key, "failed to clear local plan: {:#}", e);
        }
    }

    fn modify(
        &self,
        mut entries: Vec<PlanEntry>,
        book_id: BookId,
        apply: impl FnOnce(&mut PlanEntry),
    ) -> Vec<PlanEntry> {
        if let Some(entry) = entries.iter_mut().find(|e| e.book_id() == book_id) {
            apply(entry);
            self.persist(&entries);
        }
        entries
    }

    fn persist(&self, entries: &[PlanEntry]) {
        if let Err(e) = self.save(entries) {
            tracing::warn!(key = %self.key, "failed to persist local plan: {:#}", e);
        }
    }
}

/// Keep the first entry for each book id.
fn dedupe(entries: Vec<PlanEntry>) -> Vec<PlanEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.book_id()))
        .collect()
}
