//! Reconciliation between the guest plan and the account's remote plans.
//!
//! The controller decides which store is authoritative, exposes one unified
//! list of rows to render, routes each mutation to the store that produced
//! the row, and drives the one-time import of guest entries after sign-in.
//!
//! Modes:
//! - `Uninitialized` until [`Controller::mount`] has run.
//! - `Guest` without a session; the local store is canonical.
//! - `AccountEmpty` / `AccountActive` with a session, depending on whether any
//!   remote plan exists. In `AccountActive` the selected plan is canonical.
//!
//! "Pending import" is an overlay on the account modes rather than a mode of
//! its own: it is on whenever a session exists and the local store still
//! holds entries.

use crate::book::{BookId, BookSummary};
use crate::local_plan::{LocalPlanStore, PlanEntry};
use crate::remote::{
    ImportItem, ItemId, ItemUpdate, NewPlan, PlanApi, PlanId, RemoteError, RemotePlan,
    RemotePlanDetail, RemotePlanItem,
};
use crate::session::{Session, SessionSource};
use crate::status::{filter_items, HasStatus, PlanStats, PlanStatus, StatusFilter};
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Uninitialized,
    Guest,
    AccountEmpty,
    AccountActive,
}

/// Server confirmation state of an optimistic remote mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Confirmed,
    Pending,
    /// The server rejected or never received the change. The row keeps the
    /// optimistic value until the next refetch.
    Failed(String),
}

/// Identity of a rendered row, enough to route a mutation back to its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Local(BookId),
    Remote { plan_id: PlanId, item_id: ItemId },
}

/// One row of the unified list.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Local(PlanEntry),
    Remote {
        plan_id: PlanId,
        item: RemotePlanItem,
        sync: SyncState,
    },
}

impl Entry {
    pub fn key(&self) -> EntryKey {
        match self {
            Entry::Local(entry) => EntryKey::Local(entry.book.id),
            Entry::Remote { plan_id, item, .. } => EntryKey::Remote {
                plan_id: *plan_id,
                item_id: item.id,
            },
        }
    }

    pub fn book(&self) -> &BookSummary {
        match self {
            Entry::Local(entry) => &entry.book,
            Entry::Remote { item, .. } => &item.book,
        }
    }

    pub fn notes(&self) -> &str {
        match self {
            Entry::Local(entry) => &entry.notes,
            Entry::Remote { item, .. } => item.notes.as_deref().unwrap_or(""),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Entry::Remote { .. })
    }

    pub fn sync(&self) -> &SyncState {
        match self {
            Entry::Local(_) => &SyncState::Confirmed,
            Entry::Remote { sync, .. } => sync,
        }
    }
}

impl HasStatus for Entry {
    fn status(&self) -> PlanStatus {
        match self {
            Entry::Local(entry) => entry.status,
            Entry::Remote { item, .. } => item.status,
        }
    }
}

/// Issued per plan selection. Only the most recently issued ticket may
/// install its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTicket {
    token: u64,
    plan_id: PlanId,
}

impl SelectionTicket {
    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Sign in to sync your reading plan")]
    NotSignedIn,

    #[error("There are no saved books to import")]
    NothingToImport,

    #[error("No reading plan is selected")]
    NoPlanSelected,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Clone)]
struct RemoteRow {
    item: RemotePlanItem,
    sync: SyncState,
}

pub struct Controller {
    local: LocalPlanStore,
    api: Arc<dyn PlanApi>,
    sessions: Arc<dyn SessionSource>,

    mounted: bool,
    session: Option<Session>,
    guest_entries: Vec<PlanEntry>,

    plans: Vec<RemotePlan>,
    selected: Option<PlanId>,
    rows: Vec<RemoteRow>,
    loading: bool,
    latest_ticket: u64,

    last_error: Option<String>,
}

impl Controller {
    pub fn new(local: LocalPlanStore, api: Arc<dyn PlanApi>, sessions: Arc<dyn SessionSource>) -> Self {
        Self {
            local,
            api,
            sessions,
            mounted: false,
            session: None,
            guest_entries: Vec::new(),
            plans: Vec::new(),
            selected: None,
            rows: Vec::new(),
            loading: false,
            latest_ticket: 0,
            last_error: None,
        }
    }

    /// Initial load. Reads the local store and, if a session exists, the
    /// remote plan list; the two do not depend on each other and run
    /// concurrently.
    pub async fn mount(&mut self) {
        let local = self.local.clone();
        let sessions = self.sessions.clone();
        let api = self.api.clone();

        let (guest_entries, account) = tokio::join!(async move { local.load() }, async move {
            let session = sessions.current().await?;
            let plans = api.list_plans().await;
            Some((session, plans))
        });

        self.guest_entries = guest_entries;
        self.mounted = true;

        match account {
            Some((session, plans)) => self.enter_account(session, plans).await,
            None => self.enter_guest(),
        }
        tracing::info!(
            mode = ?self.mode(),
            guest_entries = self.guest_entries.len(),
            plans = self.plans.len(),
            "reading plan mounted"
        );
    }

    /// React to sign-in or sign-out. After mount the in-memory guest list is
    /// the latest copy and is kept as is.
    pub async fn on_session_change(&mut self, session: Option<Session>) {
        if !self.mounted {
            self.guest_entries = self.local.load();
            self.mounted = true;
        }
        match session {
            Some(session) => {
                let plans = self.api.list_plans().await;
                self.enter_account(session, plans).await;
                if self.pending_import() {
                    tracing::info!(
                        entries = self.guest_entries.len(),
                        "signed in with guest entries pending import"
                    );
                }
            }
            None => self.enter_guest(),
        }
    }

    /// Re-query the session source and apply whatever it says.
    pub async fn refresh_session(&mut self) {
        let session = self.sessions.current().await;
        self.on_session_change(session).await;
    }

    async fn enter_account(&mut self, session: Session, plans: Result<Vec<RemotePlan>, RemoteError>) {
        // Same user again: a refresh rather than a fresh sign-in.
        let refreshing = self.session.as_ref().map(|s| s.user.id) == Some(session.user.id);
        if !refreshing {
            tracing::debug!(user_id = session.user.id, "entering account mode");
        }
        self.session = Some(session);

        let plans = match plans {
            Ok(plans) => plans,
            Err(e) => {
                tracing::warn!("failed to list plans: {}", e);
                self.last_error = Some(e.to_string());
                if refreshing {
                    // Keep showing the last plans and items we had.
                    return;
                }
                Vec::new()
            }
        };

        let keep = self
            .selected
            .filter(|id| refreshing && plans.iter().any(|p| p.id == *id));
        self.plans = plans;
        self.rows.clear();
        self.selected = None;

        if let Some(plan_id) = keep.or_else(|| self.plans.first().map(|p| p.id)) {
            self.select_plan(plan_id).await;
        }
    }

    fn enter_guest(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("leaving account mode");
        }
        self.plans.clear();
        self.rows.clear();
        self.selected = None;
        self.loading = false;
        // Outstanding selection responses belong to the old session.
        self.latest_ticket += 1;
    }

    pub fn mode(&self) -> Mode {
        if !self.mounted {
            Mode::Uninitialized
        } else if self.session.is_none() {
            Mode::Guest
        } else if self.plans.is_empty() {
            Mode::AccountEmpty
        } else {
            Mode::AccountActive
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Signed in while the local store still holds guest entries.
    pub fn pending_import(&self) -> bool {
        self.session.is_some() && !self.guest_entries.is_empty()
    }

    pub fn guest_entries(&self) -> &[PlanEntry] {
        &self.guest_entries
    }

    pub fn plans(&self) -> &[RemotePlan] {
        &self.plans
    }

    pub fn selected_plan(&self) -> Option<&RemotePlan> {
        let id = self.selected?;
        self.plans.iter().find(|p| p.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// The canonical list for the current mode.
    pub fn entries(&self) -> Vec<Entry> {
        match self.mode() {
            Mode::Uninitialized => Vec::new(),
            Mode::Guest => self.guest_entries.iter().cloned().map(Entry::Local).collect(),
            Mode::AccountEmpty | Mode::AccountActive => {
                let Some(plan_id) = self.selected else {
                    return Vec::new();
                };
                self.rows
                    .iter()
                    .map(|row| Entry::Remote {
                        plan_id,
                        item: row.item.clone(),
                        sync: row.sync.clone(),
                    })
                    .collect()
            }
        }
    }

    pub fn filtered(&self, filter: StatusFilter) -> Vec<Entry> {
        filter_items(&self.entries(), filter).into_iter().cloned().collect()
    }

    pub fn stats(&self) -> PlanStats {
        PlanStats::from_items(&self.entries())
    }

    /// Whether `book_id` is in the canonical list.
    pub fn contains_book(&self, book_id: BookId) -> bool {
        self.entries().iter().any(|e| e.book().id == book_id)
    }

    // ----- guest add --------------------------------------------------------

    /// Toggle a book in the guest plan: adding a book that is already there
    /// removes it. Account mode does not share this shortcut; use
    /// [`Controller::add_to_selected`].
    pub fn toggle_local(&mut self, book: BookSummary) -> bool {
        let book_id = book.id;
        let entries = std::mem::take(&mut self.guest_entries);
        self.guest_entries = self.local.toggle_in(entries, book, Utc::now());
        self.guest_entries.iter().any(|e| e.book.id == book_id)
    }

    // ----- selection --------------------------------------------------------

    /// Start switching to `plan_id`. The displayed items are dropped until
    /// the matching [`Controller::finish_select`] lands.
    pub fn begin_select(&mut self, plan_id: PlanId) -> SelectionTicket {
        self.latest_ticket += 1;
        self.selected = Some(plan_id);
        self.rows.clear();
        self.loading = true;
        SelectionTicket {
            token: self.latest_ticket,
            plan_id,
        }
    }

    /// Install a fetched plan detail. Returns `false` and changes nothing when
    /// a newer selection has been issued since `ticket`.
    pub fn finish_select(
        &mut self,
        ticket: SelectionTicket,
        result: Result<RemotePlanDetail, RemoteError>,
    ) -> bool {
        if ticket.token != self.latest_ticket {
            tracing::debug!(
                plan_id = ticket.plan_id,
                token = ticket.token,
                latest = self.latest_ticket,
                "dropping stale plan detail"
            );
            return false;
        }

        self.loading = false;
        match result {
            Ok(detail) => {
                let detail = detail.normalized();
                self.rows = detail
                    .items
                    .into_iter()
                    .map(|item| RemoteRow {
                        item,
                        sync: SyncState::Confirmed,
                    })
                    .collect();
                match self.plans.iter().position(|p| p.id == detail.plan.id) {
                    Some(idx) => self.plans[idx] = detail.plan,
                    None => self.plans.insert(0, detail.plan),
                }
            }
            Err(e) => {
                tracing::warn!(plan_id = ticket.plan_id, "failed to load plan: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
        true
    }

    /// Fetch and show `plan_id`. Guests have no remote plans, so this does
    /// nothing without a session.
    pub async fn select_plan(&mut self, plan_id: PlanId) {
        if self.session.is_none() {
            tracing::debug!(plan_id, "ignoring plan selection without a session");
            return;
        }
        let ticket = self.begin_select(plan_id);
        let api = self.api.clone();
        let result = api.get_plan_detail(plan_id).await;
        self.finish_select(ticket, result);
    }

    // ----- import -----------------------------------------------------------

    /// Move guest entries into a new remote plan.
    ///
    /// All-or-nothing: the local store is cleared only after the server has
    /// created the plan. On failure local entries are untouched and the error
    /// is both returned and recorded for display.
    pub async fn import_local(&mut self) -> Result<RemotePlan, ControllerError> {
        if self.session.is_none() {
            return Err(ControllerError::NotSignedIn);
        }
        let items: Vec<ImportItem> = self.guest_entries.iter().map(ImportItem::from).collect();
        if items.is_empty() {
            return Err(ControllerError::NothingToImport);
        }

        let api = self.api.clone();
        match api.import_local_entries(&items).await {
            Ok(plan) => {
                tracing::info!(plan_id = plan.id, items = items.len(), "imported guest plan");
                self.local.clear();
                self.guest_entries.clear();
                self.plans.retain(|p| p.id != plan.id);
                self.plans.insert(0, plan.clone());
                self.select_plan(plan.id).await;
                Ok(plan)
            }
            Err(e) => {
                tracing::warn!(items = items.len(), "import failed, keeping local entries: {}", e);
                self.last_error = Some(format!("Import failed: {}", e));
                Err(e.into())
            }
        }
    }

    // ----- account plan management -----------------------------------------

    pub async fn create_plan(&mut self, plan: NewPlan) -> Result<RemotePlan, ControllerError> {
        if self.session.is_none() {
            return Err(ControllerError::NotSignedIn);
        }
        let api = self.api.clone();
        let created = api.create_plan(&plan).await.inspect_err(|e| {
            self.last_error = Some(e.to_string());
        })?;
        self.plans.insert(0, created.clone());
        self.select_plan(created.id).await;
        Ok(created)
    }

    pub async fn delete_plan(&mut self, plan_id: PlanId) -> Result<(), ControllerError> {
        if self.session.is_none() {
            return Err(ControllerError::NotSignedIn);
        }
        let api = self.api.clone();
        api.delete_plan(plan_id).await.inspect_err(|e| {
            self.last_error = Some(e.to_string());
        })?;
        self.plans.retain(|p| p.id != plan_id);
        if self.selected == Some(plan_id) {
            self.selected = None;
            self.rows.clear();
            if let Some(next) = self.plans.first().map(|p| p.id) {
                self.select_plan(next).await;
            }
        }
        Ok(())
    }

    /// Add a catalog book to the selected remote plan.
    pub async fn add_to_selected(&mut self, book_id: BookId) -> Result<RemotePlanItem, ControllerError> {
        if self.session.is_none() {
            return Err(ControllerError::NotSignedIn);
        }
        let plan_id = self.selected.ok_or(ControllerError::NoPlanSelected)?;
        let api = self.api.clone();
        let item = api.add_book(plan_id, book_id).await.inspect_err(|e| {
            self.last_error = Some(e.to_string());
        })?;
        if self.selected == Some(plan_id) {
            self.rows.push(RemoteRow {
                item: item.clone(),
                sync: SyncState::Confirmed,
            });
            self.sync_item_count(plan_id);
        }
        Ok(item)
    }

    // ----- mutation dispatch ------------------------------------------------

    pub async fn set_status(&mut self, key: EntryKey, status: PlanStatus) {
        match key {
            EntryKey::Local(book_id) => {
                let entries = std::mem::take(&mut self.guest_entries);
                self.guest_entries = self.local.update_status_in(entries, book_id, status);
            }
            EntryKey::Remote { plan_id, item_id } => {
                let found = self.with_row(plan_id, item_id, |row| {
                    row.item.status = status;
                    row.sync = SyncState::Pending;
                });
                if !found {
                    tracing::debug!(plan_id, item_id, "status change for a row no longer shown");
                }
                let api = self.api.clone();
                let result = api
                    .update_item(plan_id, item_id, &ItemUpdate::status(status))
                    .await;
                self.settle(plan_id, item_id, result);
            }
        }
    }

    pub async fn set_notes(&mut self, key: EntryKey, notes: &str) {
        match key {
            EntryKey::Local(book_id) => {
                let entries = std::mem::take(&mut self.guest_entries);
                self.guest_entries = self.local.update_notes_in(entries, book_id, notes);
            }
            EntryKey::Remote { plan_id, item_id } => {
                self.with_row(plan_id, item_id, |row| {
                    row.item.notes = Some(notes.to_string());
                    row.sync = SyncState::Pending;
                });
                let api = self.api.clone();
                let result = api
                    .update_item(plan_id, item_id, &ItemUpdate::notes(notes))
                    .await;
                self.settle(plan_id, item_id, result);
            }
        }
    }

    pub async fn remove(&mut self, key: EntryKey) {
        match key {
            EntryKey::Local(book_id) => {
                let entries = std::mem::take(&mut self.guest_entries);
                self.guest_entries = self.local.remove_from(entries, book_id);
            }
            EntryKey::Remote { plan_id, item_id } => {
                if self.selected == Some(plan_id) {
                    self.rows.retain(|row| row.item.id != item_id);
                    self.sync_item_count(plan_id);
                }
                let api = self.api.clone();
                if let Err(e) = api.delete_item(plan_id, item_id).await {
                    self.record_mutation_error(plan_id, item_id, &e);
                }
            }
        }
    }

    fn with_row(&mut self, plan_id: PlanId, item_id: ItemId, apply: impl FnOnce(&mut RemoteRow)) -> bool {
        if self.selected != Some(plan_id) {
            return false;
        }
        match self.rows.iter_mut().find(|row| row.item.id == item_id) {
            Some(row) => {
                apply(row);
                true
            }
            None => false,
        }
    }

    fn settle(&mut self, plan_id: PlanId, item_id: ItemId, result: Result<(), RemoteError>) {
        match result {
            Ok(()) => {
                self.with_row(plan_id, item_id, |row| row.sync = SyncState::Confirmed);
            }
            Err(e) => {
                let message = e.to_string();
                self.with_row(plan_id, item_id, |row| row.sync = SyncState::Failed(message));
                self.record_mutation_error(plan_id, item_id, &e);
            }
        }
    }

    /// A vanished item is a quiet no-op; anything else is shown inline.
    fn record_mutation_error(&mut self, plan_id: PlanId, item_id: ItemId, e: &RemoteError) {
        if e.is_not_found() {
            tracing::debug!(plan_id, item_id, "item already gone server-side: {}", e);
        } else {
            tracing::warn!(plan_id, item_id, "plan item update failed: {}", e);
            self.last_error = Some(e.to_string());
        }
    }

    fn sync_item_count(&mut self, plan_id: PlanId) {
        let count = self.rows.len();
        if let Some(plan) = self.plans.iter_mut().find(|p| p.id == plan_id) {
            plan.item_count = count;
        }
    }
}
