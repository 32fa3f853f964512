//! Remote reading-plan API.
//!
//! `PlanApi` is the seam the reconciliation controller talks to; `http`
//! provides the real backend client. Implementations shape requests and
//! unwrap responses, nothing more.

pub mod http;

pub use http::HttpPlanClient;

use crate::book::{BookId, BookSummary};
use crate::local_plan::PlanEntry;
use crate::status::{HasStatus, PlanStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type PlanId = i64;
pub type ItemId = i64;

/// Failure of a remote call.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Non-2xx response. `message` comes from the server's error payload when
    /// it has one.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        RemoteError::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, when the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::Transport(e) => e.status().map(|s| s.as_u16()),
            RemoteError::Decode(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"detail": "..."}` (including validation-error lists of
/// `{"msg": ...}`), `{"message": "..."}` and `{"error": "..."}`. Anything else
/// falls back to a generic status message.
pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "message", "error"] {
            match value.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => return s.clone(),
                Some(Value::Array(items)) => {
                    let msgs: Vec<&str> = items
                        .iter()
                        .filter_map(|item| item.get("msg").and_then(Value::as_str))
                        .collect();
                    if !msgs.is_empty() {
                        return msgs.join("; ");
                    }
                }
                _ => {}
            }
        }
    }
    format!("Request failed with status {}", status)
}

/// A named, account-owned collection of books.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePlan {
    pub id: PlanId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub child_id: Option<i64>,
    /// Built by the curriculum generator rather than assembled by hand.
    #[serde(default)]
    pub is_ai_generated: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub item_count: usize,
}

/// One row of a remote plan. `id` is the row id, not the book id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePlanItem {
    pub id: ItemId,
    pub book: BookSummary,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub week_number: Option<i32>,
    #[serde(default)]
    pub order_in_week: i32,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl HasStatus for RemotePlanItem {
    fn status(&self) -> PlanStatus {
        self.status
    }
}

/// A plan together with its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePlanDetail {
    #[serde(flatten)]
    pub plan: RemotePlan,
    #[serde(default)]
    pub items: Vec<RemotePlanItem>,
}

impl RemotePlanDetail {
    /// Force `item_count` to agree with the item list.
    pub fn normalized(mut self) -> Self {
        self.plan.item_count = self.items.len();
        self
    }
}

/// Partial item update; unset fields are left alone server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PlanStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ItemUpdate {
    pub fn status(status: PlanStatus) -> Self {
        Self {
            status: Some(status),
            notes: None,
        }
    }

    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            status: None,
            notes: Some(notes.into()),
        }
    }
}

/// One guest entry as sent to the bulk import endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportItem {
    pub book_id: BookId,
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<&PlanEntry> for ImportItem {
    fn from(entry: &PlanEntry) -> Self {
        Self {
            book_id: entry.book.id,
            status: entry.status,
            notes: if entry.notes.is_empty() {
                None
            } else {
                Some(entry.notes.clone())
            },
        }
    }
}

/// Body for creating an empty plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewPlan {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_id: Option<i64>,
}

/// Reading-plan endpoints of the backend.
#[async_trait]
pub trait PlanApi: Send + Sync {
    async fn list_plans(&self) -> Result<Vec<RemotePlan>, RemoteError>;

    async fn get_plan_detail(&self, plan_id: PlanId) -> Result<RemotePlanDetail, RemoteError>;

    async fn update_item(
        &self,
        plan_id: PlanId,
        item_id: ItemId,
        update: &ItemUpdate,
    ) -> Result<(), RemoteError>;

    async fn delete_item(&self, plan_id: PlanId, item_id: ItemId) -> Result<(), RemoteError>;

    /// Create a new plan seeded from guest entries and return it.
    async fn import_local_entries(&self, items: &[ImportItem]) -> Result<RemotePlan, RemoteError>;

    async fn create_plan(&self, plan: &NewPlan) -> Result<RemotePlan, RemoteError>;

    async fn delete_plan(&self, plan_id: PlanId) -> Result<(), RemoteError>;

    async fn add_book(&self, plan_id: PlanId, book_id: BookId) -> Result<RemotePlanItem, RemoteError>;

    /// Catalog lookup, used to embed a summary when queueing a book locally.
    async fn get_book(&self, book_id: BookId) -> Result<BookSummary, RemoteError>;
}
