//! Mock plan API for e2e tests
//!
//! Returns pre-scripted results and records every call for assertions.

use async_trait::async_trait;
use livingbooks::book::{BookId, BookSummary};
use livingbooks::remote::{
    ImportItem, ItemId, ItemUpdate, NewPlan, PlanApi, PlanId, RemoteError, RemotePlan,
    RemotePlanDetail, RemotePlanItem,
};
use livingbooks::session::{Session, SessionSource};
use livingbooks::status::PlanStatus;
use livingbooks::storage::{KeyValueStore, MemoryStore};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListPlans,
    GetPlan(PlanId),
    UpdateItem(PlanId, ItemId, ItemUpdate),
    DeleteItem(PlanId, ItemId),
    Import(Vec<ImportItem>),
    CreatePlan(String),
    DeletePlan(PlanId),
    AddBook(PlanId, BookId),
    GetBook(BookId),
}

#[derive(Default)]
pub struct MockPlanApi {
    plan_lists: Mutex<VecDeque<Result<Vec<RemotePlan>, RemoteError>>>,
    details: Mutex<HashMap<PlanId, RemotePlanDetail>>,
    mutations: Mutex<VecDeque<Result<(), RemoteError>>>,
    imports: Mutex<VecDeque<Result<RemotePlan, RemoteError>>>,
    catalog: Mutex<HashMap<BookId, BookSummary>>,
    calls: Mutex<Vec<Call>>,
}

impl MockPlanApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next `list_plans` result. Unscripted calls return no plans.
    pub fn queue_plans(&self, result: Result<Vec<RemotePlan>, RemoteError>) {
        self.plan_lists.lock().unwrap().push_back(result);
    }

    /// Serve `detail` for every `get_plan_detail` of its plan id.
    pub fn set_detail(&self, detail: RemotePlanDetail) {
        self.details.lock().unwrap().insert(detail.plan.id, detail);
    }

    /// Queue the next update/delete result. Unscripted mutations succeed.
    pub fn queue_mutation(&self, result: Result<(), RemoteError>) {
        self.mutations.lock().unwrap().push_back(result);
    }

    /// Queue the next import result. Unscripted imports fail with a 500.
    pub fn queue_import(&self, result: Result<RemotePlan, RemoteError>) {
        self.imports.lock().unwrap().push_back(result);
    }

    pub fn add_to_catalog(&self, book: BookSummary) {
        self.catalog.lock().unwrap().insert(book.id, book);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_mutation(&self) -> Result<(), RemoteError> {
        self.mutations.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl PlanApi for MockPlanApi {
    async fn list_plans(&self) -> Result<Vec<RemotePlan>, RemoteError> {
        self.record(Call::ListPlans);
        self.plan_lists
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_plan_detail(&self, plan_id: PlanId) -> Result<RemotePlanDetail, RemoteError> {
        self.record(Call::GetPlan(plan_id));
        self.details
            .lock()
            .unwrap()
            .get(&plan_id)
            .cloned()
            .ok_or_else(|| RemoteError::status(404, "Plan not found"))
    }

    async fn update_item(
        &self,
        plan_id: PlanId,
        item_id: ItemId,
        update: &ItemUpdate,
    ) -> Result<(), RemoteError> {
        self.record(Call::UpdateItem(plan_id, item_id, update.clone()));
        self.next_mutation()
    }

    async fn delete_item(&self, plan_id: PlanId, item_id: ItemId) -> Result<(), RemoteError> {
        self.record(Call::DeleteItem(plan_id, item_id));
        self.next_mutation()
    }

    async fn import_local_entries(&self, items: &[ImportItem]) -> Result<RemotePlan, RemoteError> {
        self.record(Call::Import(items.to_vec()));
        self.imports
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::status(500, "no import scripted")))
    }

    async fn create_plan(&self, plan: &NewPlan) -> Result<RemotePlan, RemoteError> {
        self.record(Call::CreatePlan(plan.name.clone()));
        let created = fixtures::plan(500, &plan.name, 0);
        self.set_detail(fixtures::detail(created.clone(), Vec::new()));
        Ok(created)
    }

    async fn delete_plan(&self, plan_id: PlanId) -> Result<(), RemoteError> {
        self.record(Call::DeletePlan(plan_id));
        self.details.lock().unwrap().remove(&plan_id);
        self.next_mutation()
    }

    async fn add_book(&self, plan_id: PlanId, book_id: BookId) -> Result<RemotePlanItem, RemoteError> {
        self.record(Call::AddBook(plan_id, book_id));
        let book = self
            .catalog
            .lock()
            .unwrap()
            .get(&book_id)
            .cloned()
            .ok_or_else(|| RemoteError::status(404, "Book not found"))?;
        Ok(fixtures::item(1000 + book_id, book, PlanStatus::ToRead))
    }

    async fn get_book(&self, book_id: BookId) -> Result<BookSummary, RemoteError> {
        self.record(Call::GetBook(book_id));
        self.catalog
            .lock()
            .unwrap()
            .get(&book_id)
            .cloned()
            .ok_or_else(|| RemoteError::status(404, "Book not found"))
    }
}

/// Store that announces every read on a `Notify`.
pub struct ObservedStore {
    inner: Arc<MemoryStore>,
    reads: AtomicUsize,
    read_signal: Arc<Notify>,
}

impl ObservedStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            read_signal: Arc::new(Notify::new()),
        }
    }

    pub fn read_signal(&self) -> Arc<Notify> {
        self.read_signal.clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for ObservedStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.read_signal.notify_one();
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key)
    }
}

/// Session that stays unresolved until `gate` is notified.
pub struct GatedSession {
    gate: Arc<Notify>,
    session: Session,
}

impl GatedSession {
    pub fn new(gate: Arc<Notify>, session: Session) -> Self {
        Self { gate, session }
    }
}

#[async_trait]
impl SessionSource for GatedSession {
    async fn current(&self) -> Option<Session> {
        self.gate.notified().await;
        Some(self.session.clone())
    }
}

pub mod fixtures {
    use super::*;
    use livingbooks::session::User;

    pub fn book(id: BookId, title: &str) -> BookSummary {
        BookSummary::new(id, title, "Anonymous")
    }

    pub fn plan(id: PlanId, name: &str, item_count: usize) -> RemotePlan {
        RemotePlan {
            id,
            name: name.to_string(),
            description: None,
            child_id: None,
            is_ai_generated: false,
            created_at: None,
            item_count,
        }
    }

    pub fn item(id: ItemId, book: BookSummary, status: PlanStatus) -> RemotePlanItem {
        RemotePlanItem {
            id,
            book,
            status,
            notes: None,
            week_number: None,
            order_in_week: 0,
            created_at: None,
        }
    }

    pub fn detail(plan: RemotePlan, items: Vec<RemotePlanItem>) -> RemotePlanDetail {
        RemotePlanDetail { plan, items }
    }

    pub fn parent() -> User {
        User {
            id: 1,
            email: "parent@example.org".to_string(),
            name: Some("Parent".to_string()),
            subscription_tier: None,
            subscription_active: true,
        }
    }
}
