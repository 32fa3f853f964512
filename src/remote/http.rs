//! HTTP client for the reading-plan backend.

use super::{
    error_message, ImportItem, ItemId, ItemUpdate, NewPlan, PlanApi, PlanId, RemoteError,
    RemotePlan, RemotePlanDetail, RemotePlanItem,
};
use crate::book::{BookId, BookSummary};
use crate::config::ApiConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Shared request plumbing: base URL, JSON headers and the ambient session
/// token.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl Transport {
    pub(crate) fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("Invalid API base URL: {}", base_url);
        }
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, self.url(path))
            .header("Content-Type", "application/json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Send and turn any non-2xx into `RemoteError::Status`.
    pub(crate) async fn execute(&self, req: RequestBuilder) -> Result<Response, RemoteError> {
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status.as_u16(), &body);
        tracing::debug!(status = status.as_u16(), "API error: {}", message);
        Err(RemoteError::status(status.as_u16(), message))
    }

    pub(crate) async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, RemoteError> {
        let response = self.execute(req).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// `PlanApi` over the backend's REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpPlanClient {
    transport: Transport,
    plans_path: String,
    import_path: String,
    books_path: String,
    import_plan_name: String,
}

#[derive(Serialize)]
struct ImportRequest<'a> {
    name: &'a str,
    items: &'a [ImportItem],
}

#[derive(Serialize)]
struct AddBookRequest {
    book_id: BookId,
}

impl HttpPlanClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(&config.base_url, config.session_token.clone())?,
            plans_path: config.plans_path.trim_end_matches('/').to_string(),
            import_path: config.import_path.trim_matches('/').to_string(),
            books_path: config.books_path.trim_end_matches('/').to_string(),
            import_plan_name: config.import_plan_name.clone(),
        })
    }

    fn plan_path(&self, plan_id: PlanId) -> String {
        format!("{}/{}", self.plans_path, plan_id)
    }

    fn item_path(&self, plan_id: PlanId, item_id: ItemId) -> String {
        format!("{}/{}/items/{}", self.plans_path, plan_id, item_id)
    }
}

#[async_trait]
impl PlanApi for HttpPlanClient {
    async fn list_plans(&self) -> Result<Vec<RemotePlan>, RemoteError> {
        let req = self.transport.request(Method::GET, &self.plans_path);
        self.transport.json(req).await
    }

    async fn get_plan_detail(&self, plan_id: PlanId) -> Result<RemotePlanDetail, RemoteError> {
        let req = self.transport.request(Method::GET, &self.plan_path(plan_id));
        let detail: RemotePlanDetail = self.transport.json(req).await?;
        Ok(detail.normalized())
    }

    async fn update_item(
        &self,
        plan_id: PlanId,
        item_id: ItemId,
        update: &ItemUpdate,
    ) -> Result<(), RemoteError> {
        let req = self
            .transport
            .request(Method::PATCH, &self.item_path(plan_id, item_id))
            .json(update);
        self.transport.execute(req).await?;
        Ok(())
    }

    async fn delete_item(&self, plan_id: PlanId, item_id: ItemId) -> Result<(), RemoteError> {
        let req = self
            .transport
            .request(Method::DELETE, &self.item_path(plan_id, item_id));
        self.transport.execute(req).await?;
        Ok(())
    }

    async fn import_local_entries(&self, items: &[ImportItem]) -> Result<RemotePlan, RemoteError> {
        let path = format!("{}/{}", self.plans_path, self.import_path);
        let req = self.transport.request(Method::POST, &path).json(&ImportRequest {
            name: &self.import_plan_name,
            items,
        });
        self.transport.json(req).await
    }

    async fn create_plan(&self, plan: &NewPlan) -> Result<RemotePlan, RemoteError> {
        let req = self
            .transport
            .request(Method::POST, &self.plans_path)
            .json(plan);
        self.transport.json(req).await
    }

    async fn delete_plan(&self, plan_id: PlanId) -> Result<(), RemoteError> {
        let req = self
            .transport
            .request(Method::DELETE, &self.plan_path(plan_id));
        self.transport.execute(req).await?;
        Ok(())
    }

    async fn add_book(&self, plan_id: PlanId, book_id: BookId) -> Result<RemotePlanItem, RemoteError> {
        let path = format!("{}/items", self.plan_path(plan_id));
        let req = self
            .transport
            .request(Method::POST, &path)
            .json(&AddBookRequest { book_id });
        self.transport.json(req).await
    }

    async fn get_book(&self, book_id: BookId) -> Result<BookSummary, RemoteError> {
        let path = format!("{}/{}", self.books_path, book_id);
        let req = self.transport.request(Method::GET, &path);
        self.transport.json(req).await
    }
}
