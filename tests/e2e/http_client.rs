//! HttpPlanClient and HttpSessionSource against a local fake backend.

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use livingbooks::config::ApiConfig;
use livingbooks::local_plan::PlanEntry;
use livingbooks::remote::{HttpPlanClient, ImportItem, ItemUpdate, PlanApi, RemoteError};
use livingbooks::session::{HttpSessionSource, SessionSource};
use livingbooks::status::PlanStatus;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: String,
}

#[derive(Default)]
struct Backend {
    routes: Mutex<HashMap<(String, String), (u16, String)>>,
    requests: Mutex<Vec<Recorded>>,
}

impl Backend {
    fn respond(&self, method: &str, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn last(&self) -> Recorded {
        self.requests().pop().expect("no request reached the backend")
    }
}

async fn handle(
    State(backend): State<Arc<Backend>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    backend.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: header("authorization"),
        content_type: header("content-type"),
        body,
    });

    let key = (method.to_string(), uri.path().to_string());
    match backend.routes.lock().unwrap().get(&key) {
        Some((status, body)) => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body.clone(),
        ),
        None => (StatusCode::NOT_FOUND, r#"{"detail":"Not Found"}"#.to_string()),
    }
}

async fn start() -> (Arc<Backend>, SocketAddr) {
    let backend = Arc::new(Backend::default());
    let router = Router::new().fallback(handle).with_state(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            eprintln!("fake backend error: {err}");
        }
    });
    (backend, addr)
}

fn api_config(addr: SocketAddr) -> ApiConfig {
    ApiConfig {
        base_url: format!("http://{}", addr),
        session_token: Some("tok-123".to_string()),
        ..Default::default()
    }
}

const PLAN_DETAIL: &str = r#"{
    "id": 7,
    "name": "Spring term",
    "description": null,
    "child_id": null,
    "is_ai_generated": true,
    "created_at": "2026-03-01T09:00:00Z",
    "updated_at": "2026-03-02T09:00:00Z",
    "item_count": 0,
    "items": [
        {
            "id": 11,
            "book_id": 42,
            "status": "reading",
            "notes": "Chapter 4",
            "week_number": 1,
            "order_in_week": 0,
            "book": {"id": 42, "title": "The Secret Garden", "author": "Frances Hodgson Burnett", "age_range": "8-12"}
        },
        {
            "id": 12,
            "book_id": 43,
            "status": "to-read",
            "book": {"id": 43, "title": "Heidi", "author": "Johanna Spyri"}
        }
    ]
}"#;

#[tokio::test]
async fn test_list_plans_sends_auth_and_json_headers() {
    let (backend, addr) = start().await;
    backend.respond(
        "GET",
        "/api/v1/plans",
        200,
        r#"[{"id": 7, "name": "Spring term", "item_count": 2}, {"id": 3, "name": "Autumn"}]"#,
    );
    let client = HttpPlanClient::new(&api_config(addr)).unwrap();

    let plans = client.list_plans().await.unwrap();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].name, "Spring term");
    assert_eq!(plans[1].item_count, 0);

    let req = backend.last();
    assert_eq!(req.method, "GET");
    assert_eq!(req.authorization.as_deref(), Some("Bearer tok-123"));
    assert_eq!(req.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_plan_detail_counts_items() {
    let (backend, addr) = start().await;
    backend.respond("GET", "/api/v1/plans/7", 200, PLAN_DETAIL);
    let client = HttpPlanClient::new(&api_config(addr)).unwrap();

    let detail = client.get_plan_detail(7).await.unwrap();
    assert_eq!(detail.plan.item_count, 2);
    assert!(detail.plan.is_ai_generated);
    assert_eq!(detail.items[0].status, PlanStatus::Reading);
    assert_eq!(detail.items[0].book.age_range, "8-12");
    assert_eq!(detail.items[1].notes, None);
}

#[tokio::test]
async fn test_update_and_delete_item_paths() {
    let (backend, addr) = start().await;
    backend.respond("PATCH", "/api/v1/plans/7/items/11", 200, r#"{"id": 11}"#);
    backend.respond("DELETE", "/api/v1/plans/7/items/11", 204, "");
    let client = HttpPlanClient::new(&api_config(addr)).unwrap();

    client
        .update_item(7, 11, &ItemUpdate::status(PlanStatus::Completed))
        .await
        .unwrap();
    let patch = backend.last();
    assert_eq!(patch.method, "PATCH");
    let body: serde_json::Value = serde_json::from_str(&patch.body).unwrap();
    assert_eq!(body, serde_json::json!({"status": "completed"}));

    client.delete_item(7, 11).await.unwrap();
    let delete = backend.last();
    assert_eq!(delete.method, "DELETE");
    assert_eq!(delete.path, "/api/v1/plans/7/items/11");
}

#[tokio::test]
async fn test_import_posts_named_batch() {
    let (backend, addr) = start().await;
    backend.respond(
        "POST",
        "/api/v1/plans/import",
        201,
        r#"{"id": 9, "name": "My Reading Plan", "item_count": 2}"#,
    );
    let client = HttpPlanClient::new(&api_config(addr)).unwrap();

    let mut entry = PlanEntry::new(
        livingbooks::book::BookSummary::new(2, "Black Beauty", "Anna Sewell"),
        chrono::Utc::now(),
    );
    entry.status = PlanStatus::Reading;
    entry.notes = "Bedtime".to_string();
    let items = vec![
        ImportItem {
            book_id: 1,
            status: PlanStatus::ToRead,
            notes: None,
        },
        ImportItem::from(&entry),
    ];

    let plan = client.import_local_entries(&items).await.unwrap();
    assert_eq!(plan.id, 9);

    let body: serde_json::Value = serde_json::from_str(&backend.last().body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "name": "My Reading Plan",
            "items": [
                {"book_id": 1, "status": "to-read"},
                {"book_id": 2, "status": "reading", "notes": "Bedtime"}
            ]
        })
    );
}

#[tokio::test]
async fn test_configurable_endpoint_paths() {
    let (backend, addr) = start().await;
    backend.respond(
        "POST",
        "/api/v1/users/plans/import-local",
        200,
        r#"{"id": 4, "name": "Imported"}"#,
    );
    let config = ApiConfig {
        plans_path: "/api/v1/users/plans/".to_string(),
        import_path: "/import-local".to_string(),
        ..api_config(addr)
    };
    let client = HttpPlanClient::new(&config).unwrap();

    let plan = client.import_local_entries(&[]).await.unwrap();
    assert_eq!(plan.name, "Imported");
    assert_eq!(backend.last().path, "/api/v1/users/plans/import-local");
}

#[tokio::test]
async fn test_error_message_from_server() {
    let (backend, addr) = start().await;
    backend.respond("GET", "/api/v1/plans/99", 404, r#"{"detail": "Plan not found"}"#);
    backend.respond("GET", "/api/v1/plans", 502, "<html>Bad Gateway</html>");
    let client = HttpPlanClient::new(&api_config(addr)).unwrap();

    let err = client.get_plan_detail(99).await.unwrap_err();
    assert_eq!(err.to_string(), "Plan not found");
    assert!(err.is_not_found());

    let err = client.list_plans().await.unwrap_err();
    assert_eq!(err.to_string(), "Request failed with status 502");
    assert_eq!(err.status_code(), Some(502));
}

#[tokio::test]
async fn test_malformed_success_body_is_decode_error() {
    let (backend, addr) = start().await;
    backend.respond("GET", "/api/v1/plans", 200, "not json");
    let client = HttpPlanClient::new(&api_config(addr)).unwrap();

    let err = client.list_plans().await.unwrap_err();
    assert!(matches!(err, RemoteError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = HttpPlanClient::new(&api_config(addr)).unwrap();

    let err = client.list_plans().await.unwrap_err();
    assert!(matches!(err, RemoteError::Transport(_)));
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_book_lookup() {
    let (backend, addr) = start().await;
    backend.respond(
        "GET",
        "/api/v1/books/42",
        200,
        r#"{"id": 42, "title": "The Secret Garden", "author": "Frances Hodgson Burnett", "popularity_score": 0.9}"#,
    );
    let client = HttpPlanClient::new(&api_config(addr)).unwrap();

    let book = client.get_book(42).await.unwrap();
    assert_eq!(book.byline(), "The Secret Garden by Frances Hodgson Burnett");
}

#[tokio::test]
async fn test_session_probe() {
    let (backend, addr) = start().await;
    backend.respond(
        "GET",
        "/api/v1/auth/me",
        200,
        r#"{"id": 5, "email": "parent@example.org", "name": "Sam", "subscription_active": true}"#,
    );

    let source = HttpSessionSource::new(&api_config(addr)).unwrap();
    let session = source.current().await.unwrap();
    assert_eq!(session.display_name(), "Sam");
    assert_eq!(backend.last().authorization.as_deref(), Some("Bearer tok-123"));

    let anonymous = HttpSessionSource::new(&ApiConfig {
        session_token: None,
        ..api_config(addr)
    })
    .unwrap();
    assert!(anonymous.current().await.is_none());
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_rejected_token_is_guest() {
    let (backend, addr) = start().await;
    backend.respond("GET", "/api/v1/auth/me", 401, r#"{"detail": "Not authenticated"}"#);

    let source = HttpSessionSource::new(&api_config(addr)).unwrap();
    assert!(source.current().await.is_none());
}
