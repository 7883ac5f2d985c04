//! In-process mock of the JobSift backend for store tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};
use uuid::Uuid;

use crate::gateway::HttpApiGateway;

const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone)]
struct Reply {
    status: StatusCode,
    body: Value,
    delay: Duration,
}

impl Reply {
    fn new(status: u16, body: Value, delay: Duration) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
            delay,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockBackend {
    pub base_url: String,
    replies: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockBackend {
    /// Answers `route` ("METHOD /path" without the api prefix) with this
    /// reply from now on, dropping anything queued before.
    pub async fn reply(&self, route: &str, status: u16, body: Value) {
        self.reply_after(route, status, body, Duration::ZERO).await;
    }

    pub async fn reply_after(&self, route: &str, status: u16, body: Value, delay: Duration) {
        let mut replies = self.replies.lock().await;
        let queue = replies.entry(route.to_string()).or_default();
        queue.clear();
        queue.push_back(Reply::new(status, body, delay));
    }

    /// Queues a reply behind the current one. The last reply in the queue
    /// keeps answering once the others are used up.
    pub async fn then_reply(&self, route: &str, status: u16, body: Value) {
        self.replies
            .lock()
            .await
            .entry(route.to_string())
            .or_default()
            .push_back(Reply::new(status, body, Duration::ZERO));
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn requests_to(&self, route: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|request| format!("{} {}", request.method, request.path) == route)
            .cloned()
            .collect()
    }

    pub fn gateway(&self) -> Arc<HttpApiGateway> {
        Arc::new(HttpApiGateway::new(&self.base_url).expect("gateway"))
    }

    async fn next_reply(&self, route: &str) -> Option<Reply> {
        let mut replies = self.replies.lock().await;
        let queue = replies.get_mut(route)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

pub async fn spawn_backend() -> Result<MockBackend> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let backend = MockBackend {
        base_url: format!("http://{addr}{API_PREFIX}"),
        ..MockBackend::default()
    };
    let app = Router::new()
        .fallback(handle_request)
        .with_state(backend.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(backend)
}

/// Base url of a port nothing listens on.
pub async fn unreachable_base_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}{API_PREFIX}"))
}

async fn handle_request(
    State(backend): State<MockBackend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or(uri.path())
        .to_string();
    let query = uri
        .query()
        .map(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = serde_json::from_slice(&body).ok();

    let route = format!("{method} {path}");
    backend.requests.lock().await.push(RecordedRequest {
        method: method.to_string(),
        path,
        query,
        authorization,
        body,
    });

    let Some(reply) = backend.next_reply(&route).await else {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" }))).into_response();
    };
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    if reply.body.is_null() {
        reply.status.into_response()
    } else {
        (reply.status, Json(reply.body)).into_response()
    }
}

pub fn user_json(email: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "email": email,
        "full_name": "Ada Lovelace",
        "locale": "en",
        "is_verified": true,
        "is_active": true,
        "created_at": "2024-03-01T09:30:00",
        "updated_at": "2024-03-01T09:30:00"
    })
}

pub fn interview_json(id: Uuid, company: &str, status: &str) -> Value {
    json!({
        "id": id,
        "user_id": Uuid::new_v4(),
        "company_name": company,
        "role_title": "Backend Engineer",
        "work_mode": "REMOTE",
        "application_status": status,
        "location": "Berlin",
        "created_at": "2024-03-01T09:30:00",
        "updated_at": "2024-03-02T10:00:00"
    })
}

pub fn interviews_page_json(interviews: Vec<Value>, total: u64, skip: u64, limit: u64) -> Value {
    json!({
        "interviews": interviews,
        "total": total,
        "skip": skip,
        "limit": limit
    })
}

pub fn dashboard_json() -> Value {
    json!({
        "summary": {
            "total_interviews": 12,
            "conversion_rate": 41.7,
            "success_rate": 8.3,
            "this_week_applications": 3
        },
        "status_distribution": [
            { "status": "APPLIED", "count": 5 },
            { "status": "OFFER", "count": 1 }
        ],
        "upcoming_interviews": [{
            "id": Uuid::new_v4().to_string(),
            "company_name": "Acme",
            "role_title": "Backend Engineer",
            "interview_date": "2024-03-08T14:00:00",
            "status": "TECHNICAL_INTERVIEW"
        }],
        "recent_activity": [],
        "insights": ["Follow up with Acme"]
    })
}
