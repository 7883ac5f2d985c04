use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::InterviewId,
    error::ApiErrorBody,
    protocol::{
        DashboardSummary, Interview, InterviewCreate, InterviewListQuery, InterviewMetadata,
        InterviewUpdate, InterviewsResponse, LoginRequest, LoginResponse, RegisterRequest, User,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Reads get one extra attempt; writes are never retried.
const READ_RETRY_ATTEMPTS: usize = 1;
const READ_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Typed access to the JobSift backend.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError>;
    async fn register(&self, request: &RegisterRequest) -> Result<User, ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
    async fn current_user(&self) -> Result<User, ClientError>;
    async fn list_interviews(
        &self,
        query: &InterviewListQuery,
    ) -> Result<InterviewsResponse, ClientError>;
    async fn create_interview(&self, data: &InterviewCreate) -> Result<Interview, ClientError>;
    async fn update_interview(
        &self,
        id: InterviewId,
        data: &InterviewUpdate,
    ) -> Result<Interview, ClientError>;
    async fn delete_interview(&self, id: InterviewId) -> Result<(), ClientError>;
    async fn get_interview(&self, id: InterviewId) -> Result<Interview, ClientError>;
    async fn dashboard_summary(&self) -> Result<DashboardSummary, ClientError>;
    async fn interview_metadata(&self) -> Result<InterviewMetadata, ClientError>;
    async fn set_access_token(&self, token: Option<String>);
    async fn has_access_token(&self) -> bool;
}

pub struct HttpApiGateway {
    http: Client,
    base_url: Url,
    access_token: RwLock<Option<String>>,
}

impl HttpApiGateway {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                endpoint: "client setup".to_string(),
                source,
            })?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            access_token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: err.to_string(),
            })
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.endpoint(path)?;
        let mut builder = self.http.request(method, url);
        if let Some(token) = self.access_token.read().await.as_deref() {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send(&self, label: &str, builder: RequestBuilder) -> Result<Response, ClientError> {
        debug!(endpoint = label, "api: sending request");
        let response = builder
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                endpoint: label.to_string(),
                source,
            })?;
        ensure_success(label, response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, ClientError> {
        let label = format!("GET /{}", path.trim_start_matches('/'));
        let mut attempt = 0;
        loop {
            let builder = self.request(Method::GET, path).await?.query(query);
            match self.send(&label, builder).await {
                Ok(response) => return decode_json(&label, response).await,
                Err(err) if attempt < READ_RETRY_ATTEMPTS && err.is_retryable() => {
                    attempt += 1;
                    warn!(endpoint = %label, attempt, error = %err, "api: retrying read");
                    tokio::time::sleep(READ_RETRY_DELAY).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn write_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let label = format!("{method} /{}", path.trim_start_matches('/'));
        let builder = self.request(method, path).await?.json(body);
        let response = self.send(&label, builder).await?;
        decode_json(&label, response).await
    }

    async fn write_empty(&self, method: Method, path: &str) -> Result<(), ClientError> {
        let label = format!("{method} /{}", path.trim_start_matches('/'));
        let builder = self.request(method, path).await?;
        self.send(&label, builder).await?;
        Ok(())
    }
}

#[async_trait]
impl ApiGateway for HttpApiGateway {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError> {
        self.write_json(Method::POST, "auth/login", request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, ClientError> {
        self.write_json(Method::POST, "auth/register", request).await
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.write_empty(Method::POST, "auth/logout").await
    }

    async fn current_user(&self) -> Result<User, ClientError> {
        self.get_json("auth/me", &[]).await
    }

    async fn list_interviews(
        &self,
        query: &InterviewListQuery,
    ) -> Result<InterviewsResponse, ClientError> {
        self.get_json("interviews", &query.to_pairs()).await
    }

    async fn create_interview(&self, data: &InterviewCreate) -> Result<Interview, ClientError> {
        self.write_json(Method::POST, "interviews", data).await
    }

    async fn update_interview(
        &self,
        id: InterviewId,
        data: &InterviewUpdate,
    ) -> Result<Interview, ClientError> {
        self.write_json(Method::PATCH, &format!("interviews/{id}"), data)
            .await
    }

    async fn delete_interview(&self, id: InterviewId) -> Result<(), ClientError> {
        self.write_empty(Method::DELETE, &format!("interviews/{id}"))
            .await
    }

    async fn get_interview(&self, id: InterviewId) -> Result<Interview, ClientError> {
        self.get_json(&format!("interviews/{id}"), &[]).await
    }

    async fn dashboard_summary(&self) -> Result<DashboardSummary, ClientError> {
        self.get_json("dashboard/summary", &[]).await
    }

    async fn interview_metadata(&self) -> Result<InterviewMetadata, ClientError> {
        self.get_json("interviews/metadata", &[]).await
    }

    async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token.filter(|token| !token.trim().is_empty());
    }

    async fn has_access_token(&self) -> bool {
        self.access_token.read().await.is_some()
    }
}

/// Parses the base URL and guarantees a trailing slash so relative joins
/// extend the path instead of replacing its last segment.
pub fn normalize_base_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|err| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "api base url must start with http:// or https://".to_string(),
        });
    }
    Ok(url)
}

async fn ensure_success(label: &str, response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let message = ApiErrorBody::parse(&raw).and_then(|body| body.human_message());
    debug!(endpoint = label, status = status.as_u16(), "api: request rejected");
    Err(ClientError::Api {
        endpoint: label.to_string(),
        status: status.as_u16(),
        message,
    })
}

async fn decode_json<T: DeserializeOwned>(label: &str, response: Response) -> Result<T, ClientError> {
    let raw = response
        .bytes()
        .await
        .map_err(|source| ClientError::Transport {
            endpoint: label.to_string(),
            source,
        })?;
    serde_json::from_slice(&raw).map_err(|err| ClientError::Decode {
        endpoint: label.to_string(),
        reason: err.to_string(),
    })
}
