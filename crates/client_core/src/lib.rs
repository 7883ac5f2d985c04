use std::{sync::Arc, time::Duration};

pub mod error;
pub mod gateway;
pub mod guard;
pub mod interviews;
pub mod persistence;
pub mod session;

pub use error::ClientError;
pub use gateway::{ApiGateway, HttpApiGateway, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
pub use guard::{guard, navigate, resolve, GuardDecision, Navigation, Route, RouteAccess};
pub use interviews::{InterviewEvent, InterviewState, InterviewStore, DEFAULT_PAGE_SIZE};
pub use persistence::{
    DurableSessionPersistence, EphemeralSessionPersistence, PersistedSession, SessionPersistence,
};
pub use session::{RestoreOutcome, SessionEvent, SessionState, SessionStore};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub page_size: u32,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// The stores a view needs, wired to one gateway.
///
/// The session and interview stores share the gateway so the bearer token
/// installed by a login is used by every subsequent interview request.
#[derive(Clone)]
pub struct JobSiftClient {
    pub gateway: Arc<dyn ApiGateway>,
    pub session: Arc<SessionStore>,
    pub interviews: Arc<InterviewStore>,
}

impl JobSiftClient {
    pub fn new(
        config: &ClientConfig,
        persistence: Arc<dyn SessionPersistence>,
    ) -> Result<Self, ClientError> {
        let gateway = Arc::new(HttpApiGateway::with_timeout(
            &config.api_base_url,
            config.request_timeout,
        )?);
        Ok(Self::new_with_dependencies(gateway, persistence, config.page_size))
    }

    /// Client whose session persists in the sqlite store at `database_url`.
    pub async fn open(config: &ClientConfig, database_url: &str) -> Result<Self, ClientError> {
        let persistence = DurableSessionPersistence::open(database_url)
            .await
            .map_err(|source| ClientError::Persistence { source })?;
        Self::new(config, Arc::new(persistence))
    }

    pub fn new_with_dependencies(
        gateway: Arc<dyn ApiGateway>,
        persistence: Arc<dyn SessionPersistence>,
        page_size: u32,
    ) -> Self {
        Self {
            session: SessionStore::new(gateway.clone(), persistence),
            interviews: InterviewStore::with_page_size(gateway.clone(), page_size),
            gateway,
        }
    }

    /// Startup boundary: restores the persisted session before any view renders.
    pub async fn start(&self) -> RestoreOutcome {
        self.session.restore().await
    }

    pub async fn navigate(&self, path: &str) -> Navigation {
        guard::navigate(&self.session, path).await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
