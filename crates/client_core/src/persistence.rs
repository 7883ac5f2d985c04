use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::protocol::User;
use storage::Storage;
use tokio::sync::Mutex;

pub const AUTH_NAMESPACE: &str = "auth-storage";
const SESSION_STATE_KEY: &str = "state";
const ACCESS_TOKEN_KEY: &str = "access_token";

/// The subset of session state that survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub user: Option<User>,
    #[serde(rename = "isAuthenticated")]
    pub is_authenticated: bool,
}

impl PersistedSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
        }
    }

    /// A snapshot claiming authentication without a user (or the reverse) is
    /// treated as anonymous.
    pub fn normalized(self) -> Self {
        match self {
            Self {
                user: Some(user),
                is_authenticated: true,
            } => Self::authenticated(user),
            _ => Self::anonymous(),
        }
    }
}

#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn load_session(&self) -> Result<Option<PersistedSession>>;
    async fn save_session(&self, session: &PersistedSession) -> Result<()>;
    async fn clear_session(&self) -> Result<()>;
    async fn load_token(&self) -> Result<Option<String>>;
    async fn save_token(&self, token: &str) -> Result<()>;
    async fn clear_token(&self) -> Result<()>;
}

/// Session persistence on the sqlite-backed client store.
pub struct DurableSessionPersistence {
    store: Storage,
}

impl DurableSessionPersistence {
    pub fn new(store: Storage) -> Self {
        Self { store }
    }

    pub async fn open(database_url: &str) -> Result<Self> {
        Ok(Self::new(Storage::new(database_url).await?))
    }
}

#[async_trait]
impl SessionPersistence for DurableSessionPersistence {
    async fn load_session(&self) -> Result<Option<PersistedSession>> {
        self.store.get_json(AUTH_NAMESPACE, SESSION_STATE_KEY).await
    }

    async fn save_session(&self, session: &PersistedSession) -> Result<()> {
        self.store
            .put_json(AUTH_NAMESPACE, SESSION_STATE_KEY, session)
            .await
    }

    async fn clear_session(&self) -> Result<()> {
        self.store
            .remove_value(AUTH_NAMESPACE, SESSION_STATE_KEY)
            .await?;
        Ok(())
    }

    async fn load_token(&self) -> Result<Option<String>> {
        self.store.get_value(AUTH_NAMESPACE, ACCESS_TOKEN_KEY).await
    }

    async fn save_token(&self, token: &str) -> Result<()> {
        self.store
            .put_value(AUTH_NAMESPACE, ACCESS_TOKEN_KEY, token)
            .await
    }

    async fn clear_token(&self) -> Result<()> {
        self.store
            .remove_value(AUTH_NAMESPACE, ACCESS_TOKEN_KEY)
            .await?;
        Ok(())
    }
}

/// Process-local persistence for sessions that must not outlive the process.
#[derive(Default)]
pub struct EphemeralSessionPersistence {
    session: Mutex<Option<PersistedSession>>,
    token: Mutex<Option<String>>,
}

impl EphemeralSessionPersistence {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            session: Mutex::new(None),
            token: Mutex::new(Some(token.into())),
        }
    }
}

#[async_trait]
impl SessionPersistence for EphemeralSessionPersistence {
    async fn load_session(&self) -> Result<Option<PersistedSession>> {
        Ok(self.session.lock().await.clone())
    }

    async fn save_session(&self, session: &PersistedSession) -> Result<()> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear_session(&self) -> Result<()> {
        self.session.lock().await.take();
        Ok(())
    }

    async fn load_token(&self) -> Result<Option<String>> {
        Ok(self.token.lock().await.clone())
    }

    async fn save_token(&self, token: &str) -> Result<()> {
        *self.token.lock().await = Some(token.to_string());
        Ok(())
    }

    async fn clear_token(&self) -> Result<()> {
        self.token.lock().await.take();
        Ok(())
    }
}
