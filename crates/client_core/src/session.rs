use std::sync::Arc;

use shared::protocol::{LoginRequest, RegisterRequest, User};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    error::ClientError,
    gateway::ApiGateway,
    persistence::{PersistedSession, SessionPersistence},
};

/// The client's belief about who, if anyone, is signed in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl SessionState {
    fn persisted(&self) -> PersistedSession {
        PersistedSession {
            user: self.user.clone(),
            is_authenticated: self.is_authenticated,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Loading(bool),
    Authenticated(User),
    SignedOut,
    /// The stored credential was rejected while refreshing the user.
    Expired,
}

/// What `SessionStore::restore` found at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    Anonymous,
    Restored(User),
    Refreshed(User),
    CredentialDiscarded { reason: String },
}

pub struct SessionStore {
    gateway: Arc<dyn ApiGateway>,
    persistence: Arc<dyn SessionPersistence>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(
        gateway: Arc<dyn ApiGateway>,
        persistence: Arc<dyn SessionPersistence>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            gateway,
            persistence,
            state: Mutex::new(SessionState::default()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.is_authenticated
    }

    pub async fn current_user(&self) -> Option<User> {
        self.state.lock().await.user.clone()
    }

    /// Reads persisted state and decides whether the stored credential needs
    /// to be exchanged for a fresh user record.
    pub async fn restore(&self) -> RestoreOutcome {
        let persisted = match self.persistence.load_session().await {
            Ok(persisted) => persisted.unwrap_or_default().normalized(),
            Err(err) => {
                warn!(error = %err, "session: unreadable persisted state; starting anonymous");
                PersistedSession::anonymous()
            }
        };
        {
            let mut state = self.state.lock().await;
            state.user = persisted.user.clone();
            state.is_authenticated = persisted.is_authenticated;
            state.is_loading = false;
        }

        let token = match self.persistence.load_token().await {
            Ok(token) => token.filter(|token| !token.trim().is_empty()),
            Err(err) => {
                warn!(error = %err, "session: unreadable stored credential");
                None
            }
        };
        let has_token = token.is_some();
        self.gateway.set_access_token(token).await;

        if let Some(user) = persisted.user.filter(|_| persisted.is_authenticated) {
            info!(user_id = %user.id, "session: restored persisted session");
            return RestoreOutcome::Restored(user);
        }
        if !has_token {
            return RestoreOutcome::Anonymous;
        }

        match self.refresh_user().await {
            Ok(user) => RestoreOutcome::Refreshed(user),
            Err(err) => {
                warn!(error = %err, "session: stored credential rejected; discarding it");
                self.gateway.set_access_token(None).await;
                if let Err(err) = self.persistence.clear_token().await {
                    warn!(error = %err, "session: failed to discard stored credential");
                }
                RestoreOutcome::CredentialDiscarded {
                    reason: err.to_string(),
                }
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ClientError::validation("email is required"));
        }
        if password.is_empty() {
            return Err(ClientError::validation("password is required"));
        }

        self.set_loading(true).await;
        let result = self
            .gateway
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await;
        self.set_loading(false).await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                if self.reset_to_anonymous().await {
                    let _ = self.events.send(SessionEvent::SignedOut);
                }
                return Err(err);
            }
        };
        self.gateway
            .set_access_token(Some(response.access_token.clone()))
            .await;
        if let Err(err) = self.persistence.save_token(&response.access_token).await {
            warn!(error = %err, "session: failed to persist credential");
        }
        self.authenticate(response.user.clone()).await;
        info!(user_id = %response.user.id, "session: logged in");
        Ok(response.user)
    }

    /// Registration implies authentication; no separate login step follows.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<User, ClientError> {
        let email = email.trim();
        let full_name = full_name.trim();
        if email.is_empty() {
            return Err(ClientError::validation("email is required"));
        }
        if password.is_empty() {
            return Err(ClientError::validation("password is required"));
        }
        if full_name.is_empty() {
            return Err(ClientError::validation("full name is required"));
        }

        self.set_loading(true).await;
        let result = self
            .gateway
            .register(&RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
                full_name: full_name.to_string(),
                locale: None,
            })
            .await;
        self.set_loading(false).await;

        let user = match result {
            Ok(user) => user,
            Err(err) => {
                if self.reset_to_anonymous().await {
                    let _ = self.events.send(SessionEvent::SignedOut);
                }
                return Err(err);
            }
        };
        self.authenticate(user.clone()).await;
        info!(user_id = %user.id, "session: registered");
        Ok(user)
    }

    /// Always ends anonymous; a failed remote logout is only logged.
    pub async fn logout(&self) {
        if let Err(err) = self.gateway.logout().await {
            warn!(error = %err, "session: remote logout failed; clearing local session anyway");
        }
        self.gateway.set_access_token(None).await;

        {
            let mut state = self.state.lock().await;
            state.user = None;
            state.is_authenticated = false;
        }
        if let Err(err) = self.persistence.clear_session().await {
            warn!(error = %err, "session: failed to clear persisted session");
        }
        if let Err(err) = self.persistence.clear_token().await {
            warn!(error = %err, "session: failed to clear stored credential");
        }
        info!("session: logged out");
        let _ = self.events.send(SessionEvent::SignedOut);
    }

    pub async fn refresh_user(&self) -> Result<User, ClientError> {
        match self.gateway.current_user().await {
            Ok(user) => {
                self.authenticate(user.clone()).await;
                Ok(user)
            }
            Err(err) => {
                self.reset_to_anonymous().await;
                let _ = self.events.send(SessionEvent::Expired);
                Err(err)
            }
        }
    }

    async fn authenticate(&self, user: User) {
        let persisted = {
            let mut state = self.state.lock().await;
            state.user = Some(user.clone());
            state.is_authenticated = true;
            state.persisted()
        };
        if let Err(err) = self.persistence.save_session(&persisted).await {
            warn!(error = %err, "session: failed to persist session");
        }
        let _ = self.events.send(SessionEvent::Authenticated(user));
    }

    /// Drops any in-memory identity after a failed auth call. The stored
    /// credential is left for the caller to decide on.
    async fn reset_to_anonymous(&self) -> bool {
        let was_authenticated = {
            let mut state = self.state.lock().await;
            let was_authenticated = state.is_authenticated;
            state.user = None;
            state.is_authenticated = false;
            was_authenticated
        };
        if let Err(err) = self.persistence.clear_session().await {
            warn!(error = %err, "session: failed to clear persisted session");
        }
        was_authenticated
    }

    async fn set_loading(&self, is_loading: bool) {
        self.state.lock().await.is_loading = is_loading;
        let _ = self.events.send(SessionEvent::Loading(is_loading));
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
