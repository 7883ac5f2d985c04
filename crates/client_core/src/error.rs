use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("invalid api base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Api {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },
    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("client state persistence failed: {source}")]
    Persistence { source: anyhow::Error },
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Message suitable for a view: the backend-provided text when there is
    /// one, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Api {
                message: Some(message),
                ..
            } => message.clone(),
            ClientError::Validation(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Credential is missing, expired or revoked.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    /// Failures worth a single retry on idempotent reads.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { source, .. } => !source.is_builder(),
            ClientError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
