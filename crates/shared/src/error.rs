use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the backend on non-2xx responses.
///
/// Handlers either send `{"message": "..."}` or the framework default
/// `{"detail": ...}`, where `detail` is a string or a list of validation
/// entries carrying a `msg` field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ApiErrorBody {
    pub fn human_message(&self) -> Option<String> {
        if let Some(message) = self.message.as_deref().map(str::trim) {
            if !message.is_empty() {
                return Some(message.to_string());
            }
        }

        match self.detail.as_ref()? {
            Value::String(detail) if !detail.trim().is_empty() => Some(detail.trim().to_string()),
            Value::Array(entries) => entries
                .iter()
                .find_map(|entry| entry.get("msg").and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        }
    }

    /// Parses a raw response body; anything that is not a JSON object yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str::<Self>(raw).ok()
    }
}
