//! # Store Errors
//!
//! This module defines the error type shared by the HTTP layer, the relation resolver and the
//! stores. Keeping one enum for the whole crate means a subscriber matching on a failed
//! [`StoreState`](crate::StoreState) sees the same variants a caller of
//! [`HttpRestClient`](crate::HttpRestClient) does.
//!
//! The variants fall into three groups:
//!
//! - **Transport failures** ([`RestError::is_transport`]): the request was sent (or attempted)
//!   and the server or network did not give us a usable answer.
//! - **Validation failures** ([`RestError::is_validation`]): a mutation payload was rejected
//!   before any request was made.
//! - **Store failures**: the store worker went away, or the response did not fit the store.

/// Errors produced by stores and HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },
    #[error("{method} {url} returned status {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },
    #[error("Invalid JSON from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("Payload is missing identifier field `{field}`")]
    MissingIdentifier { field: String },
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Unexpected response from {url}: expected {expected}, found {found}")]
    UnexpectedShape {
        url: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Store closed")]
    StoreClosed,
    #[error("Store dropped response channel")]
    StoreDropped,
    #[error("No mocked response for {method} {url}")]
    Unmocked { method: &'static str, url: String },
}

impl RestError {
    /// True when the HTTP round trip itself failed.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RestError::Transport { .. }
                | RestError::Status { .. }
                | RestError::Decode { .. }
                | RestError::InvalidUrl { .. }
                | RestError::Unmocked { .. }
        )
    }

    /// True when a payload was rejected before any request was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RestError::MissingIdentifier { .. } | RestError::InvalidPayload(_)
        )
    }
}

/// Names the JSON type of a value, for shape errors.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let transport = RestError::Status {
            method: "GET",
            url: "/api/".into(),
            status: 500,
        };
        assert!(transport.is_transport());
        assert!(!transport.is_validation());

        let validation = RestError::MissingIdentifier { field: "id".into() };
        assert!(validation.is_validation());
        assert!(!validation.is_transport());

        assert!(!RestError::StoreClosed.is_transport());
        assert!(!RestError::StoreClosed.is_validation());
    }

    #[test]
    fn test_error_messages() {
        let err = RestError::MissingIdentifier { field: "id".into() };
        assert_eq!(err.to_string(), "Payload is missing identifier field `id`");

        let err = RestError::Status {
            method: "PATCH",
            url: "/api/posts".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "PATCH /api/posts returned status 404");
    }
}
