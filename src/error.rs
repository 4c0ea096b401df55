// Firebase MCP Gateway - Error Taxonomy
//
// Closed set of error kinds shared by every layer. Raw platform errors never
// cross the dispatcher boundary: they are classified here first, either from
// an HTTP status (preferred) or by the legacy message-substring shim.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed classification attached to every failed tool response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    RateLimit,
    AlreadyExists,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Authorization => "AUTHORIZATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Error carried through the pipeline. Always classified.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GateError {
    pub kind: ErrorKind,
    pub message: String,
}

impl GateError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Prefix the message with an operation context, keeping the kind.
    pub fn with_context(self, context: &str) -> Self {
        Self {
            kind: self.kind,
            message: format!("{}: {}", context, self.message),
        }
    }
}

/// Classify a platform error from its HTTP status code. Preferred path:
/// the collaborator boundary calls this before the message shim gets a say.
pub fn classify_status(status: u16, message: impl Into<String>) -> GateError {
    let kind = match status {
        400 => ErrorKind::Validation,
        401 | 403 => ErrorKind::Authorization,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::AlreadyExists,
        429 => ErrorKind::RateLimit,
        _ => ErrorKind::Internal,
    };
    GateError::new(kind, message)
}

/// Legacy compatibility shim: best-effort classification by message
/// substring. Only consulted for errors that arrive unclassified.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("not found") || lower.contains("no document") || lower.contains("no user") {
        ErrorKind::NotFound
    } else if lower.contains("already exists") || lower.contains("duplicate") {
        ErrorKind::AlreadyExists
    } else if lower.contains("permission")
        || lower.contains("unauthorized")
        || lower.contains("disabled")
        || lower.contains("read-only")
        || lower.contains("not allowed")
    {
        ErrorKind::Authorization
    } else if lower.contains("rate limit") || lower.contains("too many requests") {
        ErrorKind::RateLimit
    } else {
        ErrorKind::Internal
    }
}

/// Wrap an arbitrary error message into the taxonomy via the shim.
pub fn wrap_unclassified(message: impl Into<String>) -> GateError {
    let message = message.into();
    GateError::new(classify_message(&message), message)
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        GateError::internal(format!("HTTP request failed: {}", err))
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::internal(format!("JSON error: {}", err))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(404, "x").kind, ErrorKind::NotFound);
        assert_eq!(classify_status(409, "x").kind, ErrorKind::AlreadyExists);
        assert_eq!(classify_status(403, "x").kind, ErrorKind::Authorization);
        assert_eq!(classify_status(401, "x").kind, ErrorKind::Authorization);
        assert_eq!(classify_status(429, "x").kind, ErrorKind::RateLimit);
        assert_eq!(classify_status(400, "x").kind, ErrorKind::Validation);
        assert_eq!(classify_status(500, "x").kind, ErrorKind::Internal);
    }

    #[test]
    fn message_shim_matches_known_substrings() {
        assert_eq!(classify_message("Document not found"), ErrorKind::NotFound);
        assert_eq!(classify_message("user already exists"), ErrorKind::AlreadyExists);
        assert_eq!(classify_message("PERMISSION_DENIED: missing scope"), ErrorKind::Authorization);
        assert_eq!(classify_message("server is in read-only mode"), ErrorKind::Authorization);
        assert_eq!(classify_message("auth is disabled"), ErrorKind::Authorization);
        assert_eq!(classify_message("something exploded"), ErrorKind::Internal);
    }

    #[test]
    fn context_prefix_preserves_kind() {
        let err = GateError::not_found("document users/u1 does not exist")
            .with_context("firestore_get_document");
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(err.message.starts_with("firestore_get_document: "));
    }

    #[test]
    fn kind_serializes_screaming_snake() {
        let v = serde_json::to_value(ErrorKind::NotFound).unwrap();
        assert_eq!(v, serde_json::json!("NOT_FOUND"));
        let v = serde_json::to_value(ErrorKind::RateLimit).unwrap();
        assert_eq!(v, serde_json::json!("RATE_LIMIT"));
    }
}
