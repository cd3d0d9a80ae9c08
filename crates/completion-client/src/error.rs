//! Error types for the completion client

use thiserror::Error;

/// Result type alias using CompletionError
pub type Result<T> = std::result::Result<T, CompletionError>;

#[derive(Debug, Error)]
pub enum CompletionError {
    /// No host/port configured
    #[error("Completion service is not configured")]
    NotConfigured,

    /// No plugin server URL configured
    #[error("Plugin server is not configured")]
    PluginNotConfigured,

    /// The service answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never got a response
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The client-side deadline elapsed
    #[error("Request timed out")]
    Timeout,

    /// A success response could not be read
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl CompletionError {
    /// HTTP status, when the service answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message without the status prefix
    pub fn message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display_and_parts() {
        let err = CompletionError::Http {
            status: 404,
            message: "model not found".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404: model not found");
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.message(), "model not found");
    }

    #[test]
    fn test_non_http_errors_have_no_status() {
        assert_eq!(CompletionError::Timeout.status(), None);
        assert_eq!(
            CompletionError::NotConfigured.message(),
            "Completion service is not configured"
        );
    }
}
