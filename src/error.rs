//! Error types for remote experiment-service calls.

use std::fmt;

/// An error returned by (or on the way to) the remote start-experiment call.
///
/// Validation, authorization, conflict and transient network failures are
/// deliberately not distinguished further: the launcher converts every one
/// of them into a `Failed` outcome, and retry policy belongs to the trigger
/// source, not to this crate. The serialized payload is preserved so the
/// failure report carries enough detail for diagnosis.
#[derive(Debug, Clone)]
pub enum RemoteCallError {
    /// The service answered with a non-success status.
    ///
    /// `payload` is the serialized error body exactly as the service
    /// returned it (may be empty when the service sent no body).
    Service { status: u16, payload: String },

    /// The request never produced a service response (connect failure,
    /// broken transport, malformed endpoint).
    Transport(String),

    /// The service answered success but the response body could not be
    /// decoded into an experiment identifier.
    InvalidResponse(String),
}

impl fmt::Display for RemoteCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service { status, payload } => {
                if payload.is_empty() {
                    write!(f, "service returned status {}", status)
                } else {
                    write!(f, "service returned status {}: {}", status, payload)
                }
            }
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::InvalidResponse(msg) => write!(f, "invalid response: {}", msg),
        }
    }
}

impl std::error::Error for RemoteCallError {}

impl From<reqwest::Error> for RemoteCallError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display_includes_payload() {
        let err = RemoteCallError::Service {
            status: 400,
            payload: r#"{"message":"ValidationException"}"#.to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("400"));
        assert!(rendered.contains("ValidationException"));
    }

    #[test]
    fn test_service_error_display_without_payload() {
        let err = RemoteCallError::Service {
            status: 503,
            payload: String::new(),
        };
        assert_eq!(err.to_string(), "service returned status 503");
    }

    #[test]
    fn test_transport_error_display() {
        let err = RemoteCallError::Transport("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
