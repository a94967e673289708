//! Tier failure taxonomy with fallback classification.
//!
//! Every way an execution tier (or the model gateway behind one) can fail is
//! represented here. The tier chain asks `is_recoverable()` instead of string
//! matching.
//!
//! | Variant             | Recoverable | Meaning                                  |
//! |---------------------|-------------|------------------------------------------|
//! | Timeout             | yes         | wall-clock bound hit (likely endless loop) |
//! | Transport           | yes         | connection / DNS / TLS failure           |
//! | Service             | yes         | non-2xx from the remote service          |
//! | MalformedResponse   | yes         | body failed JSON parse or schema checks  |
//! | Unavailable         | yes         | tier not configured or refused the input |
//! | Cancelled           | no          | superseded by a newer run request        |

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Coarse class of a tier failure, used for logging and warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Transport,
    Service,
    Malformed,
    Unavailable,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Transport => write!(f, "transport"),
            Self::Service => write!(f, "service"),
            Self::Malformed => write!(f, "malformed"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure of a single tier attempt.
#[derive(Debug, Error)]
pub enum TierError {
    /// The tier did not answer within its bound.
    #[error("timed out after {}ms: {hint}", .after.as_millis())]
    Timeout { after: Duration, hint: String },

    /// The request never reached the service, or the connection dropped.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Service { status: u16, message: String },

    /// The response body could not be parsed into the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The tier is not configured or cannot handle this request.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A newer run request superseded this one.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl TierError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Transport(_) => FailureKind::Transport,
            Self::Service { .. } => FailureKind::Service,
            Self::MalformedResponse(_) => FailureKind::Malformed,
            Self::Unavailable(_) => FailureKind::Unavailable,
            Self::Cancelled(_) => FailureKind::Cancelled,
        }
    }

    /// Whether the chain may fall through to the next tier.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Cancelled(_))
    }

    /// Timeout with the standard infinite-loop hint.
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            after,
            hint: "execution timed out, possible infinite loop".to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}

impl From<serde_json::Error> for TierError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_recoverable_with_hint() {
        let err = TierError::timeout(Duration::from_secs(5));
        assert!(err.is_recoverable());
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(err.to_string().contains("possible infinite loop"));
        assert!(err.to_string().contains("5000ms"));
    }

    #[test]
    fn cancelled_is_terminal() {
        let err = TierError::Cancelled("superseded".into());
        assert!(!err.is_recoverable());
        assert_eq!(err.kind().to_string(), "cancelled");
    }

    #[test]
    fn json_errors_become_malformed() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: TierError = parse.unwrap_err().into();
        assert_eq!(err.kind(), FailureKind::Malformed);
        assert!(err.is_recoverable());
    }

    #[test]
    fn service_error_display() {
        let err = TierError::Service {
            status: 503,
            message: "overloaded".into(),
        };
        assert_eq!(err.to_string(), "service returned 503: overloaded");
    }
}
