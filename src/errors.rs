//! Broadcaster-level error taxonomy

use thiserror::Error;

/// How a failure should influence the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Try again in a later round
    Retryable,
    /// No later round can succeed; end the run now
    PermanentStop,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::PermanentStop => "permanent_stop",
        }
    }
}

/// Errors surfaced by the pool, the waiter and the racer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    /// Transport-level failure reaching an endpoint
    #[error("Endpoint unavailable: {message} (endpoint: {endpoint})")]
    EndpointUnavailable { endpoint: String, message: String },

    #[error("Timed out after {timeout_ms}ms ({context})")]
    Timeout { context: String, timeout_ms: u64 },

    /// The endpoint answered but refused the request
    #[error("Remote rejection from {endpoint} ({}): {message}", .class.as_str())]
    RemoteRejection {
        endpoint: String,
        message: String,
        class: FailureClass,
    },

    #[error("No endpoints configured")]
    NoEndpointsConfigured,

    #[error("Submission campaign already attempted")]
    AlreadyAttempted,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl BroadcastError {
    /// Classification the racer acts on
    pub fn class(&self) -> FailureClass {
        match self {
            Self::RemoteRejection { class, .. } => *class,
            _ => FailureClass::Retryable,
        }
    }

    /// Whether this error ends the whole process rather than one attempt
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoEndpointsConfigured | Self::Configuration(_) | Self::Cancelled
        )
    }

    /// Get the endpoint from the error if available
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::EndpointUnavailable { endpoint, .. } | Self::RemoteRejection { endpoint, .. } => {
                Some(endpoint)
            }
            _ => None,
        }
    }
}
