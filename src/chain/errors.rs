use thiserror::Error;

/// Errors from a single chain request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Transport-level errors (network, connection, HTTP status)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Error object returned by the node
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    Rpc {
        endpoint: String,
        code: Option<i64>,
        message: String,
    },

    /// Response arrived but could not be interpreted
    #[error("Decode error: {message} (endpoint: {endpoint})")]
    Decode { endpoint: String, message: String },

    #[error("Invalid endpoint URL: {url} ({message})")]
    InvalidUrl { url: String, message: String },
}

impl ChainError {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::Rpc { endpoint, .. }
            | Self::Decode { endpoint, .. } => endpoint,
            Self::InvalidUrl { url, .. } => url,
        }
    }

    /// Underlying message without endpoint context
    pub fn message(&self) -> String {
        match self {
            Self::Transport { message, .. }
            | Self::Rpc { message, .. }
            | Self::Decode { message, .. }
            | Self::InvalidUrl { message, .. } => message.clone(),
            Self::Timeout { timeout_ms, .. } => format!("timed out after {}ms", timeout_ms),
        }
    }

    /// The request never got an answer from the node
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// JSON-RPC "method not found"
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, Self::Rpc { code: Some(-32601), .. })
    }
}

/// Errors producing submission bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Signer unreachable or returned garbage
    #[error("Signer error: {0}")]
    Signer(String),

    /// Signer answered with an error object
    #[error("Signer rejected request: {message} (code: {code:?})")]
    Rejected { code: Option<i64>, message: String },

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
}

impl BuildError {
    /// Underlying message without the variant prefix
    pub fn message(&self) -> String {
        match self {
            Self::Signer(message) | Self::InvalidTemplate(message) => message.clone(),
            Self::Rejected { message, .. } => message.clone(),
        }
    }
}

impl From<ChainError> for BuildError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Rpc { code, message, .. } => Self::Rejected { code, message },
            other => Self::Signer(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_errors_keep_remote_message() {
        let err = ChainError::Rpc {
            endpoint: "http://a".into(),
            code: Some(3),
            message: "execution reverted: NoSupplyLeft()".into(),
        };
        assert_eq!(err.message(), "execution reverted: NoSupplyLeft()");
        assert_eq!(err.endpoint(), "http://a");
        assert!(!err.is_transport());

        match BuildError::from(err) {
            BuildError::Rejected { code, message } => {
                assert_eq!(code, Some(3));
                assert!(message.contains("NoSupplyLeft"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn method_not_found_is_detected() {
        let err = ChainError::Rpc {
            endpoint: "http://a".into(),
            code: Some(-32601),
            message: "the method eth_maxPriorityFeePerGas does not exist".into(),
        };
        assert!(err.is_method_not_found());

        let timeout = ChainError::Timeout {
            endpoint: "http://a".into(),
            timeout_ms: 250,
        };
        assert!(timeout.is_transport());
        assert_eq!(timeout.message(), "timed out after 250ms");
    }
}
