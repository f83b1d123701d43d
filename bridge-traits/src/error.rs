use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("TLS negotiation failed: {0}")]
    Tls(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether this error originates below the HTTP layer. Callers with a
    /// retry budget treat these as retryable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::Dns(_) | Self::Tls(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
