use thiserror::Error;

/// Error kinds shared across the relay, circuit builder, and client driver.
///
/// Transient per-cell failures (`Decode`, `Dial`, `Timeout`, `Crypto`) are
/// recovered locally by callers; `Bind` is relay-scoped and fatal at
/// startup; `InvalidCircuit` carries no side effects.
#[derive(Debug, Error)]
pub enum RelayNetError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("dial error: {0}")]
    Dial(String),

    #[error("bind error: {0}")]
    Bind(String),

    #[error("timeout")]
    Timeout,

    #[error("invalid circuit: {0}")]
    InvalidCircuit(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for relaynet operations.
pub type Result<T> = std::result::Result<T, RelayNetError>;

impl RelayNetError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn dial(msg: impl Into<String>) -> Self {
        Self::Dial(msg.into())
    }

    pub fn bind(msg: impl Into<String>) -> Self {
        Self::Bind(msg.into())
    }

    pub fn invalid_circuit(msg: impl Into<String>) -> Self {
        Self::InvalidCircuit(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }
}
