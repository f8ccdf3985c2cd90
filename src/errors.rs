use thiserror::Error;

/// Typed error hierarchy for murmur.
///
/// Use at module boundaries (gateway calls, provider calls, config validation).
/// Internal/leaf functions can continue using `anyhow::Result` — the `Internal`
/// variant allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum MurmurError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway error: {message}")]
    Gateway { message: String, retryable: bool },

    #[error("Provider error: {message}")]
    Provider { message: String, retryable: bool },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl MurmurError {
    /// Whether this error is transient and the operation should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway { retryable, .. } | Self::Provider { retryable, .. } => *retryable,
            Self::Internal(_) => true,
            Self::Config(_) => false,
        }
    }
}
