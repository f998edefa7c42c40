use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level failure talking to a LaTeXML daemon.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("LaTeXML daemon `{host}` timed out")]
    Timeout { host: String },
    #[error("LaTeXML daemon `{host}` request failed: {detail}")]
    Transport { host: String, detail: String },
}

impl ConversionError {
    pub fn timeout(host: impl Into<String>) -> Self {
        Self::Timeout { host: host.into() }
    }

    pub fn transport(host: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Transport {
            host: host.into(),
            detail: detail.into(),
        }
    }

    pub fn host(&self) -> &str {
        match self {
            ConversionError::Timeout { host } | ConversionError::Transport { host, .. } => host,
        }
    }
}

/// POSTs an encoded conversion request to a daemon and returns the raw body.
///
/// Implementations must give up after `timeout` and report it as
/// [`ConversionError::Timeout`].
#[async_trait]
pub trait ConversionClient: Send + Sync {
    async fn request(
        &self,
        host: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<String, ConversionError>;
}
