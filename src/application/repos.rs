//! Traits describing the collaborators the render pipeline talks to.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{CacheEntry, Fingerprint};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache storage error: {0}")]
    Storage(String),
    #[error("cache entry `{fingerprint}` is corrupt: {reason}")]
    Corrupt { fingerprint: String, reason: String },
}

impl CacheError {
    pub fn from_storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Persistent store of conversion results, keyed by fingerprint.
#[async_trait]
pub trait MathCache: Send + Sync {
    async fn read(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError>;

    async fn write(&self, fingerprint: &Fingerprint, entry: &CacheEntry) -> Result<(), CacheError>;
}

#[derive(Debug, Error)]
#[error("formula page lookup failed: {0}")]
pub struct PageLookupError(pub String);

/// Answers whether a wiki page exists, used to style formula links.
#[async_trait]
pub trait FormulaPages: Send + Sync {
    async fn exists(&self, title: &str) -> Result<bool, PageLookupError>;
}
