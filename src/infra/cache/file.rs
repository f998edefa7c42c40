use std::{
    fs,
    io::{ErrorKind, Write},
    path::PathBuf,
};

use async_trait::async_trait;
use tracing::debug;

use crate::application::repos::{CacheError, MathCache};
use crate::domain::entities::{CacheEntry, Fingerprint};
use crate::infra::error::InfraError;

/// Directory of JSON entries, one `<fingerprint>.json` file per conversion.
#[derive(Debug, Clone)]
pub struct FileMathCache {
    directory: PathBuf,
}

impl FileMathCache {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, InfraError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.directory.join(format!("{fingerprint}.json"))
    }
}

#[async_trait]
impl MathCache for FileMathCache {
    async fn read(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(fingerprint);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::from_storage(err)),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| CacheError::Corrupt {
                fingerprint: fingerprint.to_string(),
                reason: err.to_string(),
            })
    }

    async fn write(&self, fingerprint: &Fingerprint, entry: &CacheEntry) -> Result<(), CacheError> {
        let payload = serde_json::to_vec_pretty(entry).map_err(CacheError::from_storage)?;
        let directory = self.directory.clone();
        let path = self.entry_path(fingerprint);

        // Write to a temp file in the same directory, then rename over the entry.
        let persisted = path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut file = tempfile::Builder::new()
                .suffix(".json")
                .tempfile_in(&directory)?;
            file.write_all(&payload)?;
            file.flush()?;
            file.persist(&persisted).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(CacheError::from_storage)?
        .map_err(CacheError::from_storage)?;

        debug!(
            target = "infra::cache::file",
            op = "file_cache::write",
            path = %path.display(),
            "Persisted cache entry"
        );
        Ok(())
    }
}
