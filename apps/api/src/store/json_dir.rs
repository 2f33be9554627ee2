use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::models::portfolio::Portfolio;
use crate::store::{stamp, PortfolioStore, StoreError};

const MAX_ID_LEN: usize = 128;

/// Durable store keeping one `<id>.json` document per record.
///
/// Writes go to a temp file in the same directory and are renamed into place,
/// so a reader never observes a half-written record.
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!("Portfolio store directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

/// Ids become file stems, so only `[A-Za-z0-9_-]` is accepted.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl PortfolioStore for JsonDirStore {
    async fn put(&self, id: Option<String>, record: Portfolio) -> Result<Portfolio, StoreError> {
        let (id, stored) = stamp(id, record);
        let path = self.path_for(&id)?;
        let bytes = serde_json::to_vec_pretty(&stored)?;
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

        debug!(%id, "portfolio written to disk");
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<Portfolio>, StoreError> {
        let Ok(path) = self.path_for(id) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<BTreeMap<String, Portfolio>, StoreError> {
        let mut out = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Portfolio>(&bytes) {
                Ok(p) => {
                    out.insert(id.to_string(), p);
                }
                Err(e) => warn!("Skipping unreadable portfolio file {}: {e}", path.display()),
            }
        }
        Ok(out)
    }
}
