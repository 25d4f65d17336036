use crate::keypair::SecretKey;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info};

pub const CLAIMS_FILE: &str = "claims.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to access claim cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Claim cache {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of a write-once insert
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PutOutcome {
    Inserted,
    /// An entry was already present; it is returned and left untouched
    Existing(SecretKey),
}

/// Durable `subject id -> secret key` store, one write per subject.
///
/// Entries live in memory behind a single async mutex and every insert is flushed to
/// `claims.json` in the workspace before the lock is released.
#[derive(Debug, Clone)]
pub struct ClaimCache {
    path: PathBuf,
    entries: Arc<TokioMutex<BTreeMap<String, SecretKey>>>,
}

impl ClaimCache {
    /// Open the cache in `workspace`, loading any previously issued secrets
    pub async fn open(workspace: &Path) -> Result<Self, CacheError> {
        tokio::fs::create_dir_all(workspace)
            .await
            .map_err(|source| CacheError::Io {
                path: workspace.to_path_buf(),
                source,
            })?;

        let path = workspace.join(CLAIMS_FILE);
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| CacheError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        info!(
            count = entries.len(),
            file = %path.display(),
            "Initialize claim cache"
        );

        Ok(Self {
            path,
            entries: Arc::new(TokioMutex::new(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, subject_id: &str) -> Option<SecretKey> {
        self.entries.lock().await.get(subject_id).cloned()
    }

    /// Insert `secret_key` unless the subject already has an entry.
    ///
    /// A failed flush keeps the entry in memory so later calls in this process still see it.
    pub async fn put(
        &self,
        subject_id: &str,
        secret_key: SecretKey,
    ) -> Result<PutOutcome, CacheError> {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(subject_id) {
            debug!(subject_id, "Claim cache already holds an entry");
            return Ok(PutOutcome::Existing(existing.clone()));
        }

        entries.insert(subject_id.to_string(), secret_key);
        self.save(&entries).await?;

        debug!(subject_id, "Stored claim in cache");
        Ok(PutOutcome::Inserted)
    }

    /// Write to a sibling temp file, then rename over the cache file
    async fn save(&self, entries: &BTreeMap<String, SecretKey>) -> Result<(), CacheError> {
        let content = serde_json::to_string_pretty(entries).map_err(|source| {
            CacheError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|source| CacheError::Io {
                path: temp_path.clone(),
                source,
            })?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|source| CacheError::Io {
                path: self.path.clone(),
                source,
            })
    }
}
