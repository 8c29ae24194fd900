//! Blob store implementations.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::BlobStore;
use crate::error::BlobError;

/// Generates a key of the form `policies/<unix millis>_<16 hex chars>`.
pub fn generate_blob_key() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("policies/{}_{}", Utc::now().timestamp_millis(), &random[..16])
}

/// A stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Blob store kept in process memory.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        match self.blobs.read() {
            Ok(blobs) => blobs.get(key).cloned(),
            Err(poisoned) => {
                log::warn!("Blob store lock was poisoned, recovering");
                poisoned.into_inner().get(key).cloned()
            }
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let blobs = match self.blobs.read() {
            Ok(blobs) => blobs,
            Err(poisoned) => {
                log::warn!("Blob store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let mut keys: Vec<String> = blobs.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, BlobError> {
        let key = generate_blob_key();
        let blob = StoredBlob {
            bytes,
            mime_type: mime_type.to_string(),
        };
        match self.blobs.write() {
            Ok(mut blobs) => blobs.insert(key.clone(), blob),
            Err(poisoned) => {
                log::warn!("Blob store lock was poisoned, recovering");
                poisoned.into_inner().insert(key.clone(), blob)
            }
        };
        Ok(key)
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        match self.blobs.write() {
            Ok(mut blobs) => blobs.remove(key),
            Err(poisoned) => {
                log::warn!("Blob store lock was poisoned, recovering");
                poisoned.into_inner().remove(key)
            }
        };
        Ok(())
    }
}

/// Blob store that maps keys to files below a root directory.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to a path, rejecting keys that would escape the root.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, BlobError> {
        let key = generate_blob_key();
        let path = self.path_for(&key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Write {
                    key: key.clone(),
                    source: e,
                })?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| BlobError::Write {
                key: key.clone(),
                source: e,
            })?;

        log::debug!("Stored {} bytes ({}) as {}", bytes.len(), mime_type, key);
        Ok(key)
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Delete {
                key: key.to_string(),
                source: e,
            }),
        }
    }
}
