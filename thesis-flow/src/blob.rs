//! Uploaded file storage
//!
//! Workflow operations write uploaded files through a [`BlobStore`] before
//! committing the database transaction that references them. When the
//! transaction fails, the written blobs are deleted again so no orphaned
//! file outlives an aborted operation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{Result, WorkflowError};

/// Uploaded file as received from the caller
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Reject empty uploads and reduce the file name to a safe basename
    pub fn validated_name(&self) -> Result<String> {
        if self.bytes.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "uploaded file '{}' is empty",
                self.file_name
            )));
        }

        let base = Path::new(self.file_name.trim())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let safe: String = base
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if safe.trim_matches(['.', '_']).is_empty() {
            return Err(WorkflowError::Validation("file name is required".to_string()));
        }
        Ok(safe)
    }
}

/// Storage backend for uploaded files
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any existing blob
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Remove the blob under `key`; missing blobs are not an error
    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> bool;
}

fn check_key(key: &str) -> Result<()> {
    let path = Path::new(key);
    let clean = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if clean {
        Ok(())
    } else {
        Err(WorkflowError::Validation(format!("invalid storage key '{}'", key)))
    }
}

/// Blob store rooted at a directory on the local filesystem
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WorkflowError::StorageFailure(format!("{}: {}", parent.display(), e)))?;
        }

        // Write then rename so readers never see a partial file
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| WorkflowError::StorageFailure(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| WorkflowError::StorageFailure(format!("{}: {}", path.display(), e)))?;

        debug!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WorkflowError::StorageFailure(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// In-memory blob store
///
/// Used by tests and embedded deployments. `fail_writes` makes every
/// subsequent `put` fail with `StorageFailure`.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .blobs
            .lock()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        check_key(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WorkflowError::StorageFailure(format!(
                "write of '{}' refused",
                key
            )));
        }
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| WorkflowError::StorageFailure("blob store lock poisoned".to_string()))?;
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| WorkflowError::StorageFailure("blob store lock poisoned".to_string()))?;
        blobs.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        self.blobs
            .lock()
            .map(|b| b.contains_key(key))
            .unwrap_or(false)
    }
}
