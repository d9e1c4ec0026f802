//! Object storage contract used by the post workflow.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::storage_keys::{PublicUrlScheme, StorageKey};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload of `{key}` failed: {message}")]
    Upload { key: String, message: String },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a batch removal. Individual keys may fail while the call as a
/// whole succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: Vec<StorageKey>,
    pub failed: Vec<(StorageKey, String)>,
}

impl RemovalReport {
    pub fn attempted(&self) -> usize {
        self.removed.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        key: &StorageKey,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn remove_batch(&self, keys: &[StorageKey]) -> Result<RemovalReport, StorageError>;

    fn url_scheme(&self) -> &PublicUrlScheme;

    fn public_url(&self, key: &StorageKey) -> String {
        self.url_scheme().url_for(key)
    }
}
