//! Filesystem-backed object storage.
//!
//! Objects live at `{root}/{bucket}/{key}` and are published under the
//! configured [`PublicUrlScheme`].

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use crate::application::storage::{ObjectStorage, RemovalReport, StorageError};
use crate::domain::storage_keys::{PublicUrlScheme, StorageKey};

const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Error)]
pub enum LocalStorageError {
    #[error("invalid object path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct LocalObjectStorage {
    bucket_root: PathBuf,
    scheme: PublicUrlScheme,
}

impl LocalObjectStorage {
    /// Initialise storage for `scheme`'s bucket under `root`, creating the
    /// bucket directory if necessary.
    pub fn new(root: PathBuf, scheme: PublicUrlScheme) -> Result<Self, std::io::Error> {
        let bucket_root = root.join(scheme.bucket());
        std::fs::create_dir_all(&bucket_root)?;
        Ok(Self {
            bucket_root,
            scheme,
        })
    }

    pub fn bucket(&self) -> &str {
        self.scheme.bucket()
    }

    /// Read a stored object into memory.
    pub async fn read(&self, key: &str) -> Result<Bytes, LocalStorageError> {
        let absolute = self.resolve(key)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, key: &StorageKey, data: &[u8]) -> Result<(), LocalStorageError> {
        let absolute = self.resolve(key.as_str())?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut partial = absolute.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);

        let written = async {
            let mut file = fs::File::create(&partial).await?;
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&partial, &absolute).await
        }
        .await;

        if let Err(err) = written {
            let _ = fs::remove_file(&partial).await;
            return Err(err.into());
        }
        Ok(())
    }

    /// Remove the object. Missing files are treated as success.
    async fn remove(&self, key: &StorageKey) -> Result<(), LocalStorageError> {
        let absolute = self.resolve(key.as_str())?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = %key, "object already absent");
                Ok(())
            }
            Err(err) => Err(LocalStorageError::Io(err)),
        }
    }

    /// Resolve the absolute filesystem path for a key, rejecting anything
    /// that would leave the bucket.
    fn resolve(&self, key: &str) -> Result<PathBuf, LocalStorageError> {
        let relative = Path::new(key);
        if key.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(LocalStorageError::InvalidPath);
        }

        Ok(self.bucket_root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(
        &self,
        key: &StorageKey,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.write(key, &data)
            .await
            .map_err(|err| StorageError::Upload {
                key: key.to_string(),
                message: err.to_string(),
            })
    }

    async fn remove_batch(&self, keys: &[StorageKey]) -> Result<RemovalReport, StorageError> {
        if !fs::try_exists(&self.bucket_root).await.unwrap_or(false) {
            return Err(StorageError::Unavailable(format!(
                "bucket directory `{}` is missing",
                self.bucket_root.display()
            )));
        }

        let mut report = RemovalReport::default();
        for key in keys {
            match self.remove(key).await {
                Ok(()) => report.removed.push(key.clone()),
                Err(err) => report.failed.push((key.clone(), err.to_string())),
            }
        }
        Ok(report)
    }

    fn url_scheme(&self) -> &PublicUrlScheme {
        &self.scheme
    }
}
