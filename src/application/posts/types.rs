use std::fmt::{Display, Formatter};

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::application::storage::StorageError;
use crate::domain::entities::PostWithMedia;
use crate::domain::media::{MediaSet, MediaValidationError};

/// The authenticated user an operation acts for. Always passed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurrentUser {
    id: Uuid,
}

impl CurrentUser {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Error)]
pub enum PostWorkflowError {
    #[error(transparent)]
    Validation(#[from] MediaValidationError),
    #[error("post not found")]
    NotFound,
    #[error("a submission for this post is already in progress")]
    Busy,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PostWorkflowError {
    /// Failures of the record store or object storage, as opposed to input
    /// the caller can correct.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Repo(_) | Self::Storage(_))
    }
}

/// A cleanup step that failed without failing the operation. Logged and
/// returned to the caller for visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialCleanupWarning {
    pub operation: &'static str,
    pub key: Option<String>,
    pub message: String,
}

impl Display for PartialCleanupWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} cleanup of `{key}`: {}", self.operation, self.message),
            None => write!(f, "{} cleanup: {}", self.operation, self.message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub title: String,
    pub media: MediaSet,
}

/// Desired state of an existing post. Persisted items keep their `id`;
/// items without one are uploaded; persisted items missing from `media`
/// are removed.
#[derive(Debug, Clone)]
pub struct UpdatePostCommand {
    pub title: String,
    pub media: MediaSet,
}

#[derive(Debug, Clone)]
pub struct UpdatePostOutcome {
    pub post: PostWithMedia,
    pub warnings: Vec<PartialCleanupWarning>,
}

#[derive(Debug, Clone)]
pub struct DeletePostOutcome {
    pub post_id: Uuid,
    /// Number of storage keys passed to the batch removal.
    pub attempted_keys: usize,
    pub warnings: Vec<PartialCleanupWarning>,
}
