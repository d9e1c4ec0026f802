//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::api_keys::{ApiKeyRecord, ApiScope};
use crate::domain::entities::{MediaRecord, PostRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub owner_id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct CreateMediaParams {
    pub post_id: Uuid,
    pub url: String,
    pub note: String,
    pub position: i32,
}

#[derive(Debug, Clone)]
pub struct UpdateMediaParams {
    pub id: Uuid,
    pub note: String,
    pub position: i32,
}

/// Post records. Every read and write is scoped to the owning user.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Newest first.
    async fn list_posts(&self, owner_id: Uuid) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_post(&self, owner_id: Uuid, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_title(
        &self,
        owner_id: Uuid,
        id: Uuid,
        title: &str,
    ) -> Result<PostRecord, RepoError>;

    /// Removes the post; its media records go with it.
    async fn delete_post(&self, owner_id: Uuid, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait MediaRepo: Send + Sync {
    /// Ordered by position.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<MediaRecord>, RepoError>;

    /// Media for several posts at once, used when listing.
    async fn list_for_posts(&self, post_ids: &[Uuid]) -> Result<Vec<MediaRecord>, RepoError>;

    async fn insert_media(&self, params: CreateMediaParams) -> Result<MediaRecord, RepoError>;

    async fn update_media(&self, params: UpdateMediaParams) -> Result<MediaRecord, RepoError>;

    /// Returns the number of rows removed.
    async fn delete_media(&self, post_id: Uuid, ids: &[Uuid]) -> Result<u64, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateApiKeyParams {
    pub name: String,
    pub description: Option<String>,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub scopes: Vec<ApiScope>,
    pub owner_id: Uuid,
    pub expires_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait ApiKeysRepo: Send + Sync {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError>;

    async fn list_keys(&self, owner_id: Option<Uuid>) -> Result<Vec<ApiKeyRecord>, RepoError>;

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError>;

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError>;

    async fn update_last_used(
        &self,
        id: Uuid,
        last_used_at: OffsetDateTime,
    ) -> Result<(), RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
