//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A titled collection of media owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub title: String,
    pub owner_id: Uuid,
    pub created_at: OffsetDateTime,
}

/// One stored image or video plus its note, belonging to a post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub url: String,
    pub note: String,
    pub position: i32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostWithMedia {
    pub post: PostRecord,
    /// Ordered by `position`.
    pub media: Vec<MediaRecord>,
}

impl PostWithMedia {
    pub fn new(post: PostRecord, mut media: Vec<MediaRecord>) -> Self {
        media.sort_by_key(|record| record.position);
        Self { post, media }
    }
}
