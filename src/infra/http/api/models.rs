use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::posts::{DeletePostOutcome, PartialCleanupWarning, UpdatePostOutcome};
use crate::domain::entities::{MediaRecord, PostWithMedia};

/// JSON carried in the `manifest` part of a create request. `notes[i]`
/// belongs to the i-th `file` part.
#[derive(Debug, Deserialize, Serialize)]
pub struct CreatePostManifest {
    pub title: String,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// JSON carried in the `manifest` part of an update request.
///
/// Persisted media listed in `keep` stay (with the given note); persisted
/// media left out are removed. `notes[i]` belongs to the i-th new `file`
/// part, appended after the kept items.
#[derive(Debug, Deserialize, Serialize)]
pub struct UpdatePostManifest {
    pub title: String,
    #[serde(default)]
    pub keep: Vec<KeptMedia>,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct KeptMedia {
    pub id: Uuid,
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct MediaResponse {
    pub id: Uuid,
    pub url: String,
    pub note: String,
    pub position: i32,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub title: String,
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub media: Vec<MediaResponse>,
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub items: Vec<PostResponse>,
}

#[derive(Debug, Serialize)]
pub struct UpdatePostResponse {
    pub post: PostResponse,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletePostResponse {
    pub id: Uuid,
    pub attempted_storage_keys: usize,
    pub warnings: Vec<String>,
}

impl From<MediaRecord> for MediaResponse {
    fn from(record: MediaRecord) -> Self {
        Self {
            id: record.id,
            url: record.url,
            note: record.note,
            position: record.position,
        }
    }
}

impl From<PostWithMedia> for PostResponse {
    fn from(value: PostWithMedia) -> Self {
        Self {
            id: value.post.id,
            title: value.post.title,
            owner_id: value.post.owner_id,
            created_at: value.post.created_at,
            media: value.media.into_iter().map(MediaResponse::from).collect(),
        }
    }
}

impl From<UpdatePostOutcome> for UpdatePostResponse {
    fn from(outcome: UpdatePostOutcome) -> Self {
        Self {
            post: outcome.post.into(),
            warnings: render_warnings(&outcome.warnings),
        }
    }
}

impl From<DeletePostOutcome> for DeletePostResponse {
    fn from(outcome: DeletePostOutcome) -> Self {
        Self {
            id: outcome.post_id,
            attempted_storage_keys: outcome.attempted_keys,
            warnings: render_warnings(&outcome.warnings),
        }
    }
}

fn render_warnings(warnings: &[PartialCleanupWarning]) -> Vec<String> {
    warnings.iter().map(ToString::to_string).collect()
}
