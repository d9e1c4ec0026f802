//! Post handlers

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Extension, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::api_keys::ApiPrincipal;
use crate::application::posts::{CreatePostCommand, UpdatePostCommand};
use crate::domain::api_keys::ApiScope;
use crate::domain::media::{MediaSet, MediaValidationError, PendingFile};

use super::multipart::Submission;
use super::{media_to_api, post_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{
    CreatePostManifest, DeletePostResponse, PostListResponse, PostResponse, UpdatePostManifest,
    UpdatePostResponse,
};
use crate::infra::http::api::state::ApiState;

pub async fn list_posts(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
) -> Result<impl IntoResponse, ApiError> {
    principal
        .requires(ApiScope::PostRead)
        .map_err(|_| ApiError::forbidden())?;

    let posts = state
        .posts
        .list(&principal.current_user())
        .await
        .map_err(post_to_api)?;

    Ok(Json(PostListResponse {
        items: posts.into_iter().map(PostResponse::from).collect(),
    }))
}

pub async fn get_post(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal
        .requires(ApiScope::PostRead)
        .map_err(|_| ApiError::forbidden())?;

    let post = state
        .posts
        .get(&principal.current_user(), id)
        .await
        .map_err(post_to_api)?;

    Ok(Json(PostResponse::from(post)))
}

pub async fn create_post(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    principal
        .requires(ApiScope::PostWrite)
        .map_err(|_| ApiError::forbidden())?;

    let submission = Submission::read(&mut multipart).await?;
    let manifest: CreatePostManifest = submission.manifest()?;

    let mut media = MediaSet::new();
    append_files(&mut media, submission.files, manifest.notes).map_err(media_to_api)?;

    let post = state
        .posts
        .create(
            &principal.current_user(),
            CreatePostCommand {
                title: manifest.title,
                media,
            },
        )
        .await
        .map_err(post_to_api)?;

    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

pub async fn update_post(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    principal
        .requires(ApiScope::PostWrite)
        .map_err(|_| ApiError::forbidden())?;

    let submission = Submission::read(&mut multipart).await?;
    let manifest: UpdatePostManifest = submission.manifest()?;
    let user = principal.current_user();

    let existing = state.posts.get(&user, id).await.map_err(post_to_api)?;
    let mut media = MediaSet::hydrate(&existing.media);

    let mut keep: HashMap<Uuid, String> = HashMap::with_capacity(manifest.keep.len());
    for kept in manifest.keep {
        if media.position_of(kept.id).is_none() {
            return Err(media_to_api(MediaValidationError::UnknownMedia { id: kept.id }));
        }
        keep.insert(kept.id, kept.note);
    }

    for record in &existing.media {
        if !keep.contains_key(&record.id) {
            media.remove_persisted(record.id).map_err(media_to_api)?;
        }
    }
    for (media_id, note) in keep {
        let index = media
            .position_of(media_id)
            .ok_or(MediaValidationError::UnknownMedia { id: media_id })
            .map_err(media_to_api)?;
        media.update_note(index, note).map_err(media_to_api)?;
    }

    append_files(&mut media, submission.files, manifest.notes).map_err(media_to_api)?;

    let outcome = state
        .posts
        .update(
            &user,
            id,
            UpdatePostCommand {
                title: manifest.title,
                media,
            },
        )
        .await
        .map_err(post_to_api)?;

    Ok(Json(UpdatePostResponse::from(outcome)))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal
        .requires(ApiScope::PostWrite)
        .map_err(|_| ApiError::forbidden())?;

    let outcome = state
        .posts
        .delete(&principal.current_user(), id)
        .await
        .map_err(post_to_api)?;

    Ok(Json(DeletePostResponse::from(outcome)))
}

/// Append `files` to `media` and give each its note, pairing by position.
fn append_files(
    media: &mut MediaSet,
    files: Vec<PendingFile>,
    notes: Vec<String>,
) -> Result<(), MediaValidationError> {
    if files.len() != notes.len() {
        return Err(MediaValidationError::NoteCountMismatch {
            files: files.len(),
            notes: notes.len(),
        });
    }
    let offset = media.len();
    media.add_files(files)?;
    for (index, note) in notes.into_iter().enumerate() {
        media.update_note(offset + index, note)?;
    }
    Ok(())
}
