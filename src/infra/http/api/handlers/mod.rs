//! API handlers and the error conversions they share.

mod multipart;
mod posts;

pub use posts::*;

use axum::http::StatusCode;

use crate::application::posts::PostWorkflowError;
use crate::application::repos::RepoError;
use crate::application::storage::StorageError;
use crate::domain::media::MediaValidationError;

use super::error::{ApiError, codes};

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(msg) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(msg),
        ),
    }
}

pub(crate) fn media_to_api(err: MediaValidationError) -> ApiError {
    ApiError::invalid_input("Invalid post", Some(err.to_string()))
}

pub(crate) fn storage_to_api(err: StorageError) -> ApiError {
    let status = match err {
        StorageError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StorageError::Upload { .. } => StatusCode::BAD_GATEWAY,
    };
    ApiError::new(
        status,
        codes::STORAGE,
        "Object storage failed",
        Some(err.to_string()),
    )
}

pub(crate) fn post_to_api(err: PostWorkflowError) -> ApiError {
    match err {
        PostWorkflowError::Validation(inner) => media_to_api(inner),
        PostWorkflowError::NotFound => ApiError::not_found("post not found"),
        PostWorkflowError::Busy => ApiError::conflict(
            codes::SUBMISSION_IN_PROGRESS,
            "A submission for this post is already in progress",
        ),
        PostWorkflowError::Repo(repo) => repo_to_api(repo),
        PostWorkflowError::Storage(storage) => storage_to_api(storage),
    }
}
