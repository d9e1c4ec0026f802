use std::{io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use tracing::error;

use crate::{
    application::{error::HttpError, repos::HealthRepo},
    infra::uploads::{LocalObjectStorage, LocalStorageError},
};

use super::{
    RouterState, db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub storage: Arc<LocalObjectStorage>,
    pub health: Arc<dyn HealthRepo>,
}

pub fn build_router(state: RouterState) -> Router<RouterState> {
    Router::new()
        .route("/_health/db", get(public_health))
        .route("/storage/{bucket}/{*key}", get(serve_object))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

async fn serve_object(
    State(state): State<HttpState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_object";

    let not_found = || {
        HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Object not found",
            "The requested object is not available",
        )
        .into_response()
    };

    if bucket != state.storage.bucket() {
        return not_found();
    }

    match state.storage.read(&key).await {
        Ok(bytes) => build_object_response(&key, bytes),
        Err(LocalStorageError::InvalidPath) => not_found(),
        Err(LocalStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => not_found(),
        Err(err) => {
            error!(
                target = SOURCE,
                key = %key,
                error = %err,
                "failed to read stored object"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read stored object",
                &err,
            )
            .into_response()
        }
    }
}

fn build_object_response(key: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(key).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    // keys embed a timestamp, so an object never changes once written
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
