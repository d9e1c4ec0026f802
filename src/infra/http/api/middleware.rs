use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, StatusCode, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::api_keys::ApiAuthError;

use super::error::ApiError;
use super::state::ApiState;

/// Resolve the API key on the request into an [`ApiPrincipal`] and make it
/// available to handlers. The principal is also copied onto the response so
/// the logging layer can attribute failures to a key and owner.
///
/// [`ApiPrincipal`]: crate::application::api_keys::ApiPrincipal
pub async fn api_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = extract_token(request.headers().get(AUTHORIZATION)).or_else(|| {
        request
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok().map(|s| s.to_string()))
    });

    let token = match token {
        Some(value) => value,
        None => return ApiError::unauthorized().into_response(),
    };

    let principal = match state.api_keys.authenticate(&token).await {
        Ok(principal) => principal,
        Err(ApiAuthError::Missing) | Err(ApiAuthError::Invalid) => {
            return ApiError::unauthorized().into_response();
        }
        Err(ApiAuthError::Expired) => {
            return ApiError::new(StatusCode::UNAUTHORIZED, "expired", "API key expired", None)
                .into_response();
        }
        Err(ApiAuthError::Revoked) => {
            return ApiError::new(StatusCode::UNAUTHORIZED, "revoked", "API key revoked", None)
                .into_response();
        }
        Err(ApiAuthError::Forbidden(_)) => return ApiError::forbidden().into_response(),
    };

    request.extensions_mut().insert(principal.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(principal);
    response
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.to_string())
}
