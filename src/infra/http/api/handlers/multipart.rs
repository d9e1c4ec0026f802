//! Decoding of `multipart/form-data` post submissions.
//!
//! A submission carries one `manifest` part holding JSON and any number of
//! `file` parts, kept in the order they arrive. Other parts are ignored.

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::domain::media::PendingFile;
use crate::infra::http::api::error::{ApiError, codes};

const MANIFEST_FIELD: &str = "manifest";
const FILE_FIELD: &str = "file";

pub(super) struct Submission {
    manifest: Option<Bytes>,
    pub files: Vec<PendingFile>,
}

impl Submission {
    pub async fn read(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut manifest = None;
        let mut files = Vec::new();

        while let Some(field) = multipart.next_field().await.map_err(multipart_to_api)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some(MANIFEST_FIELD) => {
                    manifest = Some(field.bytes().await.map_err(multipart_to_api)?);
                }
                Some(FILE_FIELD) => {
                    let filename = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await.map_err(multipart_to_api)?;
                    files.push(PendingFile::new(filename, content_type.as_deref(), data));
                }
                _ => {}
            }
        }

        Ok(Self { manifest, files })
    }

    pub fn manifest<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let raw = self
            .manifest
            .as_ref()
            .ok_or_else(|| ApiError::bad_request("missing manifest", None))?;
        serde_json::from_slice(raw)
            .map_err(|err| ApiError::bad_request("invalid manifest", Some(err.to_string())))
    }
}

fn multipart_to_api(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            codes::PAYLOAD_TOO_LARGE,
            "Request body too large",
            Some(err.body_text()),
        )
    } else {
        ApiError::bad_request("invalid multipart payload", Some(err.body_text()))
    }
}
