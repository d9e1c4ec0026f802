//! Object storage key and public URL conventions.

use std::fmt::{Display, Formatter};
use std::path::Path;

use uuid::Uuid;

use crate::domain::error::DomainError;

const FALLBACK_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 10;

/// Relative path of an object inside the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Accept a key recovered from elsewhere, rejecting anything that could
    /// escape the bucket.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        if raw.is_empty() || raw.starts_with('/') || raw.contains('\\') {
            return Err(DomainError::validation(format!(
                "invalid storage key `{raw}`"
            )));
        }
        if raw
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(DomainError::validation(format!(
                "invalid storage key `{raw}`"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// `{owner}/{post}/{epoch_millis}-{index}.{extension}`
    pub fn for_media(
        owner_id: Uuid,
        post_id: Uuid,
        epoch_millis: i64,
        index: usize,
        extension: &str,
    ) -> Self {
        Self(format!(
            "{owner_id}/{post_id}/{epoch_millis}-{index}.{extension}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extension used in a media key: the original filename's, lowercased, or
/// one implied by the content type when the filename has none usable.
pub fn media_extension(filename: &str, content_type: &str) -> String {
    let from_name = Path::new(filename)
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .filter(|value| {
            !value.is_empty()
                && value.len() <= MAX_EXTENSION_LEN
                && value.chars().all(|ch| ch.is_ascii_alphanumeric())
        });

    if let Some(extension) = from_name {
        return extension;
    }

    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => FALLBACK_EXTENSION,
    }
    .to_string()
}

/// Maps keys to public URLs of the form `{base}/{bucket}/{key}` and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUrlScheme {
    base: String,
    bucket: String,
}

impl PublicUrlScheme {
    pub fn new(base: impl Into<String>, bucket: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        let bucket = bucket.into().trim_matches('/').to_string();
        Self { base, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn url_for(&self, key: &StorageKey) -> String {
        format!("{}/{}/{}", self.base, self.bucket, key)
    }

    /// Recover the key from a URL produced by [`Self::url_for`]. URLs that
    /// point elsewhere yield `None`.
    pub fn key_for(&self, url: &str) -> Option<StorageKey> {
        let prefix = format!("{}/{}/", self.base, self.bucket);
        let raw = url.strip_prefix(&prefix)?;
        let raw = raw.split(['?', '#']).next().unwrap_or(raw);
        StorageKey::parse(raw).ok()
    }
}
