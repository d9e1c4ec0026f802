//! Media selection for a post.
//!
//! A [`MediaSet`] is one ordered list of [`MediaItem`]s where every item owns
//! its note, so media and notes cannot drift out of alignment. Every
//! submission is built through this type, whether it starts empty (a new
//! post) or hydrated from persisted records (an edit).

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::MediaRecord;

/// Upper bound on media items per post.
pub const MAX_MEDIA_PER_POST: usize = 10;

/// Upper bound on a single media file (100 MiB).
pub const MAX_MEDIA_FILE_BYTES: u64 = 100 * 1024 * 1024;

/// Minimum post title length, counted in characters after trimming.
pub const MIN_TITLE_CHARS: usize = 3;

/// Content types a media file may carry.
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "video/mp4",
    "video/webm",
];

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaValidationError {
    #[error("a post holds at most {max} media items ({current} selected, {incoming} added)")]
    TooManyItems {
        current: usize,
        incoming: usize,
        max: usize,
    },
    #[error("`{filename}` is {size} bytes, above the {max} byte limit")]
    FileTooLarge {
        filename: String,
        size: u64,
        max: u64,
    },
    #[error("`{filename}` has unsupported type `{content_type}`")]
    UnsupportedType {
        filename: String,
        content_type: String,
    },
    #[error("`{filename}` is empty")]
    EmptyFile { filename: String },
    #[error("no media item at index {index} (set holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("media item {index} needs a note")]
    MissingNote { index: usize },
    #[error("a post needs at least one media item")]
    NoMedia,
    #[error("title must be at least {min} characters")]
    TitleTooShort { min: usize },
    #[error("media `{id}` does not belong to this post")]
    UnknownMedia { id: Uuid },
    #[error("{notes} notes supplied for {files} files")]
    NoteCountMismatch { files: usize, notes: usize },
}

/// Validate a post title and return it trimmed.
pub fn validate_title(title: &str) -> Result<String, MediaValidationError> {
    let trimmed = title.trim();
    if trimmed.chars().count() < MIN_TITLE_CHARS {
        return Err(MediaValidationError::TitleTooShort {
            min: MIN_TITLE_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

/// A file selected for upload but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl PendingFile {
    /// Build a pending file, normalising the declared content type. A missing
    /// or generic type is resolved from the filename extension.
    pub fn new(filename: impl Into<String>, content_type: Option<&str>, bytes: Bytes) -> Self {
        let filename = filename.into();
        let content_type = normalize_content_type(&filename, content_type);
        Self {
            filename,
            content_type,
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn check(&self) -> Result<(), MediaValidationError> {
        if !ACCEPTED_CONTENT_TYPES.contains(&self.content_type.as_str()) {
            return Err(MediaValidationError::UnsupportedType {
                filename: self.filename.clone(),
                content_type: self.content_type.clone(),
            });
        }
        if self.bytes.is_empty() {
            return Err(MediaValidationError::EmptyFile {
                filename: self.filename.clone(),
            });
        }
        if self.size() > MAX_MEDIA_FILE_BYTES {
            return Err(MediaValidationError::FileTooLarge {
                filename: self.filename.clone(),
                size: self.size(),
                max: MAX_MEDIA_FILE_BYTES,
            });
        }
        Ok(())
    }
}

fn normalize_content_type(filename: &str, declared: Option<&str>) -> String {
    let essence = declared
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value != FALLBACK_CONTENT_TYPE);

    match essence {
        Some(value) => value,
        None => mime_guess::from_path(filename)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Selected locally, uploaded on submit.
    Pending(PendingFile),
    /// Already stored; addressed by its public URL.
    Remote { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub source: MediaSource,
    pub note: String,
    /// Present only once the item has been persisted.
    pub id: Option<Uuid>,
}

impl MediaItem {
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn pending_file(&self) -> Option<&PendingFile> {
        match &self.source {
            MediaSource::Pending(file) => Some(file),
            MediaSource::Remote { .. } => None,
        }
    }

    /// A reference a client can render: the stored URL, or a `data:` URL
    /// carrying the file contents for items that are not uploaded yet.
    pub fn preview(&self) -> String {
        match &self.source {
            MediaSource::Remote { url } => url.clone(),
            MediaSource::Pending(file) => format!(
                "data:{};base64,{}",
                file.content_type,
                STANDARD.encode(&file.bytes)
            ),
        }
    }
}

/// Ordered media selection with per-item notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSet {
    items: Vec<MediaItem>,
}

impl MediaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from persisted records, keeping their stored order.
    pub fn hydrate<'a>(records: impl IntoIterator<Item = &'a MediaRecord>) -> Self {
        let mut records: Vec<&MediaRecord> = records.into_iter().collect();
        records.sort_by_key(|record| record.position);
        let items = records
            .into_iter()
            .map(|record| MediaItem {
                source: MediaSource::Remote {
                    url: record.url.clone(),
                },
                note: record.note.clone(),
                id: Some(record.id),
            })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<MediaItem> {
        self.items
    }

    /// Append one new item with an empty note per file, in arrival order.
    ///
    /// The batch is all-or-nothing: if the resulting count would exceed
    /// [`MAX_MEDIA_PER_POST`] or any file fails the size/type checks, nothing
    /// is added. An empty batch is a no-op.
    pub fn add_files(&mut self, files: Vec<PendingFile>) -> Result<(), MediaValidationError> {
        if files.is_empty() {
            return Ok(());
        }

        if self.items.len() + files.len() > MAX_MEDIA_PER_POST {
            return Err(MediaValidationError::TooManyItems {
                current: self.items.len(),
                incoming: files.len(),
                max: MAX_MEDIA_PER_POST,
            });
        }

        for file in &files {
            file.check()?;
        }

        self.items.extend(files.into_iter().map(|file| MediaItem {
            source: MediaSource::Pending(file),
            note: String::new(),
            id: None,
        }));
        Ok(())
    }

    /// Remove the item at `index`; later items shift down by one.
    pub fn remove_item(&mut self, index: usize) -> Result<MediaItem, MediaValidationError> {
        self.ensure_index(index)?;
        Ok(self.items.remove(index))
    }

    /// Remove a persisted item by its identifier.
    pub fn remove_persisted(&mut self, id: Uuid) -> Result<MediaItem, MediaValidationError> {
        let index = self
            .position_of(id)
            .ok_or(MediaValidationError::UnknownMedia { id })?;
        self.remove_item(index)
    }

    pub fn clear_all(&mut self) {
        self.items.clear();
    }

    pub fn update_note(
        &mut self,
        index: usize,
        text: impl Into<String>,
    ) -> Result<(), MediaValidationError> {
        self.ensure_index(index)?;
        self.items[index].note = text.into();
        Ok(())
    }

    pub fn position_of(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|item| item.id == Some(id))
    }

    pub fn preview(&self, index: usize) -> Result<String, MediaValidationError> {
        self.ensure_index(index)?;
        Ok(self.items[index].preview())
    }

    /// Checks applied when the set is submitted: between one and
    /// [`MAX_MEDIA_PER_POST`] items, each with a non-blank note.
    pub fn validate_for_submit(&self) -> Result<(), MediaValidationError> {
        if self.items.is_empty() {
            return Err(MediaValidationError::NoMedia);
        }
        if self.items.len() > MAX_MEDIA_PER_POST {
            return Err(MediaValidationError::TooManyItems {
                current: self.items.len(),
                incoming: 0,
                max: MAX_MEDIA_PER_POST,
            });
        }
        if let Some(index) = self
            .items
            .iter()
            .position(|item| item.note.trim().is_empty())
        {
            return Err(MediaValidationError::MissingNote { index });
        }
        Ok(())
    }

    fn ensure_index(&self, index: usize) -> Result<(), MediaValidationError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(MediaValidationError::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn jpeg(name: &str) -> PendingFile {
        PendingFile::new(name, Some("image/jpeg"), Bytes::from_static(b"\xff\xd8\xff"))
    }

    fn notes(set: &MediaSet) -> Vec<&str> {
        set.items().iter().map(|item| item.note.as_str()).collect()
    }

    fn filenames(set: &MediaSet) -> Vec<&str> {
        set.items()
            .iter()
            .filter_map(|item| item.pending_file())
            .map(|file| file.filename.as_str())
            .collect()
    }

    #[test]
    fn add_files_appends_items_with_empty_notes_in_order() {
        let mut set = MediaSet::new();
        set.add_files(vec![jpeg("a.jpg"), jpeg("b.jpg")]).unwrap();

        assert_eq!(filenames(&set), vec!["a.jpg", "b.jpg"]);
        assert_eq!(notes(&set), vec!["", ""]);
        assert!(set.items().iter().all(MediaItem::is_new));
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let mut set = MediaSet::new();
        set.add_files(vec![jpeg("a.jpg")]).unwrap();
        set.add_files(Vec::new()).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn eleventh_file_rejects_the_whole_batch() {
        let mut set = MediaSet::new();
        set.add_files((0..10).map(|i| jpeg(&format!("{i}.jpg"))).collect())
            .unwrap();
        let before = set.clone();

        let err = set.add_files(vec![jpeg("extra.jpg")]).unwrap_err();
        assert_eq!(
            err,
            MediaValidationError::TooManyItems {
                current: 10,
                incoming: 1,
                max: MAX_MEDIA_PER_POST
            }
        );
        assert_eq!(set, before);
    }

    #[test]
    fn one_bad_file_rejects_the_whole_batch() {
        let mut set = MediaSet::new();
        set.add_files(vec![jpeg("keep.jpg")]).unwrap();
        set.update_note(0, "kept").unwrap();
        let before = set.clone();

        let text = PendingFile::new("notes.txt", Some("text/plain"), Bytes::from_static(b"hi"));
        let err = set.add_files(vec![jpeg("ok.jpg"), text]).unwrap_err();
        assert!(matches!(err, MediaValidationError::UnsupportedType { .. }));
        assert_eq!(set, before);
    }

    #[test]
    fn plain_text_is_always_rejected() {
        for declared in [Some("text/plain"), Some("TEXT/PLAIN; charset=utf-8"), None] {
            let file = PendingFile::new("readme.txt", declared, Bytes::from_static(b"x"));
            let mut set = MediaSet::new();
            assert!(matches!(
                set.add_files(vec![file]),
                Err(MediaValidationError::UnsupportedType { .. })
            ));
            assert!(set.is_empty());
        }
    }

    #[test]
    fn oversized_file_is_rejected() {
        let big = Bytes::from(vec![0u8; (MAX_MEDIA_FILE_BYTES + 1) as usize]);
        let file = PendingFile::new("huge.mp4", Some("video/mp4"), big);
        let mut set = MediaSet::new();
        assert!(matches!(
            set.add_files(vec![file]),
            Err(MediaValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn generic_content_type_is_resolved_from_extension() {
        let file = PendingFile::new(
            "clip.webm",
            Some("application/octet-stream"),
            Bytes::from_static(b"1"),
        );
        assert_eq!(file.content_type, "video/webm");

        let file = PendingFile::new("photo.PNG", None, Bytes::from_static(b"1"));
        assert_eq!(file.content_type, "image/png");
    }

    #[test]
    fn remove_item_shifts_later_items_down() {
        let mut set = MediaSet::new();
        set.add_files(vec![jpeg("a.jpg"), jpeg("b.jpg"), jpeg("c.jpg")])
            .unwrap();
        for (index, note) in ["na", "nb", "nc"].into_iter().enumerate() {
            set.update_note(index, note).unwrap();
        }

        let removed = set.remove_item(1).unwrap();
        assert_eq!(removed.note, "nb");
        assert_eq!(filenames(&set), vec!["a.jpg", "c.jpg"]);
        assert_eq!(notes(&set), vec!["na", "nc"]);
    }

    #[test]
    fn out_of_range_operations_leave_state_unchanged() {
        let mut set = MediaSet::new();
        set.add_files(vec![jpeg("a.jpg")]).unwrap();
        let before = set.clone();

        assert_eq!(
            set.remove_item(1).unwrap_err(),
            MediaValidationError::IndexOutOfRange { index: 1, len: 1 }
        );
        assert!(set.update_note(3, "x").is_err());
        assert_eq!(set, before);
    }

    #[test]
    fn mixed_operations_keep_every_item_paired_with_one_note() {
        let mut set = MediaSet::new();
        let steps: Vec<Box<dyn Fn(&mut MediaSet)>> = vec![
            Box::new(|s| s.add_files(vec![jpeg("1.jpg"), jpeg("2.jpg")]).unwrap()),
            Box::new(|s| {
                let _ = s.remove_item(0);
            }),
            Box::new(|s| {
                let _ = s.add_files((0..20).map(|i| jpeg(&format!("{i}.jpg"))).collect());
            }),
            Box::new(|s| s.add_files(vec![jpeg("3.jpg")]).unwrap()),
            Box::new(|s| {
                let _ = s.remove_item(7);
            }),
            Box::new(|s| s.update_note(1, "hello").unwrap()),
        ];

        for step in steps {
            step(&mut set);
            let with_notes = set.items().iter().map(|item| &item.note).count();
            assert_eq!(with_notes, set.len());
        }
        assert_eq!(filenames(&set), vec!["2.jpg", "3.jpg"]);
        assert_eq!(notes(&set), vec!["", "hello"]);
    }

    #[test]
    fn clear_all_empties_the_set() {
        let mut set = MediaSet::new();
        set.add_files(vec![jpeg("a.jpg")]).unwrap();
        set.clear_all();
        assert!(set.is_empty());
        assert_eq!(set.validate_for_submit(), Err(MediaValidationError::NoMedia));
    }

    #[test]
    fn submit_requires_non_blank_notes() {
        let mut set = MediaSet::new();
        set.add_files(vec![jpeg("a.jpg"), jpeg("b.jpg")]).unwrap();
        set.update_note(0, "a").unwrap();
        set.update_note(1, "   ").unwrap();
        assert_eq!(
            set.validate_for_submit(),
            Err(MediaValidationError::MissingNote { index: 1 })
        );

        set.update_note(1, "b").unwrap();
        assert!(set.validate_for_submit().is_ok());
    }

    #[test]
    fn title_needs_three_characters() {
        assert!(validate_title("ab").is_err());
        assert!(validate_title("  ab  ").is_err());
        assert_eq!(validate_title(" Trip ").unwrap(), "Trip");
        assert!(validate_title("été").is_ok());
    }

    #[test]
    fn hydrated_items_are_persisted_and_ordered() {
        let post_id = Uuid::new_v4();
        let record = |position: i32, note: &str| MediaRecord {
            id: Uuid::new_v4(),
            post_id,
            url: format!("http://host/storage/memoria/{position}.jpg"),
            note: note.to_string(),
            position,
            created_at: OffsetDateTime::now_utc(),
        };
        let second = record(1, "second");
        let first = record(0, "first");

        let mut set = MediaSet::hydrate([&second, &first]);
        assert_eq!(notes(&set), vec!["first", "second"]);
        assert!(set.items().iter().all(|item| !item.is_new()));
        assert_eq!(set.preview(1).unwrap(), second.url);

        set.remove_persisted(first.id).unwrap();
        assert_eq!(set.position_of(second.id), Some(0));
        assert_eq!(
            set.remove_persisted(first.id).unwrap_err(),
            MediaValidationError::UnknownMedia { id: first.id }
        );
    }

    #[test]
    fn pending_preview_is_a_data_url() {
        let mut set = MediaSet::new();
        set.add_files(vec![jpeg("a.jpg")]).unwrap();
        assert_eq!(set.preview(0).unwrap(), "data:image/jpeg;base64,/9j/");
    }
}
