use std::collections::HashSet;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, histogram};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{CreateMediaParams, CreatePostParams, UpdateMediaParams};
use crate::domain::entities::{MediaRecord, PostRecord, PostWithMedia};
use crate::domain::media::{
    MediaItem, MediaSet, MediaValidationError, PendingFile, validate_title,
};
use crate::domain::storage_keys::{StorageKey, media_extension};

use super::service::PostService;
use super::submission::SubmissionTarget;
use super::types::{
    CreatePostCommand, CurrentUser, DeletePostOutcome, PartialCleanupWarning, PostWorkflowError,
    UpdatePostCommand, UpdatePostOutcome,
};

const SOURCE: &str = "application::posts";

const METRIC_SUBMISSIONS: &str = "memoria_post_submissions_total";
const METRIC_SUBMIT_MS: &str = "memoria_post_submit_duration_ms";
const METRIC_UPLOADS: &str = "memoria_media_uploads_total";
const METRIC_CLEANUP_WARNINGS: &str = "memoria_storage_cleanup_warnings_total";

/// One new item to upload and record.
struct UploadJob<'a> {
    position: usize,
    file: &'a PendingFile,
    note: &'a str,
}

struct StoredMedia {
    key: StorageKey,
    record: MediaRecord,
}

/// Settled result of a joined upload group.
struct UploadBatch {
    stored: Vec<StoredMedia>,
    /// Uploaded objects whose record insert failed.
    orphaned: Vec<StorageKey>,
    first_error: Option<PostWorkflowError>,
}

impl UploadBatch {
    fn uploaded_keys(&self) -> Vec<StorageKey> {
        self.stored
            .iter()
            .map(|stored| stored.key.clone())
            .chain(self.orphaned.iter().cloned())
            .collect()
    }
}

impl PostService {
    pub async fn create(
        &self,
        user: &CurrentUser,
        command: CreatePostCommand,
    ) -> Result<PostWithMedia, PostWorkflowError> {
        let title = validate_title(&command.title)?;
        command.media.validate_for_submit()?;
        if let Some(id) = command.media.items().iter().find_map(|item| item.id) {
            return Err(MediaValidationError::UnknownMedia { id }.into());
        }

        let ticket = self
            .submissions
            .begin(user.id(), SubmissionTarget::NewPost)?;
        let started = Instant::now();
        let result = self.run_create(user, title, command.media.items()).await;
        record_submission("create", started, &result);
        ticket.settle(&result);
        result
    }

    async fn run_create(
        &self,
        user: &CurrentUser,
        title: String,
        items: &[MediaItem],
    ) -> Result<PostWithMedia, PostWorkflowError> {
        let post = self
            .posts
            .create_post(CreatePostParams {
                owner_id: user.id(),
                title,
            })
            .await?;

        let mut batch = self.store_items(user, post.id, upload_jobs(items)).await;
        if let Some(err) = batch.first_error.take() {
            self.remove_objects("create", batch.uploaded_keys()).await;
            if let Err(cleanup) = self.posts.delete_post(user.id(), post.id).await {
                warn_cleanup(PartialCleanupWarning {
                    operation: "create",
                    key: None,
                    message: format!("failed to roll back post {}: {cleanup}", post.id),
                });
            }
            return Err(err);
        }

        info!(
            target = SOURCE,
            post_id = %post.id,
            owner_id = %user.id(),
            media = batch.stored.len(),
            "post created"
        );
        let media = batch.stored.into_iter().map(|stored| stored.record).collect();
        Ok(PostWithMedia::new(post, media))
    }

    pub async fn update(
        &self,
        user: &CurrentUser,
        post_id: Uuid,
        command: UpdatePostCommand,
    ) -> Result<UpdatePostOutcome, PostWorkflowError> {
        let title = validate_title(&command.title)?;
        command.media.validate_for_submit()?;

        // Held before the persisted set is read so a concurrent submission
        // cannot change it underneath this one.
        let ticket = self
            .submissions
            .begin(user.id(), SubmissionTarget::Post(post_id))?;
        let (post, persisted) = match self.load_for_update(user, post_id, &command.media).await {
            Ok(loaded) => loaded,
            Err(err) => {
                ticket.release();
                return Err(err);
            }
        };

        let started = Instant::now();
        let result = self
            .run_update(user, post, persisted, title, command.media.items())
            .await;
        record_submission("update", started, &result);
        ticket.settle(&result);
        result
    }

    async fn load_for_update(
        &self,
        user: &CurrentUser,
        post_id: Uuid,
        media: &MediaSet,
    ) -> Result<(PostRecord, Vec<MediaRecord>), PostWorkflowError> {
        let post = self
            .posts
            .find_post(user.id(), post_id)
            .await?
            .ok_or(PostWorkflowError::NotFound)?;
        let persisted = self.media.list_for_post(post.id).await?;
        let persisted_ids: HashSet<Uuid> = persisted.iter().map(|record| record.id).collect();
        if let Some(id) = media
            .items()
            .iter()
            .filter_map(|item| item.id)
            .find(|id| !persisted_ids.contains(id))
        {
            return Err(MediaValidationError::UnknownMedia { id }.into());
        }
        Ok((post, persisted))
    }

    async fn run_update(
        &self,
        user: &CurrentUser,
        mut post: PostRecord,
        persisted: Vec<MediaRecord>,
        title: String,
        items: &[MediaItem],
    ) -> Result<UpdatePostOutcome, PostWorkflowError> {
        if post.title != title {
            post = self.posts.update_title(user.id(), post.id, &title).await?;
        }

        // Kept items: refresh note and position where they changed.
        for (position, item) in items.iter().enumerate() {
            let Some(id) = item.id else { continue };
            let Some(record) = persisted.iter().find(|record| record.id == id) else {
                continue;
            };
            let note = item.note.trim();
            let position = position_of(position);
            if record.note != note || record.position != position {
                self.media
                    .update_media(UpdateMediaParams {
                        id,
                        note: note.to_string(),
                        position,
                    })
                    .await?;
            }
        }

        let mut batch = self.store_items(user, post.id, upload_jobs(items)).await;
        if let Some(err) = batch.first_error.take() {
            self.roll_back_additions(post.id, &batch.stored, batch.uploaded_keys())
                .await;
            return Err(err);
        }
        let added = batch.stored.len();

        let kept: HashSet<Uuid> = items.iter().filter_map(|item| item.id).collect();
        let removed: Vec<&MediaRecord> = persisted
            .iter()
            .filter(|record| !kept.contains(&record.id))
            .collect();

        let mut warnings = Vec::new();
        if !removed.is_empty() {
            let (keys, unresolved) = self.keys_for(&removed, "update");
            warnings.extend(unresolved);
            warnings.extend(self.remove_objects("update", keys).await);
            let ids: Vec<Uuid> = removed.iter().map(|record| record.id).collect();
            self.media.delete_media(post.id, &ids).await?;
        }

        info!(
            target = SOURCE,
            post_id = %post.id,
            added,
            removed = removed.len(),
            warnings = warnings.len(),
            "post updated"
        );

        let media = self.media.list_for_post(post.id).await?;
        Ok(UpdatePostOutcome {
            post: PostWithMedia::new(post, media),
            warnings,
        })
    }

    pub async fn delete(
        &self,
        user: &CurrentUser,
        post_id: Uuid,
    ) -> Result<DeletePostOutcome, PostWorkflowError> {
        let ticket = self
            .submissions
            .begin(user.id(), SubmissionTarget::Post(post_id))?;
        let post = match self.posts.find_post(user.id(), post_id).await {
            Ok(Some(post)) => post,
            Ok(None) => {
                ticket.release();
                return Err(PostWorkflowError::NotFound);
            }
            Err(err) => {
                ticket.release();
                return Err(err.into());
            }
        };

        let started = Instant::now();
        let result = self.run_delete(user, &post).await;
        record_submission("delete", started, &result);
        ticket.settle(&result);
        result
    }

    async fn run_delete(
        &self,
        user: &CurrentUser,
        post: &PostRecord,
    ) -> Result<DeletePostOutcome, PostWorkflowError> {
        let media = self.media.list_for_post(post.id).await?;
        let records: Vec<&MediaRecord> = media.iter().collect();
        let (keys, mut warnings) = self.keys_for(&records, "delete");
        let attempted_keys = keys.len();
        warnings.extend(self.remove_objects("delete", keys).await);

        self.posts.delete_post(user.id(), post.id).await?;

        info!(
            target = SOURCE,
            post_id = %post.id,
            attempted_keys,
            warnings = warnings.len(),
            "post deleted"
        );
        Ok(DeletePostOutcome {
            post_id: post.id,
            attempted_keys,
            warnings,
        })
    }

    /// Upload and record every job concurrently, waiting for all of them.
    async fn store_items(
        &self,
        user: &CurrentUser,
        post_id: Uuid,
        jobs: Vec<UploadJob<'_>>,
    ) -> UploadBatch {
        let epoch_millis = epoch_millis();
        let results = join_all(
            jobs.into_iter()
                .map(|job| self.store_item(user, post_id, epoch_millis, job)),
        )
        .await;

        let mut batch = UploadBatch {
            stored: Vec::new(),
            orphaned: Vec::new(),
            first_error: None,
        };
        for result in results {
            match result {
                Ok(stored) => batch.stored.push(stored),
                Err((err, key)) => {
                    batch.orphaned.extend(key);
                    if batch.first_error.is_none() {
                        batch.first_error = Some(err);
                    }
                }
            }
        }
        batch
    }

    async fn store_item(
        &self,
        user: &CurrentUser,
        post_id: Uuid,
        epoch_millis: i64,
        job: UploadJob<'_>,
    ) -> Result<StoredMedia, (PostWorkflowError, Option<StorageKey>)> {
        let extension = media_extension(&job.file.filename, &job.file.content_type);
        let key = StorageKey::for_media(user.id(), post_id, epoch_millis, job.position, &extension);

        if let Err(err) = self
            .storage
            .upload(&key, job.file.bytes.clone(), &job.file.content_type)
            .await
        {
            counter!(METRIC_UPLOADS, "outcome" => "error").increment(1);
            return Err((err.into(), None));
        }
        counter!(METRIC_UPLOADS, "outcome" => "ok").increment(1);

        let url = self.storage.public_url(&key);
        match self
            .media
            .insert_media(CreateMediaParams {
                post_id,
                url,
                note: job.note.trim().to_string(),
                position: position_of(job.position),
            })
            .await
        {
            Ok(record) => Ok(StoredMedia { key, record }),
            Err(err) => Err((err.into(), Some(key))),
        }
    }

    async fn roll_back_additions(
        &self,
        post_id: Uuid,
        stored: &[StoredMedia],
        keys: Vec<StorageKey>,
    ) {
        self.remove_objects("update", keys).await;
        if stored.is_empty() {
            return;
        }
        let ids: Vec<Uuid> = stored.iter().map(|stored| stored.record.id).collect();
        if let Err(err) = self.media.delete_media(post_id, &ids).await {
            warn_cleanup(PartialCleanupWarning {
                operation: "update",
                key: None,
                message: format!("failed to roll back {} media records: {err}", ids.len()),
            });
        }
    }

    /// Best-effort batch removal; every failure becomes a warning.
    async fn remove_objects(
        &self,
        operation: &'static str,
        keys: Vec<StorageKey>,
    ) -> Vec<PartialCleanupWarning> {
        if keys.is_empty() {
            return Vec::new();
        }

        let warnings: Vec<PartialCleanupWarning> = match self.storage.remove_batch(&keys).await {
            Ok(report) => report
                .failed
                .into_iter()
                .map(|(key, message)| PartialCleanupWarning {
                    operation,
                    key: Some(key.to_string()),
                    message,
                })
                .collect(),
            Err(err) => vec![PartialCleanupWarning {
                operation,
                key: None,
                message: format!("removal of {} objects failed: {err}", keys.len()),
            }],
        };

        for warning in &warnings {
            warn_cleanup(warning.clone());
        }
        warnings
    }

    /// Recover storage keys from public URLs. URLs outside the bucket are
    /// reported instead of removed.
    fn keys_for(
        &self,
        records: &[&MediaRecord],
        operation: &'static str,
    ) -> (Vec<StorageKey>, Vec<PartialCleanupWarning>) {
        let scheme = self.storage.url_scheme();
        let mut keys = Vec::with_capacity(records.len());
        let mut warnings = Vec::new();
        for record in records {
            match scheme.key_for(&record.url) {
                Some(key) => keys.push(key),
                None => {
                    let warning = PartialCleanupWarning {
                        operation,
                        key: None,
                        message: format!("media {} has a foreign url `{}`", record.id, record.url),
                    };
                    warn_cleanup(warning.clone());
                    warnings.push(warning);
                }
            }
        }
        (keys, warnings)
    }
}

fn upload_jobs(items: &[MediaItem]) -> Vec<UploadJob<'_>> {
    items
        .iter()
        .enumerate()
        .filter_map(|(position, item)| {
            item.pending_file().map(|file| UploadJob {
                position,
                file,
                note: &item.note,
            })
        })
        .collect()
}

fn position_of(index: usize) -> i32 {
    // bounded by MAX_MEDIA_PER_POST
    i32::try_from(index).unwrap_or(i32::MAX)
}

fn epoch_millis() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}

fn warn_cleanup(warning: PartialCleanupWarning) {
    counter!(METRIC_CLEANUP_WARNINGS, "operation" => warning.operation).increment(1);
    warn!(
        target = SOURCE,
        operation = warning.operation,
        key = warning.key.as_deref().unwrap_or("-"),
        error = %warning.message,
        "storage cleanup incomplete"
    );
}

fn record_submission<T>(
    operation: &'static str,
    started: Instant,
    result: &Result<T, PostWorkflowError>,
) {
    let outcome = match result {
        Ok(_) => "success",
        Err(err) if err.is_remote() => "remote_error",
        Err(_) => "rejected",
    };
    counter!(METRIC_SUBMISSIONS, "operation" => operation, "outcome" => outcome).increment(1);
    histogram!(METRIC_SUBMIT_MS, "operation" => operation)
        .record(started.elapsed().as_secs_f64() * 1000.0);
    if let Err(err) = result {
        warn!(target = SOURCE, operation, error = %err, "post submission failed");
    }
}
