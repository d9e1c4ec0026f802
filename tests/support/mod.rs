//! In-memory stand-ins for the record store and object storage.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use memoria::application::posts::PostService;
use memoria::application::repos::{
    ApiKeysRepo, CreateApiKeyParams, CreateMediaParams, CreatePostParams, HealthRepo, MediaRepo,
    PostsRepo, RepoError, UpdateMediaParams,
};
use memoria::application::storage::{ObjectStorage, RemovalReport, StorageError};
use memoria::domain::api_keys::{ApiKeyRecord, ApiKeyStatus};
use memoria::domain::entities::{MediaRecord, PostRecord};
use memoria::domain::media::PendingFile;
use memoria::domain::storage_keys::{PublicUrlScheme, StorageKey};

/// Upload payload that [`MemoryStorage`] refuses to store.
pub const FAILING_PAYLOAD: &[u8] = b"storage says no";

pub const PUBLIC_BASE: &str = "http://media.test/storage";
pub const BUCKET: &str = "memoria";

#[derive(Default)]
struct Records {
    posts: Vec<PostRecord>,
    media: Vec<MediaRecord>,
}

/// Posts and media sharing one lock, so deleting a post drops its media.
#[derive(Default)]
pub struct MemoryRecords {
    inner: Mutex<Records>,
    pub fail_post_delete: AtomicBool,
    pub fail_media_insert: AtomicBool,
    pub fail_media_delete: AtomicBool,
}

impl MemoryRecords {
    pub async fn post_count(&self) -> usize {
        self.inner.lock().await.posts.len()
    }

    pub async fn media_count(&self) -> usize {
        self.inner.lock().await.media.len()
    }

    pub async fn media_for(&self, post_id: Uuid) -> Vec<MediaRecord> {
        let mut media: Vec<MediaRecord> = self
            .inner
            .lock()
            .await
            .media
            .iter()
            .filter(|record| record.post_id == post_id)
            .cloned()
            .collect();
        media.sort_by_key(|record| record.position);
        media
    }

    /// Insert a media record directly, bypassing the workflow.
    pub async fn seed_media(&self, post_id: Uuid, url: &str, note: &str, position: i32) {
        self.inner.lock().await.media.push(MediaRecord {
            id: Uuid::new_v4(),
            post_id,
            url: url.to_string(),
            note: note.to_string(),
            position,
            created_at: OffsetDateTime::now_utc(),
        });
    }
}

#[async_trait]
impl PostsRepo for MemoryRecords {
    async fn list_posts(&self, owner_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
        let records = self.inner.lock().await;
        let mut posts: Vec<PostRecord> = records
            .posts
            .iter()
            .filter(|post| post.owner_id == owner_id)
            .cloned()
            .collect();
        posts.reverse();
        Ok(posts)
    }

    async fn find_post(&self, owner_id: Uuid, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let records = self.inner.lock().await;
        Ok(records
            .posts
            .iter()
            .find(|post| post.id == id && post.owner_id == owner_id)
            .cloned())
    }

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let record = PostRecord {
            id: Uuid::new_v4(),
            title: params.title,
            owner_id: params.owner_id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.inner.lock().await.posts.push(record.clone());
        Ok(record)
    }

    async fn update_title(
        &self,
        owner_id: Uuid,
        id: Uuid,
        title: &str,
    ) -> Result<PostRecord, RepoError> {
        let mut records = self.inner.lock().await;
        let post = records
            .posts
            .iter_mut()
            .find(|post| post.id == id && post.owner_id == owner_id)
            .ok_or(RepoError::NotFound)?;
        post.title = title.to_string();
        Ok(post.clone())
    }

    async fn delete_post(&self, owner_id: Uuid, id: Uuid) -> Result<(), RepoError> {
        if self.fail_post_delete.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("delete refused".into()));
        }
        let mut records = self.inner.lock().await;
        let before = records.posts.len();
        records
            .posts
            .retain(|post| !(post.id == id && post.owner_id == owner_id));
        if records.posts.len() == before {
            return Err(RepoError::NotFound);
        }
        records.media.retain(|record| record.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl MediaRepo for MemoryRecords {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<MediaRecord>, RepoError> {
        Ok(self.media_for(post_id).await)
    }

    async fn list_for_posts(&self, post_ids: &[Uuid]) -> Result<Vec<MediaRecord>, RepoError> {
        let records = self.inner.lock().await;
        Ok(records
            .media
            .iter()
            .filter(|record| post_ids.contains(&record.post_id))
            .cloned()
            .collect())
    }

    async fn insert_media(&self, params: CreateMediaParams) -> Result<MediaRecord, RepoError> {
        if self.fail_media_insert.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("insert refused".into()));
        }
        let mut records = self.inner.lock().await;
        if !records.posts.iter().any(|post| post.id == params.post_id) {
            return Err(RepoError::Integrity {
                message: "media_post_id_fkey".into(),
            });
        }
        let record = MediaRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            url: params.url,
            note: params.note,
            position: params.position,
            created_at: OffsetDateTime::now_utc(),
        };
        records.media.push(record.clone());
        Ok(record)
    }

    async fn update_media(&self, params: UpdateMediaParams) -> Result<MediaRecord, RepoError> {
        let mut records = self.inner.lock().await;
        let record = records
            .media
            .iter_mut()
            .find(|record| record.id == params.id)
            .ok_or(RepoError::NotFound)?;
        record.note = params.note;
        record.position = params.position;
        Ok(record.clone())
    }

    async fn delete_media(&self, post_id: Uuid, ids: &[Uuid]) -> Result<u64, RepoError> {
        if self.fail_media_delete.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("media delete refused".into()));
        }
        let mut records = self.inner.lock().await;
        let before = records.media.len();
        records
            .media
            .retain(|record| !(record.post_id == post_id && ids.contains(&record.id)));
        Ok((before - records.media.len()) as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryRecords {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Object storage keeping bytes in a map and recording every removal call.
pub struct MemoryStorage {
    scheme: PublicUrlScheme,
    objects: Mutex<HashMap<String, Bytes>>,
    removals: Mutex<Vec<Vec<StorageKey>>>,
    pub fail_removals: AtomicBool,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            scheme: PublicUrlScheme::new(PUBLIC_BASE, BUCKET),
            objects: Mutex::new(HashMap::new()),
            removals: Mutex::new(Vec::new()),
            fail_removals: AtomicBool::new(false),
        }
    }
}

impl MemoryStorage {
    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.lock().await.contains_key(key)
    }

    pub async fn removal_calls(&self) -> Vec<Vec<StorageKey>> {
        self.removals.lock().await.clone()
    }

    pub async fn put(&self, key: &str, data: &'static [u8]) {
        self.objects
            .lock()
            .await
            .insert(key.to_string(), Bytes::from_static(data));
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        key: &StorageKey,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        if data.as_ref() == FAILING_PAYLOAD {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: "rejected by test storage".into(),
            });
        }
        self.objects.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn remove_batch(&self, keys: &[StorageKey]) -> Result<RemovalReport, StorageError> {
        self.removals.lock().await.push(keys.to_vec());
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("test storage offline".into()));
        }
        let mut objects = self.objects.lock().await;
        let mut report = RemovalReport::default();
        for key in keys {
            objects.remove(key.as_str());
            report.removed.push(key.clone());
        }
        Ok(report)
    }

    fn url_scheme(&self) -> &PublicUrlScheme {
        &self.scheme
    }
}

#[derive(Default)]
pub struct MemoryKeys {
    keys: Mutex<Vec<ApiKeyRecord>>,
}

#[async_trait]
impl ApiKeysRepo for MemoryKeys {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            name: params.name,
            description: params.description,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            scopes: params.scopes,
            owner_id: params.owner_id,
            status: ApiKeyStatus::Active,
            expires_at: params.expires_at,
            revoked_at: None,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };
        self.keys.lock().await.push(record.clone());
        Ok(record)
    }

    async fn list_keys(&self, owner_id: Option<Uuid>) -> Result<Vec<ApiKeyRecord>, RepoError> {
        let keys = self.keys.lock().await;
        Ok(keys
            .iter()
            .filter(|key| owner_id.is_none_or(|owner| key.owner_id == owner))
            .cloned()
            .collect())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError> {
        let keys = self.keys.lock().await;
        Ok(keys.iter().find(|key| key.prefix == prefix).cloned())
    }

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError> {
        let mut keys = self.keys.lock().await;
        let key = keys
            .iter_mut()
            .find(|key| key.id == id)
            .ok_or(RepoError::NotFound)?;
        key.status = ApiKeyStatus::Revoked;
        key.revoked_at = Some(revoked_at);
        Ok(())
    }

    async fn update_last_used(
        &self,
        id: Uuid,
        last_used_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        let mut keys = self.keys.lock().await;
        if let Some(key) = keys.iter_mut().find(|key| key.id == id) {
            key.last_used_at = Some(last_used_at);
        }
        Ok(())
    }
}

pub struct Harness {
    pub records: Arc<MemoryRecords>,
    pub storage: Arc<MemoryStorage>,
    pub service: PostService,
}

pub fn harness() -> Harness {
    let records = Arc::new(MemoryRecords::default());
    let storage = Arc::new(MemoryStorage::default());
    let service = PostService::new(records.clone(), records.clone(), storage.clone());
    Harness {
        records,
        storage,
        service,
    }
}

pub fn jpeg(name: &str) -> PendingFile {
    PendingFile::new(name, Some("image/jpeg"), Bytes::from_static(b"\xff\xd8\xff jpeg"))
}

pub fn failing_jpeg(name: &str) -> PendingFile {
    PendingFile::new(name, Some("image/jpeg"), Bytes::from_static(FAILING_PAYLOAD))
}

pub fn key_of(url: &str) -> String {
    url.trim_start_matches(&format!("{PUBLIC_BASE}/{BUCKET}/"))
        .to_string()
}
