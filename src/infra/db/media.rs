use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateMediaParams, MediaRepo, RepoError, UpdateMediaParams};
use crate::domain::entities::MediaRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct MediaRow {
    id: Uuid,
    post_id: Uuid,
    url: String,
    note: String,
    position: i32,
    created_at: OffsetDateTime,
}

impl From<MediaRow> for MediaRecord {
    fn from(row: MediaRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            url: row.url,
            note: row.note,
            position: row.position,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl MediaRepo for PostgresRepositories {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<MediaRecord>, RepoError> {
        let rows = sqlx::query_as::<_, MediaRow>(
            r#"
            SELECT id, post_id, url, note, position, created_at
            FROM media
            WHERE post_id = $1
            ORDER BY position ASC, created_at ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(MediaRecord::from).collect())
    }

    async fn list_for_posts(&self, post_ids: &[Uuid]) -> Result<Vec<MediaRecord>, RepoError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, MediaRow>(
            r#"
            SELECT id, post_id, url, note, position, created_at
            FROM media
            WHERE post_id = ANY($1)
            ORDER BY post_id, position ASC, created_at ASC
            "#,
        )
        .bind(post_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(MediaRecord::from).collect())
    }

    async fn insert_media(&self, params: CreateMediaParams) -> Result<MediaRecord, RepoError> {
        let row = sqlx::query_as::<_, MediaRow>(
            r#"
            INSERT INTO media (id, post_id, url, note, position, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, post_id, url, note, position, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.post_id)
        .bind(params.url)
        .bind(params.note)
        .bind(params.position)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_media(&self, params: UpdateMediaParams) -> Result<MediaRecord, RepoError> {
        let row = sqlx::query_as::<_, MediaRow>(
            r#"
            UPDATE media
            SET note = $2, position = $3
            WHERE id = $1
            RETURNING id, post_id, url, note, position, created_at
            "#,
        )
        .bind(params.id)
        .bind(params.note)
        .bind(params.position)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(MediaRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_media(&self, post_id: Uuid, ids: &[Uuid]) -> Result<u64, RepoError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM media WHERE post_id = $1 AND id = ANY($2)")
            .bind(post_id)
            .bind(ids)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
