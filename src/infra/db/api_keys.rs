use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{ApiKeysRepo, CreateApiKeyParams, RepoError};
use crate::domain::api_keys::{ApiKeyRecord, ApiKeyStatus, ApiScope};

use super::{PostgresRepositories, map_sqlx_error};

const API_KEY_COLUMNS: &str = "id, name, description, prefix, hashed_secret, scopes, status, \
    owner_id, expires_at, revoked_at, last_used_at, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ApiKeyRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    prefix: String,
    hashed_secret: Vec<u8>,
    scopes: Vec<String>,
    status: String,
    owner_id: Uuid,
    expires_at: Option<OffsetDateTime>,
    revoked_at: Option<OffsetDateTime>,
    last_used_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<ApiKeyRow> for ApiKeyRecord {
    type Error = RepoError;

    fn try_from(row: ApiKeyRow) -> Result<Self, Self::Error> {
        let scopes = row
            .scopes
            .iter()
            .map(|raw| {
                raw.parse::<ApiScope>().map_err(|_| RepoError::Integrity {
                    message: format!("api key {} has unknown scope `{raw}`", row.id),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let status = row
            .status
            .parse::<ApiKeyStatus>()
            .map_err(|_| RepoError::Integrity {
                message: format!("api key {} has unknown status `{}`", row.id, row.status),
            })?;

        Ok(ApiKeyRecord {
            id: row.id,
            name: row.name,
            description: row.description,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            scopes,
            status,
            owner_id: row.owner_id,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            last_used_at: row.last_used_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ApiKeysRepo for PostgresRepositories {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError> {
        let scopes: Vec<String> = params
            .scopes
            .iter()
            .map(|scope| scope.as_str().to_string())
            .collect();
        let now = OffsetDateTime::now_utc();

        let sql = format!(
            "INSERT INTO api_keys (id, name, description, prefix, hashed_secret, scopes, status, \
             owner_id, expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10) \
             RETURNING {API_KEY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.name)
            .bind(params.description)
            .bind(params.prefix)
            .bind(params.hashed_secret)
            .bind(scopes)
            .bind(ApiKeyStatus::Active.as_str())
            .bind(params.owner_id)
            .bind(params.expires_at)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        ApiKeyRecord::try_from(row)
    }

    async fn list_keys(&self, owner_id: Option<Uuid>) -> Result<Vec<ApiKeyRecord>, RepoError> {
        let sql = format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE ($1::uuid IS NULL OR owner_id = $1) \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(owner_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(ApiKeyRecord::try_from).collect()
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError> {
        let sql = format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE prefix = $1");
        let row = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(prefix)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(ApiKeyRecord::try_from).transpose()
    }

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys
            SET status = 'revoked', revoked_at = $2, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(revoked_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn update_last_used(
        &self,
        id: Uuid,
        last_used_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(last_used_at)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
