//! API keys: the identity provider for every request.
//!
//! Each key belongs to one owner; authenticating a key yields the
//! [`CurrentUser`] that post operations are scoped to.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::application::posts::CurrentUser;
use crate::application::repos::{ApiKeysRepo, CreateApiKeyParams, RepoError};
use crate::domain::api_keys::{ApiKeyRecord, ApiScope};

const TOKEN_PREFIX: &str = "mk";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("invalid scope set")]
    InvalidScopes,
    #[error("key name must not be empty")]
    EmptyName,
}

#[derive(Debug, Error)]
pub enum ApiAuthError {
    #[error("missing api key")]
    Missing,
    #[error("invalid api key")]
    Invalid,
    #[error("expired api key")]
    Expired,
    #[error("revoked api key")]
    Revoked,
    #[error("api key lacks the `{0}` scope")]
    Forbidden(ApiScope),
}

#[derive(Debug, Clone)]
pub struct IssueApiKeyCommand {
    pub name: String,
    pub description: Option<String>,
    pub scopes: Vec<ApiScope>,
    pub owner_id: Uuid,
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct ApiKeyIssued {
    pub record: ApiKeyRecord,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct ApiPrincipal {
    pub key_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub prefix: String,
    pub scopes: Vec<ApiScope>,
}

impl ApiPrincipal {
    pub fn requires(&self, needed: ApiScope) -> Result<(), ApiAuthError> {
        if self.scopes.contains(&needed) {
            Ok(())
        } else {
            Err(ApiAuthError::Forbidden(needed))
        }
    }

    pub fn current_user(&self) -> CurrentUser {
        CurrentUser::new(self.owner_id)
    }
}

#[derive(Clone)]
pub struct ApiKeyService {
    repo: Arc<dyn ApiKeysRepo>,
}

impl ApiKeyService {
    pub fn new(repo: Arc<dyn ApiKeysRepo>) -> Self {
        Self { repo }
    }

    pub async fn issue(&self, cmd: IssueApiKeyCommand) -> Result<ApiKeyIssued, ApiKeyError> {
        if cmd.scopes.is_empty() {
            return Err(ApiKeyError::InvalidScopes);
        }
        let name = cmd.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiKeyError::EmptyName);
        }

        let prefix = Self::generate_prefix();
        let secret = Self::generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let hashed_secret = Self::hash_secret(&secret);

        let mut scopes = cmd.scopes;
        scopes.sort_by_key(|scope| scope.as_str());
        scopes.dedup();

        let record = self
            .repo
            .create_key(CreateApiKeyParams {
                name,
                description: cmd.description,
                prefix,
                hashed_secret,
                scopes,
                owner_id: cmd.owner_id,
                expires_at: cmd.expires_at,
            })
            .await?;

        Ok(ApiKeyIssued { record, token })
    }

    pub async fn revoke(&self, id: Uuid) -> Result<(), ApiKeyError> {
        let now = OffsetDateTime::now_utc();
        self.repo.revoke_key(id, now).await?;
        Ok(())
    }

    pub async fn list(&self, owner_id: Option<Uuid>) -> Result<Vec<ApiKeyRecord>, ApiKeyError> {
        self.repo.list_keys(owner_id).await.map_err(ApiKeyError::from)
    }

    pub async fn authenticate(&self, token: &str) -> Result<ApiPrincipal, ApiAuthError> {
        let parsed = Self::parse_token(token).ok_or(ApiAuthError::Invalid)?;
        let record = self
            .repo
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(|_| ApiAuthError::Invalid)?
            .ok_or(ApiAuthError::Invalid)?;

        let hashed_input = Self::hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(ApiAuthError::Invalid);
        }

        let now = OffsetDateTime::now_utc();
        if record.is_revoked() {
            return Err(ApiAuthError::Revoked);
        }
        if !record.is_active_at(now) {
            return Err(ApiAuthError::Expired);
        }

        // best-effort; never blocks authentication
        let repo = self.repo.clone();
        let key_id = record.id;
        tokio::spawn(async move {
            if let Err(err) = repo.update_last_used(key_id, now).await {
                debug!(key_id = %key_id, error = %err, "failed to record api key usage");
            }
        });

        Ok(ApiPrincipal {
            key_id: record.id,
            owner_id: record.owner_id,
            name: record.name,
            prefix: record.prefix,
            scopes: record.scopes,
        })
    }

    fn hash_secret(secret: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.finalize().to_vec()
    }

    fn generate_prefix() -> String {
        Uuid::new_v4().simple().to_string()[..12].to_string()
    }

    fn generate_secret() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    fn parse_token(token: &str) -> Option<ParsedToken> {
        let mut parts = token.trim().splitn(3, '_');
        if parts.next()? != TOKEN_PREFIX {
            return None;
        }
        let prefix = parts.next()?;
        let secret = parts.next()?;
        if secret.len() < MIN_SECRET_LEN || prefix.is_empty() {
            return None;
        }
        Some(ParsedToken {
            prefix: prefix.to_string(),
            secret: secret.to_string(),
        })
    }
}

struct ParsedToken {
    prefix: String,
    secret: String,
}
