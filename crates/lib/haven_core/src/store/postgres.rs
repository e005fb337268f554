//! Postgres repository implementations.
//!
//! Every repository holds the shared pool plus the cache-aside wrapper.
//! Cacheable models route reads through [`QueryCache::read`] and writes
//! through [`QueryCache::write`]; models registered as non-cacheable
//! (session tokens, one-time codes) pass straight through.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CodeStore, NewUser, OrgStore, SessionStore, StoreError, UserStore};
use crate::cache::{POINT_LOOKUP_OP, QueryCache, WriteTarget};
use crate::models::auth::{
    CodePurpose, OneTimeCodeRecord, SessionTokenRecord, User, UserCredentials,
};
use crate::models::org::{MemberRole, Organization, OrganizationMember, VerificationStatus};
use crate::ids::uuidv7;

const USERS: &str = "users";
const USER_TOKENS: &str = "user_tokens";
const ONE_TIME_CODES: &str = "one_time_codes";
const ORGANIZATIONS: &str = "organizations";
const ORG_MEMBERS: &str = "organization_members";

/// Build the query wrapper with the models whose reads must always be live.
pub fn query_cache(backend: Arc<dyn crate::cache::CacheStore>, ttl: std::time::Duration) -> QueryCache {
    QueryCache::new(backend, ttl)
        .bypass_model(USER_TOKENS)
        .bypass_model(ONE_TIME_CODES)
}

type UserRow = (Uuid, String, String, bool, bool, String);

fn user_from_row((id, name, email, is_verified, disabled, role): UserRow) -> User {
    User {
        id,
        name,
        email,
        is_verified,
        disabled,
        role,
    }
}

fn parse_purpose(raw: &str) -> Result<CodePurpose, StoreError> {
    match raw {
        "verify_email" => Ok(CodePurpose::VerifyEmail),
        "reset_password" => Ok(CodePurpose::ResetPassword),
        other => Err(StoreError::Decode(format!("unknown code purpose: {other}"))),
    }
}

fn parse_member_role(raw: &str) -> Result<MemberRole, StoreError> {
    match raw {
        "member" => Ok(MemberRole::Member),
        "admin" => Ok(MemberRole::Admin),
        "owner" => Ok(MemberRole::Owner),
        other => Err(StoreError::Decode(format!("unknown member role: {other}"))),
    }
}

fn parse_verification_status(raw: &str) -> Result<VerificationStatus, StoreError> {
    match raw {
        "pending" => Ok(VerificationStatus::Pending),
        "verified" => Ok(VerificationStatus::Verified),
        "rejected" => Ok(VerificationStatus::Rejected),
        other => Err(StoreError::Decode(format!(
            "unknown verification status: {other}"
        ))),
    }
}

/// [`UserStore`] against Postgres.
pub struct PgUserStore {
    pool: PgPool,
    cache: Arc<QueryCache>,
}

impl PgUserStore {
    pub fn new(pool: PgPool, cache: Arc<QueryCache>) -> Self {
        Self { pool, cache }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .write(USERS, WriteTarget::Model, || async move {
                let row = sqlx::query_as::<_, UserRow>(
                    "INSERT INTO users (name, email, password_hash, role_id) \
                     SELECT $1, $2, $3, r.id FROM roles r WHERE r.name = $4 \
                     RETURNING id, name, email, is_verified, disabled, \
                       (SELECT name FROM roles WHERE id = role_id)",
                )
                .bind(&new_user.name)
                .bind(&new_user.email)
                .bind(&new_user.password_hash)
                .bind(&new_user.role)
                .fetch_one(&pool)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                        StoreError::Conflict(format!("email {} already registered", new_user.email))
                    }
                    other => StoreError::Database(other),
                })?;
                Ok(user_from_row(row))
            })
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .read(
                USERS,
                POINT_LOOKUP_OP,
                serde_json::json!({ "id": id }),
                || async move {
                    let row = sqlx::query_as::<_, UserRow>(
                        "SELECT u.id, u.name, u.email, u.is_verified, u.disabled, r.name \
                         FROM users u JOIN roles r ON r.id = u.role_id \
                         WHERE u.id = $1",
                    )
                    .bind(id)
                    .fetch_optional(&pool)
                    .await?;
                    Ok(row.map(user_from_row))
                },
            )
            .await
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, String, bool, bool, String, String)>(
            "SELECT u.id, u.name, u.email, u.is_verified, u.disabled, r.name, u.password_hash \
             FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(
            |(id, name, email, is_verified, disabled, role, password_hash)| UserCredentials {
                user: user_from_row((id, name, email, is_verified, disabled, role)),
                password_hash,
            },
        ))
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .read(USERS, "list", serde_json::json!({}), || async move {
                let rows = sqlx::query_as::<_, UserRow>(
                    "SELECT u.id, u.name, u.email, u.is_verified, u.disabled, r.name \
                     FROM users u JOIN roles r ON r.id = u.role_id \
                     ORDER BY u.created_at",
                )
                .fetch_all(&pool)
                .await?;
                Ok(rows.into_iter().map(user_from_row).collect())
            })
            .await
    }

    async fn set_password(
        &self,
        id: Uuid,
        password_hash: &str,
        disabled: bool,
    ) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let password_hash = password_hash.to_string();
        self.cache
            .write(USERS, WriteTarget::Record(id), || async move {
                sqlx::query("UPDATE users SET password_hash = $2, disabled = $3 WHERE id = $1")
                    .bind(id)
                    .bind(&password_hash)
                    .bind(disabled)
                    .execute(&pool)
                    .await?;
                Ok(())
            })
            .await
    }

    async fn lock_account(&self, email: &str, password_hash: &str) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let email = email.to_string();
        let password_hash = password_hash.to_string();
        // No single id known here, so the whole model is swept.
        self.cache
            .write(USERS, WriteTarget::Model, || async move {
                sqlx::query(
                    "UPDATE users SET disabled = TRUE, password_hash = $2 \
                     WHERE email = $1 AND disabled = FALSE",
                )
                .bind(&email)
                .bind(&password_hash)
                .execute(&pool)
                .await?;
                Ok(())
            })
            .await
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        self.cache
            .write(USERS, WriteTarget::Record(id), || async move {
                sqlx::query("UPDATE users SET is_verified = TRUE WHERE id = $1")
                    .bind(id)
                    .execute(&pool)
                    .await?;
                Ok(())
            })
            .await
    }
}

type SessionRow = (Uuid, Uuid, bool, DateTime<Utc>);

fn session_from_row((id, user_id, disabled, created_at): SessionRow) -> SessionTokenRecord {
    SessionTokenRecord {
        id,
        user_id,
        disabled,
        created_at,
    }
}

/// [`SessionStore`] against Postgres. The `user_tokens` model is registered
/// as non-cacheable, so the wrapper passes every call through.
pub struct PgSessionStore {
    pool: PgPool,
    cache: Arc<QueryCache>,
}

impl PgSessionStore {
    pub fn new(pool: PgPool, cache: Arc<QueryCache>) -> Self {
        Self { pool, cache }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, id: Uuid, user_id: Uuid) -> Result<SessionTokenRecord, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .write(USER_TOKENS, WriteTarget::Record(id), || async move {
                let row = sqlx::query_as::<_, SessionRow>(
                    "INSERT INTO user_tokens (id, user_id) VALUES ($1, $2) \
                     RETURNING id, user_id, disabled, created_at",
                )
                .bind(id)
                .bind(user_id)
                .fetch_one(&pool)
                .await?;
                Ok(session_from_row(row))
            })
            .await
    }

    async fn find_enabled(&self, id: Uuid) -> Result<Option<SessionTokenRecord>, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .read(
                USER_TOKENS,
                POINT_LOOKUP_OP,
                serde_json::json!({ "id": id }),
                || async move {
                    let row = sqlx::query_as::<_, SessionRow>(
                        "SELECT id, user_id, disabled, created_at FROM user_tokens \
                         WHERE id = $1 AND disabled = FALSE",
                    )
                    .bind(id)
                    .fetch_optional(&pool)
                    .await?;
                    Ok(row.map(session_from_row))
                },
            )
            .await
    }

    async fn disable(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .write(USER_TOKENS, WriteTarget::Record(id), || async move {
                let result = sqlx::query(
                    "UPDATE user_tokens SET disabled = TRUE \
                     WHERE id = $1 AND user_id = $2 AND disabled = FALSE",
                )
                .bind(id)
                .bind(user_id)
                .execute(&pool)
                .await?;
                Ok(result.rows_affected() > 0)
            })
            .await
    }

    async fn disable_all(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .write(USER_TOKENS, WriteTarget::Model, || async move {
                let result = sqlx::query(
                    "UPDATE user_tokens SET disabled = TRUE \
                     WHERE user_id = $1 AND disabled = FALSE",
                )
                .bind(user_id)
                .execute(&pool)
                .await?;
                Ok(result.rows_affected())
            })
            .await
    }

    async fn list_enabled(&self, user_id: Uuid) -> Result<Vec<SessionTokenRecord>, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .read(
                USER_TOKENS,
                "list",
                serde_json::json!({ "user_id": user_id }),
                || async move {
                    let rows = sqlx::query_as::<_, SessionRow>(
                        "SELECT id, user_id, disabled, created_at FROM user_tokens \
                         WHERE user_id = $1 AND disabled = FALSE \
                         ORDER BY created_at DESC",
                    )
                    .bind(user_id)
                    .fetch_all(&pool)
                    .await?;
                    Ok(rows.into_iter().map(session_from_row).collect())
                },
            )
            .await
    }
}

type CodeRow = (Uuid, Uuid, String, String, DateTime<Utc>, bool, DateTime<Utc>);

fn code_from_row(row: CodeRow) -> Result<OneTimeCodeRecord, StoreError> {
    let (id, user_id, purpose, code_hash, expires_at, disabled, created_at) = row;
    Ok(OneTimeCodeRecord {
        id,
        user_id,
        purpose: parse_purpose(&purpose)?,
        code_hash,
        expires_at,
        disabled,
        created_at,
    })
}

/// [`CodeStore`] against Postgres. Non-cacheable: codes are single-use.
pub struct PgCodeStore {
    pool: PgPool,
    cache: Arc<QueryCache>,
}

impl PgCodeStore {
    pub fn new(pool: PgPool, cache: Arc<QueryCache>) -> Self {
        Self { pool, cache }
    }
}

#[async_trait]
impl CodeStore for PgCodeStore {
    async fn issue(
        &self,
        user_id: Uuid,
        purpose: CodePurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<OneTimeCodeRecord, StoreError> {
        let pool = self.pool.clone();
        let code_hash = code_hash.to_string();
        let id = uuidv7();
        self.cache
            .write(ONE_TIME_CODES, WriteTarget::Record(id), || async move {
                // Disable-priors and insert must land together so at most one
                // code is ever active per (user, purpose).
                let mut tx = pool.begin().await?;
                sqlx::query(
                    "UPDATE one_time_codes SET disabled = TRUE \
                     WHERE user_id = $1 AND purpose = $2 AND disabled = FALSE",
                )
                .bind(user_id)
                .bind(purpose.as_str())
                .execute(&mut *tx)
                .await?;
                let row = sqlx::query_as::<_, CodeRow>(
                    "INSERT INTO one_time_codes (id, user_id, purpose, code_hash, expires_at) \
                     VALUES ($1, $2, $3, $4, $5) \
                     RETURNING id, user_id, purpose, code_hash, expires_at, disabled, created_at",
                )
                .bind(id)
                .bind(user_id)
                .bind(purpose.as_str())
                .bind(&code_hash)
                .bind(expires_at)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                code_from_row(row)
            })
            .await
    }

    async fn find_active(
        &self,
        id: Uuid,
        purpose: CodePurpose,
    ) -> Result<Option<OneTimeCodeRecord>, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .read(
                ONE_TIME_CODES,
                POINT_LOOKUP_OP,
                serde_json::json!({ "id": id, "purpose": purpose.as_str() }),
                || async move {
                    let row = sqlx::query_as::<_, CodeRow>(
                        "SELECT id, user_id, purpose, code_hash, expires_at, disabled, created_at \
                         FROM one_time_codes \
                         WHERE id = $1 AND purpose = $2 AND disabled = FALSE \
                           AND expires_at > now()",
                    )
                    .bind(id)
                    .bind(purpose.as_str())
                    .fetch_optional(&pool)
                    .await?;
                    row.map(code_from_row).transpose()
                },
            )
            .await
    }

    async fn disable_all(&self, user_id: Uuid, purpose: CodePurpose) -> Result<u64, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .write(ONE_TIME_CODES, WriteTarget::Model, || async move {
                let result = sqlx::query(
                    "UPDATE one_time_codes SET disabled = TRUE \
                     WHERE user_id = $1 AND purpose = $2 AND disabled = FALSE",
                )
                .bind(user_id)
                .bind(purpose.as_str())
                .execute(&pool)
                .await?;
                Ok(result.rows_affected())
            })
            .await
    }
}

/// [`OrgStore`] against Postgres. Read-only surface; both models are
/// cacheable and bounded by the default TTL.
pub struct PgOrgStore {
    pool: PgPool,
    cache: Arc<QueryCache>,
}

impl PgOrgStore {
    pub fn new(pool: PgPool, cache: Arc<QueryCache>) -> Self {
        Self { pool, cache }
    }
}

#[async_trait]
impl OrgStore for PgOrgStore {
    async fn find_verified(&self, id: Uuid) -> Result<Option<Organization>, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .read(
                ORGANIZATIONS,
                "find_verified",
                serde_json::json!({ "id": id }),
                || async move {
                    let row = sqlx::query_as::<_, (Uuid, String, String)>(
                        "SELECT id, name, verification_status FROM organizations \
                         WHERE id = $1 AND verification_status = 'verified'",
                    )
                    .bind(id)
                    .fetch_optional(&pool)
                    .await?;
                    row.map(|(id, name, status)| {
                        Ok(Organization {
                            id,
                            name,
                            verification_status: parse_verification_status(&status)?,
                        })
                    })
                    .transpose()
                },
            )
            .await
    }

    async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrganizationMember>, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .read(
                ORG_MEMBERS,
                "find_by_member",
                serde_json::json!({ "organization_id": organization_id, "user_id": user_id }),
                || async move {
                    let row = sqlx::query_as::<_, (Uuid, Uuid, String)>(
                        "SELECT organization_id, user_id, role FROM organization_members \
                         WHERE organization_id = $1 AND user_id = $2",
                    )
                    .bind(organization_id)
                    .bind(user_id)
                    .fetch_optional(&pool)
                    .await?;
                    row.map(|(organization_id, user_id, role)| {
                        Ok(OrganizationMember {
                            organization_id,
                            user_id,
                            role: parse_member_role(&role)?,
                        })
                    })
                    .transpose()
                },
            )
            .await
    }

    async fn list_members(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<OrganizationMember>, StoreError> {
        let pool = self.pool.clone();
        self.cache
            .read(
                ORG_MEMBERS,
                "list",
                serde_json::json!({ "organization_id": organization_id }),
                || async move {
                    let rows = sqlx::query_as::<_, (Uuid, Uuid, String)>(
                        "SELECT organization_id, user_id, role FROM organization_members \
                         WHERE organization_id = $1",
                    )
                    .bind(organization_id)
                    .fetch_all(&pool)
                    .await?;
                    rows.into_iter()
                        .map(|(organization_id, user_id, role)| {
                            Ok(OrganizationMember {
                                organization_id,
                                user_id,
                                role: parse_member_role(&role)?,
                            })
                        })
                        .collect()
                },
            )
            .await
    }
}
