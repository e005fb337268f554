//! Repository traits for the persistent store.
//!
//! One explicit interface per entity, implemented against Postgres
//! ([`postgres`]) and against plain maps ([`memory`]) for tests and the
//! embedded dev profile. The Postgres implementations route through the
//! cache-aside [`crate::cache::QueryCache`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{
    CodePurpose, OneTimeCodeRecord, SessionTokenRecord, User, UserCredentials,
};
use crate::models::org::{Organization, OrganizationMember};

/// Persistent-store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

/// User repository.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user. A duplicate email yields [`StoreError::Conflict`].
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fetch a user with its password hash by email. Always a live read:
    /// credentials are never served from cache.
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, StoreError>;

    async fn list(&self) -> Result<Vec<User>, StoreError>;

    /// Replace the password hash and set the disabled flag. Used by the
    /// reset flow (`disabled = false` re-enables a locked account).
    async fn set_password(
        &self,
        id: Uuid,
        password_hash: &str,
        disabled: bool,
    ) -> Result<(), StoreError>;

    /// Brute-force lockout: disable the account and replace its password in
    /// one update, scoped to currently enabled accounts.
    async fn lock_account(&self, email: &str, password_hash: &str) -> Result<(), StoreError>;

    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Session-token repository. Reads must be live (revocation takes effect on
/// the next request), so the model is marked non-cacheable.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, id: Uuid, user_id: Uuid) -> Result<SessionTokenRecord, StoreError>;

    /// Fetch a session row only if it exists and is still enabled.
    async fn find_enabled(&self, id: Uuid) -> Result<Option<SessionTokenRecord>, StoreError>;

    /// Disable one enabled session owned by `user_id`. Returns whether a row
    /// changed (false covers both "not owned" and "already disabled").
    async fn disable(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// Disable every enabled session owned by `user_id`, returning the count.
    async fn disable_all(&self, user_id: Uuid) -> Result<u64, StoreError>;

    async fn list_enabled(&self, user_id: Uuid) -> Result<Vec<SessionTokenRecord>, StoreError>;
}

/// One-time-code repository.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Persist a new code, disabling any prior active codes for the same
    /// `(user, purpose)` in the same transaction so at most one code is ever
    /// active per purpose.
    async fn issue(
        &self,
        user_id: Uuid,
        purpose: CodePurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<OneTimeCodeRecord, StoreError>;

    /// Fetch a code record only if it is enabled, unexpired, and matches the
    /// purpose.
    async fn find_active(
        &self,
        id: Uuid,
        purpose: CodePurpose,
    ) -> Result<Option<OneTimeCodeRecord>, StoreError>;

    /// Disable every outstanding code for `(user, purpose)`.
    async fn disable_all(&self, user_id: Uuid, purpose: CodePurpose) -> Result<u64, StoreError>;
}

/// Organization repository — the reads the ownership gate needs.
#[async_trait]
pub trait OrgStore: Send + Sync {
    /// Fetch an organization only if it has passed verification.
    async fn find_verified(&self, id: Uuid) -> Result<Option<Organization>, StoreError>;

    async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrganizationMember>, StoreError>;

    async fn list_members(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<OrganizationMember>, StoreError>;
}
