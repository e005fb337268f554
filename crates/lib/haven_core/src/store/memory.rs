//! In-memory repository implementations.
//!
//! Back the integration tests and the embedded dev profile. Semantics match
//! the Postgres implementations; nothing here is cached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{CodeStore, NewUser, OrgStore, SessionStore, StoreError, UserStore};
use crate::models::auth::{
    CodePurpose, OneTimeCodeRecord, SessionTokenRecord, User, UserCredentials,
};
use crate::models::org::{MemberRole, Organization, OrganizationMember, VerificationStatus};
use crate::ids::uuidv7;

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
}

/// Map-backed [`UserStore`].
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, StoredUser>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let duplicate = self
            .users
            .iter()
            .any(|entry| entry.user.email == new_user.email);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                new_user.email
            )));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            is_verified: false,
            disabled: false,
            role: new_user.role,
        };
        self.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|entry| entry.user.clone()))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.user.email == email)
            .map(|entry| UserCredentials {
                user: entry.user.clone(),
                password_hash: entry.password_hash.clone(),
            }))
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.iter().map(|entry| entry.user.clone()).collect();
        users.sort_by_key(|user| user.email.clone());
        Ok(users)
    }

    async fn set_password(
        &self,
        id: Uuid,
        password_hash: &str,
        disabled: bool,
    ) -> Result<(), StoreError> {
        if let Some(mut entry) = self.users.get_mut(&id) {
            entry.password_hash = password_hash.to_string();
            entry.user.disabled = disabled;
        }
        Ok(())
    }

    async fn lock_account(&self, email: &str, password_hash: &str) -> Result<(), StoreError> {
        for mut entry in self.users.iter_mut() {
            if entry.user.email == email && !entry.user.disabled {
                entry.user.disabled = true;
                entry.password_hash = password_hash.to_string();
            }
        }
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(mut entry) = self.users.get_mut(&id) {
            entry.user.is_verified = true;
        }
        Ok(())
    }
}

/// Map-backed [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<Uuid, SessionTokenRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows including disabled ones. Test hook for the audit-trail
    /// invariant (rows are never deleted).
    pub fn row_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, id: Uuid, user_id: Uuid) -> Result<SessionTokenRecord, StoreError> {
        let record = SessionTokenRecord {
            id,
            user_id,
            disabled: false,
            created_at: Utc::now(),
        };
        self.sessions.insert(id, record.clone());
        Ok(record)
    }

    async fn find_enabled(&self, id: Uuid) -> Result<Option<SessionTokenRecord>, StoreError> {
        Ok(self
            .sessions
            .get(&id)
            .filter(|record| !record.disabled)
            .map(|record| record.value().clone()))
    }

    async fn disable(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        if let Some(mut record) = self.sessions.get_mut(&id) {
            if record.user_id == user_id && !record.disabled {
                record.disabled = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn disable_all(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut disabled = 0;
        for mut record in self.sessions.iter_mut() {
            if record.user_id == user_id && !record.disabled {
                record.disabled = true;
                disabled += 1;
            }
        }
        Ok(disabled)
    }

    async fn list_enabled(&self, user_id: Uuid) -> Result<Vec<SessionTokenRecord>, StoreError> {
        let mut sessions: Vec<SessionTokenRecord> = self
            .sessions
            .iter()
            .filter(|record| record.user_id == user_id && !record.disabled)
            .map(|record| record.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }
}

/// Map-backed [`CodeStore`].
#[derive(Debug, Default)]
pub struct MemoryCodeStore {
    codes: DashMap<Uuid, OneTimeCodeRecord>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn issue(
        &self,
        user_id: Uuid,
        purpose: CodePurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<OneTimeCodeRecord, StoreError> {
        for mut record in self.codes.iter_mut() {
            if record.user_id == user_id && record.purpose == purpose {
                record.disabled = true;
            }
        }
        let record = OneTimeCodeRecord {
            id: uuidv7(),
            user_id,
            purpose,
            code_hash: code_hash.to_string(),
            expires_at,
            disabled: false,
            created_at: Utc::now(),
        };
        self.codes.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_active(
        &self,
        id: Uuid,
        purpose: CodePurpose,
    ) -> Result<Option<OneTimeCodeRecord>, StoreError> {
        Ok(self
            .codes
            .get(&id)
            .filter(|record| {
                record.purpose == purpose && !record.disabled && record.expires_at > Utc::now()
            })
            .map(|record| record.value().clone()))
    }

    async fn disable_all(&self, user_id: Uuid, purpose: CodePurpose) -> Result<u64, StoreError> {
        let mut disabled = 0;
        for mut record in self.codes.iter_mut() {
            if record.user_id == user_id && record.purpose == purpose && !record.disabled {
                record.disabled = true;
                disabled += 1;
            }
        }
        Ok(disabled)
    }
}

/// Map-backed [`OrgStore`] with insert helpers for seeding tests.
#[derive(Debug, Default)]
pub struct MemoryOrgStore {
    organizations: DashMap<Uuid, Organization>,
    members: DashMap<(Uuid, Uuid), OrganizationMember>,
}

impl MemoryOrgStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_organization(&self, name: &str, status: VerificationStatus) -> Organization {
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            verification_status: status,
        };
        self.organizations.insert(org.id, org.clone());
        org
    }

    pub fn insert_member(&self, organization_id: Uuid, user_id: Uuid, role: MemberRole) {
        self.members.insert(
            (organization_id, user_id),
            OrganizationMember {
                organization_id,
                user_id,
                role,
            },
        );
    }
}

#[async_trait]
impl OrgStore for MemoryOrgStore {
    async fn find_verified(&self, id: Uuid) -> Result<Option<Organization>, StoreError> {
        Ok(self
            .organizations
            .get(&id)
            .filter(|org| org.verification_status == VerificationStatus::Verified)
            .map(|org| org.value().clone()))
    }

    async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrganizationMember>, StoreError> {
        Ok(self
            .members
            .get(&(organization_id, user_id))
            .map(|member| member.value().clone()))
    }

    async fn list_members(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<OrganizationMember>, StoreError> {
        Ok(self
            .members
            .iter()
            .filter(|member| member.organization_id == organization_id)
            .map(|member| member.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryUserStore::new();
        let new_user = NewUser {
            name: "A".into(),
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            role: "User".into(),
        };
        store.create(new_user.clone()).await.unwrap();
        assert!(matches!(
            store.create(new_user).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn session_disable_is_scoped_to_owner() {
        let store = MemorySessionStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let session = store.insert(uuidv7(), owner).await.unwrap();

        assert!(!store.disable(session.id, other).await.unwrap());
        assert!(store.find_enabled(session.id).await.unwrap().is_some());

        assert!(store.disable(session.id, owner).await.unwrap());
        assert!(store.find_enabled(session.id).await.unwrap().is_none());
        // Disabling again is a no-op, and the row survives for audit.
        assert!(!store.disable(session.id, owner).await.unwrap());
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn issuing_a_code_disables_prior_codes_for_the_same_purpose() {
        let store = MemoryCodeStore::new();
        let user_id = Uuid::new_v4();
        let expires = Utc::now() + Duration::minutes(15);

        let first = store
            .issue(user_id, CodePurpose::VerifyEmail, "hash-1", expires)
            .await
            .unwrap();
        let reset = store
            .issue(user_id, CodePurpose::ResetPassword, "hash-r", expires)
            .await
            .unwrap();
        let second = store
            .issue(user_id, CodePurpose::VerifyEmail, "hash-2", expires)
            .await
            .unwrap();

        assert!(
            store
                .find_active(first.id, CodePurpose::VerifyEmail)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .find_active(second.id, CodePurpose::VerifyEmail)
                .await
                .unwrap()
                .is_some()
        );
        // A different purpose is untouched.
        assert!(
            store
                .find_active(reset.id, CodePurpose::ResetPassword)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn expired_code_is_not_active() {
        let store = MemoryCodeStore::new();
        let user_id = Uuid::new_v4();
        let record = store
            .issue(
                user_id,
                CodePurpose::VerifyEmail,
                "hash",
                Utc::now() - Duration::minutes(1),
            )
            .await
            .unwrap();
        assert!(
            store
                .find_active(record.id, CodePurpose::VerifyEmail)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn unverified_org_is_not_returned() {
        let store = MemoryOrgStore::new();
        let pending = store.insert_organization("Pending Org", VerificationStatus::Pending);
        let verified = store.insert_organization("Verified Org", VerificationStatus::Verified);

        assert!(store.find_verified(pending.id).await.unwrap().is_none());
        assert!(store.find_verified(verified.id).await.unwrap().is_some());
    }
}
