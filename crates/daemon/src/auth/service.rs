//! Accounts and bearer sessions

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};
use vpspanel_common::{now_epoch_secs, Error, Identity, Result, Role, Session, Store, UserRecord};

use super::guard::Guard;
use super::rbac::{PROFILE_UPDATE, USERS_MANAGE};
use crate::config::{AuthConfig, AuthMode};

/// Issued on sign-in. The token is only ever shown here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: i64,
    pub identity: Identity,
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn new_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 32;

fn validate_username(username: &str, min_len: usize) -> Result<()> {
    let len = username.chars().count();
    if !(min_len..=USERNAME_MAX_LEN).contains(&len) {
        return Err(Error::Validation(format!(
            "username must be {} to {} characters",
            min_len, USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(Error::Validation(
            "username may only contain letters, digits, '_', '-' and '.'".to_string(),
        ));
    }
    Ok(())
}

async fn hash_password(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| Error::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(Error::from)
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| Error::Internal(format!("password verification task failed: {}", e)))?
        .map_err(Error::from)
}

/// Sign-up, sign-in, sessions and admin user management
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    guard: Guard,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, guard: Guard, config: AuthConfig) -> Self {
        Self { store, guard, config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.config.min_password_len {
            return Err(Error::Validation(format!(
                "password must be at least {} characters",
                self.config.min_password_len
            )));
        }
        Ok(())
    }

    async fn create_account(
        &self,
        username: &str,
        password: &str,
        email: Option<String>,
        role: Role,
    ) -> Result<Identity> {
        validate_username(username, USERNAME_MIN_LEN)?;
        self.validate_password(password)?;
        self.insert_account(username, password, email, role).await
    }

    async fn insert_account(
        &self,
        username: &str,
        password: &str,
        email: Option<String>,
        role: Role,
    ) -> Result<Identity> {
        if self.store.get_user_by_username(username)?.is_some() {
            return Err(Error::DuplicateUsername(username.to_string()));
        }

        let mut identity = Identity::new(username, role);
        identity.email = email;
        let record = UserRecord {
            identity: identity.clone(),
            password_hash: hash_password(password.to_string(), self.config.bcrypt_cost).await?,
        };
        self.store.insert_user(&record)?;

        info!("Created {} account {} ({})", role, identity.username, identity.id);
        Ok(identity)
    }

    /// Create configured seed accounts that do not exist yet
    pub async fn seed(&self) -> Result<usize> {
        let mut created = 0;
        for seed in &self.config.seed_users {
            if self.store.get_user_by_username(&seed.username)?.is_some() {
                continue;
            }
            self.create_account(&seed.username, &seed.password, None, seed.role)
                .await?;
            created += 1;
        }
        Ok(created)
    }

    /// Self-service registration; always creates a `user`
    pub async fn sign_up(&self, username: &str, password: &str, email: Option<String>) -> Result<Identity> {
        self.create_account(username.trim(), password, email, Role::User)
            .await
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<AuthSession> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(Error::Validation(
                "username and password are required".to_string(),
            ));
        }

        let record = match self.store.get_user_by_username(username)? {
            Some(record) => record,
            None if self.config.mode == AuthMode::Demo => {
                // Any non-empty password is accepted for a demo account
                validate_username(username, 1)?;
                info!("Provisioning demo account {}", username);
                self.insert_account(username, password, None, Role::User)
                    .await?;
                self.store
                    .get_user_by_username(username)?
                    .ok_or_else(|| Error::Internal("demo account vanished".to_string()))?
            }
            None => {
                warn!("Sign-in for unknown user {}", username);
                return Err(Error::Unauthorized("invalid credentials".to_string()));
            }
        };

        if !verify_password(password.to_string(), record.password_hash.clone()).await? {
            warn!("Bad password for {}", username);
            return Err(Error::Unauthorized("invalid credentials".to_string()));
        }
        if !record.identity.active {
            return Err(Error::Unauthorized("account is deactivated".to_string()));
        }

        let now = now_epoch_secs();
        let token = new_token();
        let session = Session {
            token_hash: hash_token(&token),
            identity_id: record.identity.id.clone(),
            created_at: now,
            expires_at: now + self.config.session_ttl_secs,
            last_seen_at: now,
        };
        self.store.insert_session(&session)?;

        debug!("Session issued for {}", record.identity.username);
        Ok(AuthSession {
            token,
            expires_at: session.expires_at,
            identity: record.identity,
        })
    }

    pub fn sign_out(&self, token: &str) -> Result<()> {
        self.store.delete_session(&hash_token(token))?;
        Ok(())
    }

    /// Resolve a bearer token to its identity
    pub fn authenticate(&self, token: &str) -> Result<Identity> {
        let hash = hash_token(token);
        let now = now_epoch_secs();

        let session = self
            .store
            .get_session(&hash)?
            .ok_or_else(|| Error::Unauthorized("invalid or expired session".to_string()))?;
        if session.is_expired(now) {
            self.store.delete_session(&hash)?;
            return Err(Error::Unauthorized("invalid or expired session".to_string()));
        }

        let record = self
            .store
            .get_user(&session.identity_id)?
            .ok_or_else(|| Error::Unauthorized("account no longer exists".to_string()))?;
        if !record.identity.active {
            return Err(Error::Unauthorized("account is deactivated".to_string()));
        }

        self.store.touch_session(&hash, now)?;
        Ok(record.identity)
    }

    pub fn get_identity(&self, id: &str) -> Result<Identity> {
        self.store
            .get_user(id)?
            .map(|r| r.identity)
            .ok_or_else(|| Error::not_found("user", id))
    }

    pub async fn change_password(&self, caller: &Identity, new_password: &str) -> Result<()> {
        self.guard.require(caller, PROFILE_UPDATE)?;
        self.validate_password(new_password)?;

        let mut record = self
            .store
            .get_user(&caller.id)?
            .ok_or_else(|| Error::not_found("user", caller.id.as_str()))?;
        record.password_hash =
            hash_password(new_password.to_string(), self.config.bcrypt_cost).await?;
        record.identity.updated_at = now_epoch_secs();
        self.store.update_user(&record)?;

        info!("Password changed for {}", caller.username);
        Ok(())
    }

    /// Update username and/or email. The role is never changed here.
    pub fn update_profile(
        &self,
        caller: &Identity,
        username: Option<&str>,
        email: Option<Option<String>>,
    ) -> Result<Identity> {
        self.guard.require(caller, PROFILE_UPDATE)?;

        let mut record = self
            .store
            .get_user(&caller.id)?
            .ok_or_else(|| Error::not_found("user", caller.id.as_str()))?;

        if let Some(username) = username {
            let username = username.trim();
            validate_username(username, USERNAME_MIN_LEN)?;
            record.identity.username = username.to_string();
        }
        if let Some(email) = email {
            record.identity.email = email;
        }
        record.identity.updated_at = now_epoch_secs();
        self.store.update_user(&record)?;

        Ok(record.identity)
    }

    pub fn list_users(&self, caller: &Identity) -> Result<Vec<Identity>> {
        self.guard.require(caller, USERS_MANAGE)?;
        self.store.list_users()
    }

    pub async fn create_user(
        &self,
        caller: &Identity,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Identity> {
        self.guard.require(caller, USERS_MANAGE)?;
        self.create_account(username.trim(), password, None, role).await
    }

    /// Activate or deactivate an account. Deactivation ends its sessions.
    pub fn set_active(&self, caller: &Identity, id: &str, active: bool) -> Result<Identity> {
        self.guard.require(caller, USERS_MANAGE)?;
        if caller.id == id && !active {
            return Err(Error::Validation("cannot deactivate yourself".to_string()));
        }

        let mut record = self
            .store
            .get_user(id)?
            .ok_or_else(|| Error::not_found("user", id))?;
        record.identity.active = active;
        record.identity.updated_at = now_epoch_secs();
        self.store.update_user(&record)?;

        if !active {
            let ended = self.store.delete_sessions_for(id)?;
            info!("Deactivated {} and ended {} sessions", record.identity.username, ended);
        }
        Ok(record.identity)
    }

    /// Remove an account and its sessions. Callers handle authorization and
    /// the account's VPS records.
    pub(crate) fn remove_user(&self, id: &str) -> Result<bool> {
        self.store.delete_sessions_for(id)?;
        self.store.delete_user(id)
    }

    pub fn purge_expired_sessions(&self) -> Result<usize> {
        self.store.purge_expired_sessions(now_epoch_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use vpspanel_common::MemoryStore;

    fn service(mode: AuthMode) -> AuthService {
        let mut config = PanelConfig::for_tests().auth;
        config.mode = mode;
        AuthService::new(Arc::new(MemoryStore::new()), Guard::default(), config)
    }

    #[tokio::test]
    async fn test_sign_up_and_sign_in() {
        let auth = service(AuthMode::Accounts);
        let identity = auth.sign_up("alice", "secret", None).await.unwrap();
        assert_eq!(identity.role, Role::User);

        let session = auth.sign_in("alice", "secret").await.unwrap();
        assert_eq!(session.token.len(), 64);
        assert_eq!(auth.authenticate(&session.token).unwrap().id, identity.id);

        let err = auth.sign_in("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_usernames() {
        let auth = service(AuthMode::Accounts);
        auth.sign_up("alice", "secret", None).await.unwrap();
        assert!(matches!(
            auth.sign_up("alice", "secret", None).await,
            Err(Error::DuplicateUsername(_))
        ));
        assert!(matches!(
            auth.sign_up("a", "secret", None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            auth.sign_up("bad name", "secret", None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            auth.sign_up("bob", "x", None).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_rejected_in_accounts_mode() {
        let auth = service(AuthMode::Accounts);
        assert!(matches!(
            auth.sign_in("ghost", "secret").await,
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_demo_mode_provisions_users() {
        let auth = service(AuthMode::Demo);
        let session = auth.sign_in("visitor", "anything").await.unwrap();
        assert_eq!(session.identity.role, Role::User);

        // The provisioned password sticks
        assert!(auth.sign_in("visitor", "different").await.is_err());
    }

    #[tokio::test]
    async fn test_demo_mode_accepts_short_credentials() {
        let auth = service(AuthMode::Demo);
        let session = auth.sign_in("visitor", "abc").await.unwrap();
        assert_eq!(session.identity.username, "visitor");
        assert!(auth.sign_in("visitor", "abc").await.is_ok());

        let short = auth.sign_in("jo", "x").await.unwrap();
        assert_eq!(short.identity.username, "jo");

        // Account mode still enforces the regular rules
        let strict = service(AuthMode::Accounts);
        assert!(matches!(
            strict.sign_up("visitor", "abc", None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            auth.sign_in("bad name", "abc").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_seed_creates_admin_once() {
        let auth = service(AuthMode::Accounts);
        assert_eq!(auth.seed().await.unwrap(), 1);
        assert_eq!(auth.seed().await.unwrap(), 0);

        let session = auth.sign_in("admin", "admin").await.unwrap();
        assert_eq!(session.identity.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_sign_out_and_expiry() {
        let mut config = PanelConfig::for_tests().auth;
        config.session_ttl_secs = -1;
        let auth = AuthService::new(Arc::new(MemoryStore::new()), Guard::default(), config);
        auth.sign_up("alice", "secret", None).await.unwrap();

        let expired = auth.sign_in("alice", "secret").await.unwrap();
        assert!(matches!(
            auth.authenticate(&expired.token),
            Err(Error::Unauthorized(_))
        ));

        let auth = service(AuthMode::Accounts);
        auth.sign_up("alice", "secret", None).await.unwrap();
        let session = auth.sign_in("alice", "secret").await.unwrap();
        auth.sign_out(&session.token).unwrap();
        assert!(auth.authenticate(&session.token).is_err());
    }

    #[tokio::test]
    async fn test_deactivated_user_cannot_authenticate() {
        let auth = service(AuthMode::Accounts);
        auth.seed().await.unwrap();
        let admin = auth.sign_in("admin", "admin").await.unwrap().identity;

        let alice = auth.sign_up("alice", "secret", None).await.unwrap();
        let session = auth.sign_in("alice", "secret").await.unwrap();

        auth.set_active(&admin, &alice.id, false).unwrap();
        assert!(auth.authenticate(&session.token).is_err());
        assert!(matches!(
            auth.sign_in("alice", "secret").await,
            Err(Error::Unauthorized(_))
        ));

        assert!(auth.set_active(&admin, &admin.id, false).is_err());
    }

    #[tokio::test]
    async fn test_admin_only_user_management() {
        let auth = service(AuthMode::Accounts);
        auth.seed().await.unwrap();
        let admin = auth.sign_in("admin", "admin").await.unwrap().identity;
        let alice = auth.sign_up("alice", "secret", None).await.unwrap();

        assert!(matches!(auth.list_users(&alice), Err(Error::Forbidden(_))));
        assert!(matches!(
            auth.create_user(&alice, "eve", "secret", Role::Admin).await,
            Err(Error::Forbidden(_))
        ));

        let ops = auth.create_user(&admin, "ops", "secret", Role::Admin).await.unwrap();
        assert_eq!(ops.role, Role::Admin);
        assert_eq!(auth.list_users(&admin).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_profile_and_password_changes() {
        let auth = service(AuthMode::Accounts);
        let alice = auth.sign_up("alice", "secret", None).await.unwrap();

        let updated = auth
            .update_profile(&alice, Some("alice2"), Some(Some("a@example.com".into())))
            .unwrap();
        assert_eq!(updated.username, "alice2");
        assert_eq!(updated.role, Role::User);

        auth.change_password(&updated, "new-secret").await.unwrap();
        assert!(auth.sign_in("alice2", "secret").await.is_err());
        auth.sign_in("alice2", "new-secret").await.unwrap();
    }
}
