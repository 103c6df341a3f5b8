//! Storage abstraction shared by the in-memory and SQLite backends

use crate::types::{ActivityEntry, ActivityFilter, Identity, Session, UserRecord, Vps};
use crate::Result;

/// Persistent state behind the panel.
///
/// Implementations must make `insert_vps` with `exclusive = true` atomic:
/// the owner check and the insert happen under one lock or transaction.
pub trait Store: Send + Sync + 'static {
    // Users

    /// Fails with `DuplicateUsername` if the username is taken.
    fn insert_user(&self, user: &UserRecord) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<UserRecord>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    fn list_users(&self) -> Result<Vec<Identity>>;
    /// Replaces the stored user. Fails with `NotFound` or `DuplicateUsername`.
    fn update_user(&self, user: &UserRecord) -> Result<()>;
    fn delete_user(&self, id: &str) -> Result<bool>;

    // VPS records

    /// Inserts a record. With `exclusive`, fails with `DuplicateVps` when the
    /// owner already has one.
    fn insert_vps(&self, vps: &Vps, exclusive: bool) -> Result<()>;
    fn get_vps(&self, id: &str) -> Result<Option<Vps>>;
    fn list_vps(&self) -> Result<Vec<Vps>>;
    fn list_vps_by_owner(&self, owner_id: &str) -> Result<Vec<Vps>>;
    /// Fails with `NotFound` if the record is gone.
    fn update_vps(&self, vps: &Vps) -> Result<()>;
    fn delete_vps(&self, id: &str) -> Result<bool>;

    // Activity log

    fn append_activity(&self, entry: &ActivityEntry) -> Result<()>;
    fn list_activity(&self, filter: &ActivityFilter) -> Result<Vec<ActivityEntry>>;

    // Sessions

    fn insert_session(&self, session: &Session) -> Result<()>;
    fn get_session(&self, token_hash: &str) -> Result<Option<Session>>;
    fn touch_session(&self, token_hash: &str, now: i64) -> Result<()>;
    fn delete_session(&self, token_hash: &str) -> Result<bool>;
    fn delete_sessions_for(&self, identity_id: &str) -> Result<usize>;
    fn purge_expired_sessions(&self, now: i64) -> Result<usize>;
}
