//! In-process store used in demo mode and tests

use crate::store::Store;
use crate::types::{ActivityEntry, ActivityFilter, Identity, Session, UserRecord, Vps};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    vps: HashMap<String, Vps>,
    activity: Vec<ActivityEntry>,
    sessions: HashMap<String, Session>,
}

/// Store that keeps everything in memory behind one lock
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn insert_user(&self, user: &UserRecord) -> Result<()> {
        let mut t = self.tables.write();
        if t.users
            .values()
            .any(|u| u.identity.username == user.identity.username)
        {
            return Err(Error::DuplicateUsername(user.identity.username.clone()));
        }
        t.users.insert(user.identity.id.clone(), user.clone());
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.tables.read().users.get(id).cloned())
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.identity.username == username)
            .cloned())
    }

    fn list_users(&self) -> Result<Vec<Identity>> {
        let mut users: Vec<Identity> = self
            .tables
            .read()
            .users
            .values()
            .map(|u| u.identity.clone())
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.username.cmp(&b.username)));
        Ok(users)
    }

    fn update_user(&self, user: &UserRecord) -> Result<()> {
        let mut t = self.tables.write();
        let id = &user.identity.id;
        if !t.users.contains_key(id) {
            return Err(Error::not_found("user", id.as_str()));
        }
        if t.users
            .values()
            .any(|u| u.identity.id != *id && u.identity.username == user.identity.username)
        {
            return Err(Error::DuplicateUsername(user.identity.username.clone()));
        }
        t.users.insert(id.clone(), user.clone());
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        Ok(self.tables.write().users.remove(id).is_some())
    }

    fn insert_vps(&self, vps: &Vps, exclusive: bool) -> Result<()> {
        let mut t = self.tables.write();
        if exclusive && t.vps.values().any(|v| v.owner_id == vps.owner_id) {
            return Err(Error::DuplicateVps {
                owner_id: vps.owner_id.clone(),
            });
        }
        t.vps.insert(vps.id.clone(), vps.clone());
        Ok(())
    }

    fn get_vps(&self, id: &str) -> Result<Option<Vps>> {
        Ok(self.tables.read().vps.get(id).cloned())
    }

    fn list_vps(&self) -> Result<Vec<Vps>> {
        let mut all: Vec<Vps> = self.tables.read().vps.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    fn list_vps_by_owner(&self, owner_id: &str) -> Result<Vec<Vps>> {
        Ok(self
            .list_vps()?
            .into_iter()
            .filter(|v| v.owner_id == owner_id)
            .collect())
    }

    fn update_vps(&self, vps: &Vps) -> Result<()> {
        let mut t = self.tables.write();
        match t.vps.get_mut(&vps.id) {
            Some(slot) => {
                *slot = vps.clone();
                Ok(())
            }
            None => Err(Error::not_found("vps", vps.id.as_str())),
        }
    }

    fn delete_vps(&self, id: &str) -> Result<bool> {
        Ok(self.tables.write().vps.remove(id).is_some())
    }

    fn append_activity(&self, entry: &ActivityEntry) -> Result<()> {
        self.tables.write().activity.push(entry.clone());
        Ok(())
    }

    fn list_activity(&self, filter: &ActivityFilter) -> Result<Vec<ActivityEntry>> {
        let t = self.tables.read();
        Ok(t.activity
            .iter()
            .rev()
            .filter(|e| filter.vps_id.as_deref().map_or(true, |id| e.vps_id == id))
            .filter(|e| {
                filter
                    .created_by
                    .as_deref()
                    .map_or(true, |by| e.created_by.as_deref() == Some(by))
            })
            .take(filter.limit)
            .cloned()
            .collect())
    }

    fn insert_session(&self, session: &Session) -> Result<()> {
        self.tables
            .write()
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    fn get_session(&self, token_hash: &str) -> Result<Option<Session>> {
        Ok(self.tables.read().sessions.get(token_hash).cloned())
    }

    fn touch_session(&self, token_hash: &str, now: i64) -> Result<()> {
        if let Some(s) = self.tables.write().sessions.get_mut(token_hash) {
            s.last_seen_at = now;
        }
        Ok(())
    }

    fn delete_session(&self, token_hash: &str) -> Result<bool> {
        Ok(self.tables.write().sessions.remove(token_hash).is_some())
    }

    fn delete_sessions_for(&self, identity_id: &str) -> Result<usize> {
        let mut t = self.tables.write();
        let before = t.sessions.len();
        t.sessions.retain(|_, s| s.identity_id != identity_id);
        Ok(before - t.sessions.len())
    }

    fn purge_expired_sessions(&self, now: i64) -> Result<usize> {
        let mut t = self.tables.write();
        let before = t.sessions.len();
        t.sessions.retain(|_, s| !s.is_expired(now));
        Ok(before - t.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityAction, ActivityOutcome, Role};

    fn user(name: &str) -> UserRecord {
        UserRecord {
            identity: Identity::new(name, Role::User),
            password_hash: "x".into(),
        }
    }

    #[test]
    fn test_exclusive_insert() {
        let store = MemoryStore::new();
        let first = Vps::new("alice", "one");
        let second = Vps::new("alice", "two");

        store.insert_vps(&first, true).unwrap();
        let err = store.insert_vps(&second, true).unwrap_err();
        assert!(matches!(err, Error::DuplicateVps { .. }));

        // Non-exclusive inserts are not capped
        store.insert_vps(&second, false).unwrap();
        assert_eq!(store.list_vps_by_owner("alice").unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_username() {
        let store = MemoryStore::new();
        store.insert_user(&user("bob")).unwrap();
        assert!(matches!(
            store.insert_user(&user("bob")),
            Err(Error::DuplicateUsername(_))
        ));

        let mut carol = user("carol");
        store.insert_user(&carol).unwrap();
        carol.identity.username = "bob".into();
        assert!(matches!(
            store.update_user(&carol),
            Err(Error::DuplicateUsername(_))
        ));
    }

    #[test]
    fn test_activity_newest_first_with_filters() {
        let store = MemoryStore::new();
        for (vps, by) in [("a", "u1"), ("b", "u2"), ("a", "u2")] {
            let entry = ActivityEntry::new(
                vps,
                ActivityAction::Start,
                ActivityOutcome::Success,
                serde_json::json!({}),
                Some(by.to_string()),
            );
            store.append_activity(&entry).unwrap();
        }

        let all = store
            .list_activity(&ActivityFilter { limit: 10, ..Default::default() })
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].vps_id, "a");
        assert_eq!(all[0].created_by.as_deref(), Some("u2"));

        let only_a = store
            .list_activity(&ActivityFilter {
                vps_id: Some("a".into()),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(only_a.len(), 2);

        let by_u1 = store
            .list_activity(&ActivityFilter {
                created_by: Some("u1".into()),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_u1.len(), 1);

        let limited = store
            .list_activity(&ActivityFilter { limit: 1, ..Default::default() })
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_session_purge() {
        let store = MemoryStore::new();
        let live = Session {
            token_hash: "live".into(),
            identity_id: "u".into(),
            created_at: 0,
            expires_at: 100,
            last_seen_at: 0,
        };
        let dead = Session {
            token_hash: "dead".into(),
            expires_at: 10,
            ..live.clone()
        };
        store.insert_session(&live).unwrap();
        store.insert_session(&dead).unwrap();

        assert_eq!(store.purge_expired_sessions(50).unwrap(), 1);
        assert!(store.get_session("live").unwrap().is_some());
        assert!(store.get_session("dead").unwrap().is_none());
    }
}
