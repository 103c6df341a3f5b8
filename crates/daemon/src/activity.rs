//! Activity log: append-only audit trail of actions against VPS records

use std::sync::Arc;
use tracing::debug;
use vpspanel_common::{
    ActivityAction, ActivityEntry, ActivityFilter, ActivityOutcome, Identity, Result, Store,
};

use crate::auth::rbac::{ACTIVITY_READ, ACTIVITY_READ_ALL};
use crate::auth::Guard;

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 500;

#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn Store>,
    guard: Guard,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn Store>, guard: Guard) -> Self {
        Self { store, guard }
    }

    pub fn record(
        &self,
        vps_id: &str,
        action: ActivityAction,
        outcome: ActivityOutcome,
        detail: serde_json::Value,
        actor: Option<&Identity>,
    ) -> Result<ActivityEntry> {
        let entry = ActivityEntry::new(vps_id, action, outcome, detail, actor.map(|a| a.id.clone()));
        self.store.append_activity(&entry)?;
        debug!("Logged {} {} for VPS {}", entry.action, entry.outcome, vps_id);
        Ok(entry)
    }

    /// Newest entries first. Callers without `activity:read_all` only see
    /// entries they created.
    pub fn list_for(
        &self,
        caller: &Identity,
        vps_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityEntry>> {
        self.guard.require(caller, ACTIVITY_READ)?;

        let created_by = if self.guard.allows(caller, ACTIVITY_READ_ALL) {
            None
        } else {
            Some(caller.id.clone())
        };

        self.store.list_activity(&ActivityFilter {
            vps_id: vps_id.map(str::to_string),
            created_by,
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpspanel_common::{MemoryStore, Role};

    #[test]
    fn test_visibility_by_role() {
        let log = ActivityLog::new(Arc::new(MemoryStore::new()), Guard::default());
        let alice = Identity::new("alice", Role::User);
        let bob = Identity::new("bob", Role::User);
        let admin = Identity::new("admin", Role::Admin);

        for actor in [&alice, &bob, &bob] {
            log.record(
                "vps-1",
                ActivityAction::Start,
                ActivityOutcome::Success,
                serde_json::json!({}),
                Some(actor),
            )
            .unwrap();
        }

        assert_eq!(log.list_for(&alice, None, None).unwrap().len(), 1);
        assert_eq!(log.list_for(&bob, None, None).unwrap().len(), 2);
        assert_eq!(log.list_for(&admin, None, None).unwrap().len(), 3);
        assert_eq!(log.list_for(&admin, Some("other"), None).unwrap().len(), 0);
        assert_eq!(log.list_for(&admin, None, Some(1)).unwrap().len(), 1);
        // Zero is clamped up to one
        assert_eq!(log.list_for(&admin, None, Some(0)).unwrap().len(), 1);
    }
}
