//! Role-dependent dashboard view models

use std::collections::HashMap;
use vpspanel_common::api::{
    AdminDashboard, Dashboard, DashboardTotals, UserDashboard, UserSummary, VpsView,
};
use vpspanel_common::{now_epoch_secs, Identity, Result, VpsStatus};

use crate::activity::ActivityLog;
use crate::auth::rbac::{USERS_MANAGE, VPS_LIST_ALL};
use crate::auth::{AuthService, Guard};
use crate::registry::Registry;

const USER_ACTIVITY_LIMIT: usize = 20;

/// Builds the single-VPS view for users and the full view for admins
#[derive(Clone)]
pub struct Dashboards {
    guard: Guard,
    registry: Registry,
    activity: ActivityLog,
    auth: AuthService,
}

impl Dashboards {
    pub fn new(guard: Guard, registry: Registry, activity: ActivityLog, auth: AuthService) -> Self {
        Self {
            guard,
            registry,
            activity,
            auth,
        }
    }

    pub fn for_caller(&self, caller: &Identity) -> Result<Dashboard> {
        if self.guard.allows(caller, VPS_LIST_ALL) && self.guard.allows(caller, USERS_MANAGE) {
            self.admin(caller).map(Dashboard::Admin)
        } else {
            self.user(caller).map(Dashboard::User)
        }
    }

    pub fn user(&self, caller: &Identity) -> Result<UserDashboard> {
        let now = now_epoch_secs();
        let vps = self
            .registry
            .list(caller)?
            .into_iter()
            .find(|v| v.owner_id == caller.id)
            .map(|v| VpsView::new(v, now));
        let activity = self.activity.list_for(
            caller,
            vps.as_ref().map(|v| v.vps.id.as_str()),
            Some(USER_ACTIVITY_LIMIT),
        )?;

        Ok(UserDashboard {
            identity: caller.clone(),
            vps,
            activity,
        })
    }

    pub fn admin(&self, caller: &Identity) -> Result<AdminDashboard> {
        let now = now_epoch_secs();
        let identities = self.auth.list_users(caller)?;
        let all = self.registry.list_all(caller)?;

        let usernames: HashMap<&str, &str> = identities
            .iter()
            .map(|i| (i.id.as_str(), i.username.as_str()))
            .collect();
        let mut status_by_owner: HashMap<&str, VpsStatus> = HashMap::new();
        for v in &all {
            status_by_owner.entry(v.owner_id.as_str()).or_insert(v.status);
        }

        let users: Vec<UserSummary> = identities
            .iter()
            .map(|i| {
                let vps_status = status_by_owner.get(i.id.as_str()).copied();
                UserSummary {
                    identity: i.clone(),
                    has_vps: vps_status.is_some(),
                    vps_status,
                }
            })
            .collect();

        let totals = DashboardTotals {
            users: identities.len(),
            vps: all.len(),
            running: all.iter().filter(|v| v.status == VpsStatus::Running).count(),
        };

        let vps = all
            .iter()
            .cloned()
            .map(|v| {
                let owner = usernames.get(v.owner_id.as_str()).map(|s| s.to_string());
                let mut view = VpsView::new(v, now);
                view.owner_username = owner;
                view
            })
            .collect();

        Ok(AdminDashboard {
            identity: caller.clone(),
            users,
            vps,
            totals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use crate::state::PanelState;
    use std::time::Duration;
    use vpspanel_common::api::DeployRequest;

    #[tokio::test(start_paused = true)]
    async fn test_user_and_admin_views() {
        let state = PanelState::new(PanelConfig::for_tests()).await.unwrap();
        let admin = state.auth.sign_in("admin", "admin").await.unwrap().identity;
        let alice = state.auth.sign_up("alice", "secret", None).await.unwrap();
        state.auth.sign_up("bob", "secret", None).await.unwrap();

        match state.dashboards.for_caller(&alice).unwrap() {
            Dashboard::User(d) => {
                assert!(d.vps.is_none());
                assert!(d.activity.is_empty());
            }
            Dashboard::Admin(_) => panic!("user got the admin view"),
        }

        state.registry.deploy(&alice, DeployRequest::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(3100)).await;

        match state.dashboards.for_caller(&alice).unwrap() {
            Dashboard::User(d) => {
                let view = d.vps.unwrap();
                assert_eq!(view.vps.status, VpsStatus::Running);
                assert!(view.uptime_seconds.is_some());
                assert_eq!(d.activity.len(), 1);
            }
            Dashboard::Admin(_) => panic!("user got the admin view"),
        }

        match state.dashboards.for_caller(&admin).unwrap() {
            Dashboard::Admin(d) => {
                assert_eq!(d.totals.users, 3);
                assert_eq!(d.totals.vps, 1);
                assert_eq!(d.totals.running, 1);
                assert_eq!(d.vps[0].owner_username.as_deref(), Some("alice"));
                let alice_row = d.users.iter().find(|u| u.identity.id == alice.id).unwrap();
                assert!(alice_row.has_vps);
                assert_eq!(alice_row.vps_status, Some(VpsStatus::Running));
                let bob_row = d.users.iter().find(|u| u.identity.username == "bob").unwrap();
                assert!(!bob_row.has_vps);
            }
            Dashboard::User(_) => panic!("admin got the user view"),
        }

        assert!(state.dashboards.admin(&alice).is_err());
    }
}
