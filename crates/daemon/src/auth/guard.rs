//! The single authorization check applied before every protected operation

use std::sync::Arc;
use tracing::warn;
use vpspanel_common::{Error, Identity, Result, Vps};

use super::rbac::PolicyEngine;

/// Admits or rejects a caller for a permission, optionally against a record.
///
/// A caller passes when they are active, their role grants the permission,
/// and (for record-scoped checks) they own the record or are an admin.
#[derive(Clone)]
pub struct Guard {
    policy: Arc<PolicyEngine>,
}

impl Guard {
    pub fn new(policy: PolicyEngine) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn authorize(&self, caller: &Identity, permission: &str, target: Option<&Vps>) -> Result<()> {
        if !caller.active {
            return Err(Error::Unauthorized("account is deactivated".to_string()));
        }

        if !self.policy.has_permission(caller.role, permission) {
            warn!(
                "Denied {} to {} ({}): role lacks permission",
                permission, caller.username, caller.role
            );
            return Err(Error::Forbidden(format!("{} requires {}", caller.role, permission)));
        }

        if let Some(vps) = target {
            if vps.owner_id != caller.id && !caller.is_admin() {
                warn!(
                    "Denied {} on VPS {} to {}: not owner",
                    permission, vps.id, caller.username
                );
                return Err(Error::Forbidden(format!("not the owner of VPS {}", vps.id)));
            }
        }

        Ok(())
    }

    /// Like [`authorize`](Self::authorize) without a target record.
    pub fn require(&self, caller: &Identity, permission: &str) -> Result<()> {
        self.authorize(caller, permission, None)
    }

    pub fn allows(&self, caller: &Identity, permission: &str) -> bool {
        caller.active && self.policy.has_permission(caller.role, permission)
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self::new(PolicyEngine::new())
    }
}
