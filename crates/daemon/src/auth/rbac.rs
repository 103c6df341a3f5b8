//! Role-based access control.
//!
//! Roles map to permission strings of the form `resource:action`. A role
//! may hold the global wildcard `*` or a resource wildcard like `vps:*`.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use vpspanel_common::Role as IdentityRole;

pub const VPS_DEPLOY: &str = "vps:deploy";
pub const VPS_READ: &str = "vps:read";
pub const VPS_START: &str = "vps:start";
pub const VPS_STOP: &str = "vps:stop";
pub const VPS_RESTART: &str = "vps:restart";
pub const VPS_DESTROY: &str = "vps:destroy";
pub const VPS_EXEC: &str = "vps:exec";
/// Read every VPS regardless of owner
pub const VPS_LIST_ALL: &str = "registry:read";
pub const ACTIVITY_READ: &str = "activity:read";
pub const ACTIVITY_READ_ALL: &str = "activity:read_all";
pub const PROFILE_UPDATE: &str = "profile:update";
pub const USERS_MANAGE: &str = "users:manage";

/// A role and the permissions it grants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Matches the identity role name ("admin", "user")
    pub id: String,
    pub description: String,
    pub permissions: Vec<String>,
    /// Roles whose permissions are included
    #[serde(default)]
    pub inherits: Vec<String>,
}

/// Policy engine for evaluating permissions
pub struct PolicyEngine {
    roles: Vec<RoleDefinition>,
    role_permissions: HashMap<String, HashSet<String>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        let mut engine = Self {
            roles: Vec::new(),
            role_permissions: HashMap::new(),
        };
        engine.load_default_roles();
        engine
    }

    fn load_default_roles(&mut self) {
        self.add_role(RoleDefinition {
            id: "user".to_string(),
            description: "Owns at most one VPS and drives it".to_string(),
            permissions: vec![
                "vps:*".to_string(),
                ACTIVITY_READ.to_string(),
                PROFILE_UPDATE.to_string(),
            ],
            inherits: vec![],
        });
        self.add_role(RoleDefinition {
            id: "admin".to_string(),
            description: "Full access to every user and VPS".to_string(),
            permissions: vec!["*".to_string()],
            inherits: vec!["user".to_string()],
        });
    }

    /// Add a role and recompile permissions
    pub fn add_role(&mut self, role: RoleDefinition) {
        self.roles.retain(|r| r.id != role.id);
        self.roles.push(role);
        self.compile_permissions();
    }

    /// Compile role -> permission mappings with single-level inheritance
    fn compile_permissions(&mut self) {
        self.role_permissions.clear();

        for role in &self.roles {
            self.role_permissions
                .entry(role.id.clone())
                .or_default()
                .extend(role.permissions.iter().cloned());
        }

        for role in &self.roles {
            for parent_id in &role.inherits {
                if let Some(parent) = self.role_permissions.get(parent_id).cloned() {
                    if let Some(child) = self.role_permissions.get_mut(&role.id) {
                        child.extend(parent);
                    }
                }
            }
        }
    }

    pub fn permissions_for(&self, role: IdentityRole) -> HashSet<String> {
        self.role_permissions
            .get(role.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Check whether `role` grants `permission`
    pub fn has_permission(&self, role: IdentityRole, permission: &str) -> bool {
        let Some(perms) = self.role_permissions.get(role.as_str()) else {
            return false;
        };
        if perms.contains("*") || perms.contains(permission) {
            return true;
        }
        // "vps:*" matches "vps:start"
        if let Some((resource, _action)) = permission.split_once(':') {
            if perms.contains(&format!("{}:*", resource)) {
                return true;
            }
        }
        false
    }

    pub fn roles(&self) -> &[RoleDefinition] {
        &self.roles
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roles() {
        let engine = PolicyEngine::new();

        assert!(engine.has_permission(IdentityRole::Admin, USERS_MANAGE));
        assert!(engine.has_permission(IdentityRole::Admin, "anything:at:all"));

        assert!(engine.has_permission(IdentityRole::User, VPS_DEPLOY));
        assert!(engine.has_permission(IdentityRole::User, VPS_EXEC));
        assert!(engine.has_permission(IdentityRole::User, ACTIVITY_READ));
        assert!(!engine.has_permission(IdentityRole::User, USERS_MANAGE));
        assert!(!engine.has_permission(IdentityRole::User, VPS_LIST_ALL));
        assert!(!engine.has_permission(IdentityRole::User, ACTIVITY_READ_ALL));
    }

    #[test]
    fn test_inheritance() {
        let engine = PolicyEngine::new();
        let admin = engine.permissions_for(IdentityRole::Admin);
        assert!(admin.contains("*"));
        assert!(admin.contains("vps:*"));
        assert_eq!(engine.roles().len(), 2);
    }

    #[test]
    fn test_replacing_a_role() {
        let mut engine = PolicyEngine::new();
        engine.add_role(RoleDefinition {
            id: "user".to_string(),
            description: "read only".to_string(),
            permissions: vec![VPS_READ.to_string()],
            inherits: vec![],
        });
        assert!(engine.has_permission(IdentityRole::User, VPS_READ));
        assert!(!engine.has_permission(IdentityRole::User, VPS_START));
    }
}
