//! Wire types shared by the daemon and its clients

use crate::types::{ActivityEntry, Identity, ResourceSpec, ResourceUsage, Role, Vps, VpsStatus};
use crate::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response envelope: `{"success": true, "data": ...}` or
/// `{"success": false, "error": "...", "kind": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }
}

/// Deployment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Deploy on behalf of another user (admins only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// Body of the `docker-manager` operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerManagerRequest {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vps_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DeployRequest>,
}

/// Body of the `terminal-exec` operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalExecRequest {
    pub vps_id: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

/// Result of one fake-terminal command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub output: String,
    pub exit_code: i32,
    pub executed_at: String,
    pub working_directory: String,
}

/// Timestamps reported by lifecycle operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpsTimestamps {
    pub created_at: i64,
    pub updated_at: i64,
    pub deployed_at: Option<i64>,
    pub last_started_at: Option<i64>,
}

/// Outcome of a `docker-manager` lifecycle action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleResult {
    pub vps_id: String,
    pub container_id: String,
    pub ip_address: String,
    pub status: VpsStatus,
    pub timestamps: VpsTimestamps,
    /// Present for `status`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_usage: Option<ResourceUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<i64>,
    /// Present for `destroy`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub destroyed: bool,
}

impl LifecycleResult {
    pub fn from_vps(vps: &Vps, now: i64) -> Self {
        Self {
            vps_id: vps.id.clone(),
            container_id: vps.container_id.clone(),
            ip_address: vps.ip_address.clone(),
            status: vps.status,
            timestamps: VpsTimestamps {
                created_at: vps.created_at,
                updated_at: vps.updated_at,
                deployed_at: vps.deployed_at,
                last_started_at: vps.last_started_at,
            },
            resource_usage: None,
            uptime_seconds: vps.uptime_seconds(now),
            destroyed: false,
        }
    }
}

/// A VPS as shown in listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpsView {
    #[serde(flatten)]
    pub vps: Vps,
    pub uptime_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
}

impl VpsView {
    pub fn new(vps: Vps, now: i64) -> Self {
        let uptime_seconds = vps.uptime_seconds(now);
        Self {
            vps,
            uptime_seconds,
            owner_username: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub identity: Identity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

/// `email: null` clears the address; an absent field leaves it alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub email: Option<Option<String>>,
}

fn double_option<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// Row of the admin user table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub identity: Identity,
    pub has_vps: bool,
    pub vps_status: Option<VpsStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardTotals {
    pub users: usize,
    pub vps: usize,
    pub running: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDashboard {
    pub identity: Identity,
    pub vps: Option<VpsView>,
    pub activity: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub identity: Identity,
    pub users: Vec<UserSummary>,
    pub vps: Vec<VpsView>,
    pub totals: DashboardTotals,
}

/// Role-dependent dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Dashboard {
    User(UserDashboard),
    Admin(AdminDashboard),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let ok = serde_json::to_value(Envelope::ok(1)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": 1}));

        let err: Envelope<()> = serde_json::from_value(serde_json::json!({
            "success": false,
            "error": "VPS is not running",
            "kind": "NotRunning",
        }))
        .unwrap();
        assert_eq!(err.kind, Some(ErrorKind::NotRunning));
        assert!(err.data.is_none());
    }

    #[test]
    fn test_profile_email_tristate() {
        let absent: UpdateProfileRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.email, None);

        let cleared: UpdateProfileRequest = serde_json::from_str(r#"{"email": null}"#).unwrap();
        assert_eq!(cleared.email, Some(None));

        let set: UpdateProfileRequest =
            serde_json::from_str(r#"{"email": "a@example.com"}"#).unwrap();
        assert_eq!(set.email, Some(Some("a@example.com".into())));
    }

    #[test]
    fn test_vps_view_flattens_record() {
        let mut vps = Vps::new("owner", "web");
        vps.status = VpsStatus::Running;
        vps.last_started_at = Some(100);
        let view = serde_json::to_value(VpsView::new(vps, 160)).unwrap();
        assert_eq!(view["name"], "web");
        assert_eq!(view["status"], "running");
        assert_eq!(view["uptime_seconds"], 60);
    }

    #[test]
    fn test_dashboard_tag() {
        let dash = Dashboard::User(UserDashboard {
            identity: Identity::new("alice", Role::User),
            vps: None,
            activity: vec![],
        });
        let value = serde_json::to_value(&dash).unwrap();
        assert_eq!(value["view"], "user");
        assert_eq!(value["identity"]["username"], "alice");
    }
}
