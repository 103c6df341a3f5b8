//! Core types for VPS Panel

use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Current time as unix seconds
pub fn now_epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

macro_rules! string_enum {
    ($ty:ident, $what:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($ty::$variant),)+
                    other => Err(Error::Validation(format!("unknown {}: {}", $what, other))),
                }
            }
        }
    };
}

/// Identity role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    User,
}

string_enum!(Role, "role", { Admin => "admin", User => "user" });

/// VPS lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VpsStatus {
    #[default]
    Pending,
    Deploying,
    Running,
    Stopped,
    Error,
}

string_enum!(VpsStatus, "vps status", {
    Pending => "pending",
    Deploying => "deploying",
    Running => "running",
    Stopped => "stopped",
    Error => "error",
});

impl VpsStatus {
    /// Statuses that resolve on their own through a scheduled transition.
    pub fn is_transient(&self) -> bool {
        matches!(self, VpsStatus::Pending | VpsStatus::Deploying)
    }
}

/// Action recorded in the activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Deploy,
    Start,
    Stop,
    Restart,
    Destroy,
    Exec,
}

string_enum!(ActivityAction, "activity action", {
    Deploy => "deploy",
    Start => "start",
    Stop => "stop",
    Restart => "restart",
    Destroy => "destroy",
    Exec => "exec",
});

/// Outcome of a logged action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityOutcome {
    Success,
    Error,
    Pending,
}

string_enum!(ActivityOutcome, "activity outcome", {
    Success => "success",
    Error => "error",
    Pending => "pending",
});

/// Descriptive resource triple. Never enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub cpu: String,
    pub ram: String,
    pub disk: String,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            cpu: "2 cores".to_string(),
            ram: "2GB".to_string(),
            disk: "20GB SSD".to_string(),
        }
    }
}

/// A simulated virtual private server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vps {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub status: VpsStatus,
    pub container_id: String,
    pub image: String,
    #[serde(default)]
    pub resources: ResourceSpec,
    pub ip_address: String,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deployed_at: Option<i64>,
    pub last_started_at: Option<i64>,
    pub generation: i64,
}

impl Vps {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = now_epoch_secs();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            status: VpsStatus::Pending,
            container_id: String::new(),
            image: String::new(),
            resources: ResourceSpec::default(),
            ip_address: String::new(),
            ports: Vec::new(),
            environment: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            deployed_at: None,
            last_started_at: None,
            generation: 1,
        }
    }

    /// Move to `status`, bumping the generation. Entering `running`
    /// stamps `last_started_at`.
    pub fn set_status(&mut self, status: VpsStatus) {
        let now = now_epoch_secs();
        if status == VpsStatus::Running {
            self.last_started_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
        self.generation += 1;
    }

    /// Seconds since the last start, only while running.
    pub fn uptime_seconds(&self, now: i64) -> Option<i64> {
        match (self.status, self.last_started_at) {
            (VpsStatus::Running, Some(started)) => Some((now - started).max(0)),
            _ => None,
        }
    }
}

/// Append-only activity log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub vps_id: String,
    pub action: ActivityAction,
    pub outcome: ActivityOutcome,
    #[serde(default)]
    pub detail: serde_json::Value,
    pub created_by: Option<String>,
    pub created_at: i64,
}

impl ActivityEntry {
    pub fn new(
        vps_id: impl Into<String>,
        action: ActivityAction,
        outcome: ActivityOutcome,
        detail: serde_json::Value,
        created_by: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vps_id: vps_id.into(),
            action,
            outcome,
            detail,
            created_by,
            created_at: now_epoch_secs(),
        }
    }
}

/// Query over the activity log. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub vps_id: Option<String>,
    pub created_by: Option<String>,
    pub limit: usize,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        let now = now_epoch_secs();
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            email: None,
            role,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Stored user: identity plus credential
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub identity: Identity,
    pub password_hash: String,
}

/// Bearer session. Only the token hash is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub identity_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_seen_at: i64,
}

impl Session {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Simulated resource usage sample reported by the `status` action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// percent
    pub cpu: u32,
    /// MiB
    pub memory: u32,
    /// MiB
    pub disk: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_names() {
        for status in [
            VpsStatus::Pending,
            VpsStatus::Deploying,
            VpsStatus::Running,
            VpsStatus::Stopped,
            VpsStatus::Error,
        ] {
            let parsed: VpsStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
        assert!("booting".parse::<VpsStatus>().is_err());
    }

    #[test]
    fn test_set_status_bumps_generation() {
        let mut vps = Vps::new("owner", "web");
        assert_eq!(vps.generation, 1);
        assert!(vps.last_started_at.is_none());

        vps.set_status(VpsStatus::Running);
        assert_eq!(vps.generation, 2);
        assert!(vps.last_started_at.is_some());

        vps.set_status(VpsStatus::Stopped);
        assert_eq!(vps.generation, 3);
        assert_eq!(vps.uptime_seconds(now_epoch_secs()), None);
    }

    #[test]
    fn test_uptime_while_running() {
        let mut vps = Vps::new("owner", "web");
        vps.status = VpsStatus::Running;
        vps.last_started_at = Some(1_000);
        assert_eq!(vps.uptime_seconds(1_090), Some(90));
        assert_eq!(vps.uptime_seconds(900), Some(0));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(VpsStatus::Pending.is_transient());
        assert!(VpsStatus::Deploying.is_transient());
        assert!(!VpsStatus::Running.is_transient());
        assert!(!VpsStatus::Stopped.is_transient());
    }
}
