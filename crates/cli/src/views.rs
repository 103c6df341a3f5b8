//! Table rows for panel resources

use serde::Serialize;
use vpspanel_common::api::{LifecycleResult, UserSummary, VpsView};
use vpspanel_common::{ActivityEntry, Identity};

use crate::output::{format_timestamp, format_uptime, outcome_badge, status_badge, TableDisplay};

#[derive(Serialize)]
#[serde(transparent)]
pub struct IdentityDisplay(pub Identity);

impl From<Identity> for IdentityDisplay {
    fn from(identity: Identity) -> Self {
        Self(identity)
    }
}

impl TableDisplay for IdentityDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Username", "Email", "Role", "Active", "Created"]
    }

    fn row(&self) -> Vec<String> {
        let i = &self.0;
        vec![
            i.id.clone(),
            i.username.clone(),
            i.email.clone().unwrap_or_else(|| "-".to_string()),
            i.role.to_string(),
            if i.active { "yes" } else { "no" }.to_string(),
            format_timestamp(i.created_at),
        ]
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct VpsDisplay(pub VpsView);

impl TableDisplay for VpsDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Owner", "Status", "IP", "Image", "Uptime", "Container"]
    }

    fn row(&self) -> Vec<String> {
        let v = &self.0;
        vec![
            v.vps.id.clone(),
            v.vps.name.clone(),
            v.owner_username
                .clone()
                .unwrap_or_else(|| v.vps.owner_id.clone()),
            status_badge(v.vps.status).to_string(),
            v.vps.ip_address.clone(),
            v.vps.image.clone(),
            v.uptime_seconds
                .map(format_uptime)
                .unwrap_or_else(|| "-".to_string()),
            v.vps.container_id.clone(),
        ]
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct LifecycleDisplay(pub LifecycleResult);

impl TableDisplay for LifecycleDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["VPS", "Status", "IP", "Container", "Uptime", "CPU", "Memory", "Disk"]
    }

    fn row(&self) -> Vec<String> {
        let r = &self.0;
        let usage = r.resource_usage.as_ref();
        vec![
            r.vps_id.clone(),
            if r.destroyed {
                "destroyed".to_string()
            } else {
                status_badge(r.status).to_string()
            },
            r.ip_address.clone(),
            r.container_id.clone(),
            r.uptime_seconds
                .map(format_uptime)
                .unwrap_or_else(|| "-".to_string()),
            usage.map_or("-".to_string(), |u| format!("{}%", u.cpu)),
            usage.map_or("-".to_string(), |u| format!("{}MB", u.memory)),
            usage.map_or("-".to_string(), |u| format!("{}MB", u.disk)),
        ]
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct ActivityDisplay(pub ActivityEntry);

impl TableDisplay for ActivityDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Time", "VPS", "Action", "Outcome", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        let e = &self.0;
        vec![
            format_timestamp(e.created_at),
            e.vps_id.clone(),
            e.action.to_string(),
            outcome_badge(e.outcome).to_string(),
            summarize_detail(&e.detail),
        ]
    }
}

/// One-line rendering of an activity detail object
pub fn summarize_detail(detail: &serde_json::Value) -> String {
    match detail {
        serde_json::Value::Object(map) if !map.is_empty() => map
            .iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect::<Vec<_>>()
            .join(" "),
        serde_json::Value::Object(_) | serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct UserSummaryDisplay(pub UserSummary);

impl TableDisplay for UserSummaryDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Username", "Role", "Active", "VPS"]
    }

    fn row(&self) -> Vec<String> {
        let u = &self.0;
        vec![
            u.identity.id.clone(),
            u.identity.username.clone(),
            u.identity.role.to_string(),
            if u.identity.active { "yes" } else { "no" }.to_string(),
            u.vps_status
                .map(|s| status_badge(s).to_string())
                .unwrap_or_else(|| "none".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summarize_detail() {
        assert_eq!(
            summarize_detail(&json!({"command": "ls", "exit_code": 0})),
            "command=ls exit_code=0"
        );
        assert_eq!(summarize_detail(&json!({})), "");
        assert_eq!(summarize_detail(&json!(null)), "");
    }
}
