//! The two remote operations: `docker-manager` and `terminal-exec`.

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use tracing::debug;
use vpspanel_common::api::{
    DockerManagerRequest, ExecResult, LifecycleResult, TerminalExecRequest,
};
use vpspanel_common::{now_epoch_secs, Error, Identity, Result};

use crate::auth::AuthenticatedIdentity;
use crate::response::{ok, ApiError, ApiResult};
use crate::state::PanelState;

/// Lifecycle actions accepted by `docker-manager`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Deploy,
    Start,
    Stop,
    Restart,
    Destroy,
    Status,
}

impl std::str::FromStr for LifecycleAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deploy" => Ok(Self::Deploy),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            "destroy" => Ok(Self::Destroy),
            "status" => Ok(Self::Status),
            other => Err(Error::InvalidAction(other.to_string())),
        }
    }
}

/// Malformed bodies are reported as validation errors in the usual envelope
pub(crate) fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| Error::Validation(e.body_text()))
}

fn vps_id(req: &DockerManagerRequest) -> Result<&str> {
    req.vps_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Validation("vps_id is required".to_string()))
}

/// Dispatch one `docker-manager` request for `caller`
pub fn docker_manager(
    state: &PanelState,
    caller: &Identity,
    req: DockerManagerRequest,
) -> Result<LifecycleResult> {
    let action: LifecycleAction = req.action.trim().parse()?;
    debug!("docker-manager {:?} from {}", action, caller.username);

    let registry = &state.registry;
    let result = match action {
        LifecycleAction::Deploy => {
            let vps = registry.deploy(caller, req.config.unwrap_or_default())?;
            LifecycleResult::from_vps(&vps, now_epoch_secs())
        }
        LifecycleAction::Start => {
            LifecycleResult::from_vps(&registry.start(caller, vps_id(&req)?)?, now_epoch_secs())
        }
        LifecycleAction::Stop => {
            LifecycleResult::from_vps(&registry.stop(caller, vps_id(&req)?)?, now_epoch_secs())
        }
        LifecycleAction::Restart => {
            LifecycleResult::from_vps(&registry.restart(caller, vps_id(&req)?)?, now_epoch_secs())
        }
        LifecycleAction::Destroy => {
            let vps = registry.destroy(caller, vps_id(&req)?)?;
            let mut result = LifecycleResult::from_vps(&vps, now_epoch_secs());
            result.destroyed = true;
            result
        }
        LifecycleAction::Status => {
            let (vps, usage) = registry.status(caller, vps_id(&req)?)?;
            let mut result = LifecycleResult::from_vps(&vps, now_epoch_secs());
            result.resource_usage = Some(usage);
            result
        }
    };
    Ok(result)
}

pub async fn docker_manager_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
    payload: std::result::Result<Json<DockerManagerRequest>, JsonRejection>,
) -> ApiResult<LifecycleResult> {
    let req = body(payload)?;
    ok(docker_manager(&state, &caller, req).map_err(ApiError)?)
}

pub async fn terminal_exec_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
    payload: std::result::Result<Json<TerminalExecRequest>, JsonRejection>,
) -> ApiResult<ExecResult> {
    let req = body(payload)?;
    let result = state.registry.exec(
        &caller,
        &req.vps_id,
        &req.command,
        req.working_directory.as_deref(),
    )?;
    ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use std::time::Duration;
    use vpspanel_common::{ErrorKind, VpsStatus};

    fn request(action: &str, vps_id: Option<&str>) -> DockerManagerRequest {
        DockerManagerRequest {
            action: action.to_string(),
            vps_id: vps_id.map(str::to_string),
            config: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch() {
        let state = PanelState::new(PanelConfig::for_tests()).await.unwrap();
        let alice = state.auth.sign_up("alice", "secret", None).await.unwrap();

        let err = docker_manager(&state, &alice, request("reboot", None)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAction);
        let err = docker_manager(&state, &alice, request("start", None)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let deployed = docker_manager(&state, &alice, request("deploy", None)).unwrap();
        assert_eq!(deployed.status, VpsStatus::Deploying);
        assert!(deployed.timestamps.deployed_at.is_some());
        tokio::time::sleep(Duration::from_millis(3100)).await;

        let status =
            docker_manager(&state, &alice, request("status", Some(&deployed.vps_id))).unwrap();
        assert_eq!(status.status, VpsStatus::Running);
        assert!(status.resource_usage.is_some());

        let destroyed =
            docker_manager(&state, &alice, request("destroy", Some(&deployed.vps_id))).unwrap();
        assert!(destroyed.destroyed);
        let err =
            docker_manager(&state, &alice, request("status", Some(&deployed.vps_id))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
