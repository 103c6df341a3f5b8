//! VPS registry and lifecycle engine.
//!
//! States: `pending -> deploying -> running <-> stopped`, with `restart`
//! detouring through `pending`, and `destroy` removing the record from any
//! state. Transient statuses resolve through the [`TransitionScheduler`];
//! a scheduled completion only applies if the record still exists with the
//! generation it was scheduled for.

use parking_lot::Mutex;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use vpspanel_common::api::{DeployRequest, ExecResult};
use vpspanel_common::{
    now_epoch_secs, ActivityAction, ActivityOutcome, Error, Identity, ResourceUsage, Result, Role,
    Store, Vps, VpsStatus,
};

use crate::activity::ActivityLog;
use crate::auth::rbac::{
    USERS_MANAGE, VPS_DEPLOY, VPS_DESTROY, VPS_EXEC, VPS_LIST_ALL, VPS_READ, VPS_RESTART,
    VPS_START, VPS_STOP,
};
use crate::auth::Guard;
use crate::config::{LifecycleConfig, TerminalConfig};
use crate::scheduler::TransitionScheduler;
use crate::simulator::CommandSimulator;

const NAME_MAX: usize = 64;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn container_id(rng: &mut impl Rng) -> String {
    let suffix: String = (0..16)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("vps_{}", suffix)
}

fn ip_address(rng: &mut impl Rng) -> String {
    format!(
        "172.{}.{}.{}",
        rng.gen_range(0..=254),
        rng.gen_range(0..=254),
        rng.gen_range(1..=254)
    )
}

fn validate(req: &DeployRequest, name: &str, image: &str) -> Result<()> {
    if name.is_empty() || name.chars().count() > NAME_MAX {
        return Err(Error::Validation(format!(
            "name must be 1 to {} characters",
            NAME_MAX
        )));
    }
    if image.is_empty() || image.chars().any(char::is_whitespace) {
        return Err(Error::Validation("image must be a non-empty reference".to_string()));
    }
    if req.ports.contains(&0) {
        return Err(Error::Validation("port 0 is not allowed".to_string()));
    }
    if req.environment.keys().any(|k| k.trim().is_empty()) {
        return Err(Error::Validation("environment keys must not be empty".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn Store>,
    guard: Guard,
    activity: ActivityLog,
    scheduler: TransitionScheduler,
    simulator: CommandSimulator,
    lifecycle: LifecycleConfig,
    terminal: TerminalConfig,
    /// Serializes read-modify-write of records
    gate: Arc<Mutex<()>>,
}

impl Registry {
    pub fn new(
        store: Arc<dyn Store>,
        guard: Guard,
        activity: ActivityLog,
        lifecycle: LifecycleConfig,
        terminal: TerminalConfig,
    ) -> Self {
        Self {
            store,
            guard,
            activity,
            scheduler: TransitionScheduler::new(),
            simulator: CommandSimulator::new(),
            lifecycle,
            terminal,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn scheduler(&self) -> &TransitionScheduler {
        &self.scheduler
    }

    fn load(&self, id: &str) -> Result<Vps> {
        self.store
            .get_vps(id)?
            .ok_or_else(|| Error::not_found("vps", id))
    }

    /// Create the caller's VPS (or, for admins, one on behalf of `owner_id`)
    /// in `deploying` and schedule its move to `running`.
    pub fn deploy(&self, caller: &Identity, req: DeployRequest) -> Result<Vps> {
        self.guard.require(caller, VPS_DEPLOY)?;

        let owner = match req.owner_id.as_deref() {
            Some(owner_id) if owner_id != caller.id => {
                self.guard.require(caller, USERS_MANAGE)?;
                self.store
                    .get_user(owner_id)?
                    .map(|r| r.identity)
                    .ok_or_else(|| Error::not_found("user", owner_id))?
            }
            _ => caller.clone(),
        };

        let name = req
            .name
            .as_deref()
            .map(str::trim)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-vps", owner.username));
        let image = req
            .image
            .as_deref()
            .map(str::trim)
            .unwrap_or(&self.lifecycle.default_image)
            .to_string();
        validate(&req, &name, &image)?;

        let mut rng = rand::thread_rng();
        let mut vps = Vps::new(owner.id.clone(), name);
        vps.status = VpsStatus::Deploying;
        vps.container_id = container_id(&mut rng);
        vps.ip_address = ip_address(&mut rng);
        vps.image = image;
        vps.resources = req.resources.clone().unwrap_or_default();
        vps.ports = req.ports.clone();
        vps.environment = req.environment.clone();
        vps.deployed_at = Some(vps.created_at);

        {
            let _gate = self.gate.lock();
            self.store.insert_vps(&vps, owner.role != Role::Admin)?;
            self.schedule_completion(&vps, VpsStatus::Deploying, self.lifecycle.deploy_delay_ms);
        }

        self.activity.record(
            &vps.id,
            ActivityAction::Deploy,
            ActivityOutcome::Success,
            json!({
                "name": vps.name,
                "image": vps.image,
                "container_id": vps.container_id,
                "ip_address": vps.ip_address,
                "owner_id": vps.owner_id,
            }),
            Some(caller),
        )?;

        info!(
            "Deploying VPS {} ({}) for {} as {}",
            vps.name, vps.id, owner.username, vps.container_id
        );
        Ok(vps)
    }

    fn schedule_completion(&self, vps: &Vps, from: VpsStatus, delay_ms: u64) {
        let registry = self.clone();
        let id = vps.id.clone();
        let generation = vps.generation;
        self.scheduler
            .schedule(&vps.id, Duration::from_millis(delay_ms), move || {
                if let Err(e) = registry.complete_transition(&id, generation, from) {
                    error!("Scheduled transition for VPS {} failed: {}", id, e);
                }
            });
    }

    /// Reschedule completions for transient records that have no pending
    /// job, such as those left behind by a previous run of the daemon.
    pub fn resume_transitions(&self) -> Result<usize> {
        let _gate = self.gate.lock();
        let mut resumed = 0;
        for vps in self.store.list_vps()? {
            if !vps.status.is_transient() || self.scheduler.is_pending(&vps.id) {
                continue;
            }
            let delay_ms = match vps.status {
                VpsStatus::Deploying => self.lifecycle.deploy_delay_ms,
                _ => self.lifecycle.restart_delay_ms,
            };
            self.schedule_completion(&vps, vps.status, delay_ms);
            resumed += 1;
        }
        if resumed > 0 {
            info!("Resumed {} interrupted transitions", resumed);
        }
        Ok(resumed)
    }

    /// Apply a scheduled `from -> running` move. Returns false when the
    /// record is gone or has moved on since scheduling.
    pub(crate) fn complete_transition(&self, id: &str, generation: i64, from: VpsStatus) -> Result<bool> {
        let _gate = self.gate.lock();

        let Some(mut vps) = self.store.get_vps(id)? else {
            debug!("Discarding transition for destroyed VPS {}", id);
            return Ok(false);
        };
        if vps.generation != generation || vps.status != from {
            debug!(
                "Discarding stale transition for VPS {} (generation {} vs {}, status {})",
                id, generation, vps.generation, vps.status
            );
            return Ok(false);
        }

        vps.set_status(VpsStatus::Running);
        self.store.update_vps(&vps)?;
        info!("VPS {} is running", id);
        Ok(true)
    }

    pub fn start(&self, caller: &Identity, id: &str) -> Result<Vps> {
        self.transition(caller, id, ActivityAction::Start)
    }

    pub fn stop(&self, caller: &Identity, id: &str) -> Result<Vps> {
        self.transition(caller, id, ActivityAction::Stop)
    }

    pub fn restart(&self, caller: &Identity, id: &str) -> Result<Vps> {
        self.transition(caller, id, ActivityAction::Restart)
    }

    fn transition(&self, caller: &Identity, id: &str, action: ActivityAction) -> Result<Vps> {
        let (permission, requested) = match action {
            ActivityAction::Start => (VPS_START, VpsStatus::Running),
            ActivityAction::Stop => (VPS_STOP, VpsStatus::Stopped),
            ActivityAction::Restart => (VPS_RESTART, VpsStatus::Pending),
            other => return Err(Error::InvalidAction(other.to_string())),
        };

        let _gate = self.gate.lock();
        let mut vps = self.load(id)?;
        self.guard.authorize(caller, permission, Some(&vps))?;

        let from = vps.status;
        let allowed = matches!(
            (action, from),
            (ActivityAction::Start, VpsStatus::Stopped)
                | (ActivityAction::Stop, VpsStatus::Running)
                | (ActivityAction::Restart, VpsStatus::Running | VpsStatus::Stopped)
        );
        if !allowed {
            self.activity.record(
                &vps.id,
                action,
                ActivityOutcome::Error,
                json!({ "status": from, "requested": requested, "error": "invalid transition" }),
                Some(caller),
            )?;
            return Err(Error::InvalidTransition {
                from: from.to_string(),
                to: requested.to_string(),
            });
        }

        vps.set_status(requested);
        self.store.update_vps(&vps)?;

        if action == ActivityAction::Restart {
            self.schedule_completion(&vps, VpsStatus::Pending, self.lifecycle.restart_delay_ms);
        } else {
            self.scheduler.cancel(&vps.id);
        }

        self.activity.record(
            &vps.id,
            action,
            ActivityOutcome::Success,
            json!({ "from": from, "to": requested }),
            Some(caller),
        )?;

        info!("VPS {} {}: {} -> {}", vps.id, action, from, requested);
        Ok(vps)
    }

    /// Remove the record from any state, cancelling any pending transition.
    pub fn destroy(&self, caller: &Identity, id: &str) -> Result<Vps> {
        let _gate = self.gate.lock();
        let vps = self.load(id)?;
        self.guard.authorize(caller, VPS_DESTROY, Some(&vps))?;

        self.scheduler.cancel(&vps.id);
        self.store.delete_vps(&vps.id)?;

        self.activity.record(
            &vps.id,
            ActivityAction::Destroy,
            ActivityOutcome::Success,
            json!({
                "name": vps.name,
                "container_id": vps.container_id,
                "status": vps.status,
            }),
            Some(caller),
        )?;

        info!("Destroyed VPS {} ({})", vps.name, vps.id);
        Ok(vps)
    }

    /// Destroy every record owned by `owner_id`, logging each one.
    pub fn destroy_owned_by(&self, caller: &Identity, owner_id: &str) -> Result<usize> {
        let owned = self.store.list_vps_by_owner(owner_id)?;
        for vps in &owned {
            self.destroy(caller, &vps.id)?;
        }
        Ok(owned.len())
    }

    pub fn get(&self, caller: &Identity, id: &str) -> Result<Vps> {
        let vps = self.load(id)?;
        self.guard.authorize(caller, VPS_READ, Some(&vps))?;
        Ok(vps)
    }

    /// Read-only status with a simulated resource usage sample
    pub fn status(&self, caller: &Identity, id: &str) -> Result<(Vps, ResourceUsage)> {
        let vps = self.get(caller, id)?;
        let mut rng = rand::thread_rng();
        let usage = ResourceUsage {
            cpu: rng.gen_range(0..100),
            memory: rng.gen_range(0..2048),
            disk: rng.gen_range(0..20480),
        };
        Ok((vps, usage))
    }

    /// Every record for callers allowed to read the registry, otherwise
    /// only the caller's own.
    pub fn list(&self, caller: &Identity) -> Result<Vec<Vps>> {
        self.guard.require(caller, VPS_READ)?;
        if self.guard.allows(caller, VPS_LIST_ALL) {
            self.store.list_vps()
        } else {
            self.store.list_vps_by_owner(&caller.id)
        }
    }

    pub fn list_all(&self, caller: &Identity) -> Result<Vec<Vps>> {
        self.guard.require(caller, VPS_LIST_ALL)?;
        self.store.list_vps()
    }

    /// Run `command` through the fake terminal of a running VPS
    pub fn exec(
        &self,
        caller: &Identity,
        id: &str,
        command: &str,
        working_directory: Option<&str>,
    ) -> Result<ExecResult> {
        let vps = self.load(id)?;
        self.guard.authorize(caller, VPS_EXEC, Some(&vps))?;
        if vps.status != VpsStatus::Running {
            return Err(Error::NotRunning);
        }
        if command.trim().is_empty() {
            return Err(Error::Validation("command is required".to_string()));
        }

        let cwd = working_directory
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.terminal.default_working_directory)
            .to_string();
        let out = self.simulator.execute(&vps.container_id, command, &cwd);

        let outcome = if out.exit_code == 0 {
            ActivityOutcome::Success
        } else {
            ActivityOutcome::Error
        };
        self.activity.record(
            &vps.id,
            ActivityAction::Exec,
            outcome,
            json!({
                "command": command,
                "working_directory": cwd,
                "exit_code": out.exit_code,
                "output_length": out.output.len(),
            }),
            Some(caller),
        )?;

        Ok(ExecResult {
            output: out.output,
            exit_code: out.exit_code,
            executed_at: chrono::Utc::now().to_rfc3339(),
            working_directory: cwd,
        })
    }

    /// Uptime as seen right now
    pub fn uptime_of(vps: &Vps) -> Option<i64> {
        vps.uptime_seconds(now_epoch_secs())
    }
}
