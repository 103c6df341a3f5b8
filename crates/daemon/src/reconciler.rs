//! Housekeeping loop
//!
//! Periodically drops expired sessions and reschedules transient records
//! that lost their pending job.

use std::time::Duration;
use tracing::{debug, error, info};

use crate::state::PanelState;

pub struct Reconciler {
    state: PanelState,
    interval: Duration,
}

impl Reconciler {
    pub fn new(state: PanelState) -> Self {
        let interval = Duration::from_secs(state.config.auth.session_sweep_secs.max(1));
        Self { state, interval }
    }

    /// Run until the task is dropped
    pub async fn run(&self) {
        info!("Reconciler started (every {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;
            if let Err(e) = self.reconcile_once() {
                error!("Reconciliation error: {}", e);
            }
        }
    }

    pub fn reconcile_once(&self) -> vpspanel_common::Result<()> {
        let purged = self.state.auth.purge_expired_sessions()?;
        if purged > 0 {
            debug!("Purged {} expired sessions", purged);
        }
        self.state.registry.resume_transitions()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use vpspanel_common::{now_epoch_secs, Session, Store};

    #[tokio::test]
    async fn test_purges_expired_sessions() {
        let state = PanelState::new(PanelConfig::for_tests()).await.unwrap();
        let admin = state.auth.sign_in("admin", "admin").await.unwrap();

        let now = now_epoch_secs();
        state
            .store
            .insert_session(&Session {
                token_hash: "stale".to_string(),
                identity_id: admin.identity.id.clone(),
                created_at: now - 100,
                expires_at: now - 10,
                last_seen_at: now - 100,
            })
            .unwrap();

        Reconciler::new(state.clone()).reconcile_once().unwrap();
        assert!(state.store.get_session("stale").unwrap().is_none());
        // The live session survives
        state.auth.authenticate(&admin.token).unwrap();
    }
}
