//! Shared daemon state handed to every request handler

use std::sync::Arc;
use tracing::info;
use vpspanel_common::{Database, Error, Identity, MemoryStore, Result, Store};

use crate::activity::ActivityLog;
use crate::auth::rbac::USERS_MANAGE;
use crate::auth::{AuthService, Guard};
use crate::config::{Backend, PanelConfig};
use crate::dashboard::Dashboards;
use crate::registry::Registry;

/// Every service of the panel, wired to one store and one guard
#[derive(Clone)]
pub struct PanelState {
    pub config: Arc<PanelConfig>,
    pub store: Arc<dyn Store>,
    pub guard: Guard,
    pub activity: ActivityLog,
    pub registry: Registry,
    pub auth: AuthService,
    pub dashboards: Dashboards,
}

impl PanelState {
    /// Open the configured backend and seed accounts
    pub async fn new(config: PanelConfig) -> Result<Self> {
        let store: Arc<dyn Store> = match config.backend {
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::Sqlite => {
                let path = config.db_path();
                info!("Opening state database at {}", path.display());
                Arc::new(Database::open(path)?)
            }
        };
        let state = Self::with_store(config, store);
        state.initialize().await?;
        Ok(state)
    }

    /// Wire services around an existing store without seeding
    pub fn with_store(config: PanelConfig, store: Arc<dyn Store>) -> Self {
        let guard = Guard::default();
        let activity = ActivityLog::new(store.clone(), guard.clone());
        let registry = Registry::new(
            store.clone(),
            guard.clone(),
            activity.clone(),
            config.lifecycle.clone(),
            config.terminal.clone(),
        );
        let auth = AuthService::new(store.clone(), guard.clone(), config.auth.clone());
        let dashboards = Dashboards::new(
            guard.clone(),
            registry.clone(),
            activity.clone(),
            auth.clone(),
        );

        Self {
            config: Arc::new(config),
            store,
            guard,
            activity,
            registry,
            auth,
            dashboards,
        }
    }

    /// Seed accounts and pick up transitions interrupted by a restart
    pub async fn initialize(&self) -> Result<()> {
        let seeded = self.auth.seed().await?;
        if seeded > 0 {
            info!("Seeded {} accounts", seeded);
        }
        self.registry.resume_transitions()?;
        Ok(())
    }

    /// Remove an account, destroying its VPS first
    pub fn delete_user(&self, caller: &Identity, id: &str) -> Result<()> {
        self.guard.require(caller, USERS_MANAGE)?;
        if caller.id == id {
            return Err(Error::Validation("cannot delete yourself".to_string()));
        }
        let target = self.auth.get_identity(id)?;

        let destroyed = self.registry.destroy_owned_by(caller, id)?;
        self.auth.remove_user(id)?;

        info!(
            "Deleted account {} ({}) and {} VPS records",
            target.username, target.id, destroyed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpspanel_common::api::DeployRequest;
    use vpspanel_common::ErrorKind;

    #[tokio::test(start_paused = true)]
    async fn test_seeds_admin() {
        let state = PanelState::new(PanelConfig::for_tests()).await.unwrap();
        let session = state.auth.sign_in("admin", "admin").await.unwrap();
        assert!(session.identity.is_admin());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_user_destroys_vps() {
        let state = PanelState::new(PanelConfig::for_tests()).await.unwrap();
        let admin = state.auth.sign_in("admin", "admin").await.unwrap().identity;
        let alice = state.auth.sign_up("alice", "secret", None).await.unwrap();
        let vps = state.registry.deploy(&alice, DeployRequest::default()).unwrap();

        assert_eq!(
            state.delete_user(&alice, &admin.id).unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            state.delete_user(&admin, &admin.id).unwrap_err().kind(),
            ErrorKind::ValidationError
        );

        state.delete_user(&admin, &alice.id).unwrap();
        assert!(state.store.get_vps(&vps.id).unwrap().is_none());
        assert!(state.store.get_user(&alice.id).unwrap().is_none());
        assert!(!state.registry.scheduler().is_pending(&vps.id));
        assert_eq!(
            state.delete_user(&admin, &alice.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_sqlite_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PanelConfig::for_tests();
        config.backend = Backend::Sqlite;
        config.store_path = dir.path().to_path_buf();

        let state = PanelState::new(config.clone()).await.unwrap();
        state.auth.sign_up("alice", "secret", None).await.unwrap();
        drop(state);

        let reopened = PanelState::new(config).await.unwrap();
        reopened.auth.sign_in("alice", "secret").await.unwrap();
    }
}
