//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vpspanel_common::Role;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Store directory path
    pub store_path: PathBuf,

    /// HTTP listen address
    pub listen: String,

    /// Where state lives
    pub backend: Backend,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Lifecycle timings and defaults
    pub lifecycle: LifecycleConfig,

    /// Fake terminal defaults
    pub terminal: TerminalConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            store_path: vpspanel_common::default_store_path(),
            listen: "127.0.0.1:8080".to_string(),
            backend: Backend::default(),
            auth: AuthConfig::default(),
            lifecycle: LifecycleConfig::default(),
            terminal: TerminalConfig::default(),
        }
    }
}

/// Storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process state, lost on restart
    Memory,
    /// SQLite database under the store path
    #[default]
    Sqlite,
}

/// How sign-in behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Only registered accounts can sign in
    #[default]
    Accounts,
    /// Unknown usernames are provisioned as users on first sign-in
    Demo,
}

/// A user created at startup if missing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl SeedUser {
    fn new(username: &str, password: &str, role: Role) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            role,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,

    /// Session lifetime in seconds
    pub session_ttl_secs: i64,

    /// Interval between expired-session sweeps
    pub session_sweep_secs: u64,

    pub min_password_len: usize,

    /// bcrypt work factor
    pub bcrypt_cost: u32,

    pub seed_users: Vec<SeedUser>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Accounts,
            session_ttl_secs: 60 * 60 * 12,
            session_sweep_secs: 300,
            min_password_len: 4,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            seed_users: vec![SeedUser::new("admin", "admin", Role::Admin)],
        }
    }
}

impl AuthConfig {
    /// Demo-mode defaults: auto-provisioning plus the demo accounts
    pub fn demo() -> Self {
        Self {
            mode: AuthMode::Demo,
            seed_users: vec![
                SeedUser::new("admin", "admin", Role::Admin),
                SeedUser::new("john_doe", "password", Role::User),
                SeedUser::new("jane_smith", "password", Role::User),
                SeedUser::new("bob_wilson", "password", Role::User),
            ],
            ..Self::default()
        }
    }
}

/// Lifecycle timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Delay before a deploying VPS becomes running
    pub deploy_delay_ms: u64,

    /// Delay before a restarting VPS becomes running
    pub restart_delay_ms: u64,

    pub default_image: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            deploy_delay_ms: 3000,
            restart_delay_ms: 2000,
            default_image: "ubuntu:22.04".to_string(),
        }
    }
}

/// Fake terminal defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub default_working_directory: String,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            default_working_directory: "/root".to_string(),
        }
    }
}

impl PanelConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the database path
    pub fn db_path(&self) -> PathBuf {
        self.store_path.join("state.db")
    }

    /// Switch to demo mode. Demo data lives in memory unless a backend
    /// was chosen explicitly.
    pub fn enable_demo(&mut self, backend: Option<Backend>) {
        let demo = AuthConfig::demo();
        self.auth.mode = demo.mode;
        self.auth.seed_users = demo.seed_users;
        self.backend = backend.unwrap_or(Backend::Memory);
    }

    /// Configuration suited to tests: in-memory store, cheap hashing
    pub fn for_tests() -> Self {
        Self {
            backend: Backend::Memory,
            auth: AuthConfig {
                bcrypt_cost: 4,
                ..AuthConfig::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: PanelConfig = toml::from_str(
            r#"
            listen = "0.0.0.0:9000"
            backend = "memory"

            [lifecycle]
            deploy_delay_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.lifecycle.deploy_delay_ms, 10);
        assert_eq!(config.lifecycle.restart_delay_ms, 2000);
        assert_eq!(config.terminal.default_working_directory, "/root");
        assert_eq!(config.auth.seed_users[0].username, "admin");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = PanelConfig::default();
        config.auth = AuthConfig::demo();
        config.save(&path).unwrap();

        let loaded = PanelConfig::load(&path).unwrap();
        assert_eq!(loaded.auth.mode, AuthMode::Demo);
        assert_eq!(loaded.auth.seed_users.len(), 4);
    }

    #[test]
    fn test_demo_defaults_to_memory_backend() {
        let mut config = PanelConfig::default();
        assert_eq!(config.backend, Backend::Sqlite);
        config.enable_demo(None);
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.auth.mode, AuthMode::Demo);
        assert!(config.auth.seed_users.iter().any(|u| u.username == "john_doe"));

        let mut config = PanelConfig::default();
        config.enable_demo(Some(Backend::Sqlite));
        assert_eq!(config.backend, Backend::Sqlite);
    }

    #[test]
    fn test_missing_file_is_default() {
        let loaded = PanelConfig::load(Path::new("/nonexistent/vpspanel.toml")).unwrap();
        assert_eq!(loaded.listen, "127.0.0.1:8080");
    }
}
