//! Saved sign-in between CLI invocations

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stored next to the daemon's default state
pub fn default_session_path() -> PathBuf {
    vpspanel_common::default_store_path().join("session.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    pub server: String,
    pub token: String,
    pub username: String,
    pub expires_at: i64,
}

impl SavedSession {
    /// A missing file means "not signed in"
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn clear(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Only reuse a token against the server it was issued by
    pub fn token_for(&self, server: &str, now: i64) -> Option<&str> {
        (self.server.trim_end_matches('/') == server.trim_end_matches('/') && self.expires_at > now)
            .then_some(self.token.as_str())
    }
}
