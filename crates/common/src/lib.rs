//! VPS Panel Common Library
//!
//! Shared types, errors and the storage backends used by the daemon.

pub mod api;
pub mod db;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use db::Database;
pub use error::{Error, ErrorKind, Result};
pub use memory::MemoryStore;
pub use store::Store;
pub use types::*;

/// Panel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".vpspanel")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_store_path().join("config.toml")
}

/// Default database path
pub fn default_db_path() -> std::path::PathBuf {
    default_store_path().join("state.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_share_store_dir() {
        let store = default_store_path();
        assert!(store.ends_with(".vpspanel"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(store, home.join(".vpspanel"));
        }
        assert_eq!(default_config_path(), store.join("config.toml"));
        assert_eq!(default_db_path(), store.join("state.db"));
    }
}
