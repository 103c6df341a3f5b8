//! VPS Panel daemon
//!
//! Lifecycle engine, fake terminal, accounts and the HTTP API that fronts
//! them.

pub mod activity;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod functions;
pub mod reconciler;
pub mod registry;
pub mod response;
pub mod scheduler;
pub mod server;
pub mod simulator;
pub mod state;

pub use config::PanelConfig;
pub use state::PanelState;
