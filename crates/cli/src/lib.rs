//! VPS Panel CLI
//!
//! Command-line client for the panel daemon: sign-in, VPS lifecycle,
//! the fake terminal, activity and dashboards.

pub mod client;
pub mod commands;
pub mod output;
pub mod session;
pub mod views;
