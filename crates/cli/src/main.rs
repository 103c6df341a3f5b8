//! VPS Panel CLI - Main Entry Point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vpspanel_cli::client::PanelClient;
use vpspanel_cli::commands::{admin, auth, dashboard, logs, terminal, vps};
use vpspanel_cli::output::{self, print_error};
use vpspanel_cli::session::{default_session_path, SavedSession};

/// VPS Panel CLI - manage simulated virtual private servers
#[derive(Parser)]
#[command(name = "vpspanel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Panel daemon URL
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "VPSPANEL_SERVER", global = true)]
    server: String,

    /// Saved session file
    #[arg(long, env = "VPSPANEL_SESSION", global = true)]
    session: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, sign out and manage your profile
    #[command(subcommand)]
    Auth(auth::AuthCommands),

    /// Manage your VPS
    #[command(subcommand)]
    Vps(vps::VpsCommands),

    /// Run one command on a VPS
    Exec(terminal::ExecArgs),

    /// Open an interactive terminal on a VPS
    Terminal(terminal::TerminalArgs),

    /// Show the activity log
    Logs(logs::LogsArgs),

    /// Show your dashboard
    Dashboard,

    /// User management
    #[command(subcommand)]
    Admin(admin::AdminCommands),

    /// Check daemon status
    Status,

    /// Show version information
    Version,
}

async fn run(cli: Cli) -> Result<()> {
    let session_path = cli.session.clone().unwrap_or_else(default_session_path);
    let now = vpspanel_common::now_epoch_secs();
    let token = SavedSession::load(&session_path)?
        .and_then(|s| s.token_for(&cli.server, now).map(str::to_string));

    let client = PanelClient::new(&cli.server, token)?;

    match cli.command {
        Commands::Auth(cmd) => auth::execute(cmd, client, &session_path, cli.format).await?,
        Commands::Vps(cmd) => vps::execute(cmd, client, cli.format).await?,
        Commands::Exec(args) => terminal::exec(args, client, cli.format).await?,
        Commands::Terminal(args) => terminal::interactive(args, client).await?,
        Commands::Logs(args) => logs::execute(args, client, cli.format).await?,
        Commands::Dashboard => dashboard::execute(client, cli.format).await?,
        Commands::Admin(cmd) => admin::execute(cmd, client, cli.format).await?,
        Commands::Status => match client.health().await {
            Ok(health) => {
                println!(
                    "✅ {} v{} is {} at {}",
                    health.service,
                    health.version,
                    health.status,
                    client.base_url()
                );
            }
            Err(e) => {
                println!("❌ Cannot reach daemon at {}: {}", client.base_url(), e);
                std::process::exit(1);
            }
        },
        Commands::Version => {
            println!("VPS Panel CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Control panel for simulated virtual private servers");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
