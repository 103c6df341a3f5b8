//! VPS lifecycle commands

use anyhow::{bail, Result};
use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::time::Duration;
use vpspanel_common::api::{DeployRequest, LifecycleResult};
use vpspanel_common::{ResourceSpec, VpsStatus};

use super::resolve_vps_id;
use crate::client::PanelClient;
use crate::output::{print_item, print_list, print_success, print_warning, OutputFormat};
use crate::views::{LifecycleDisplay, VpsDisplay};

#[derive(Subcommand)]
pub enum VpsCommands {
    /// List VPS records you can see
    List,

    /// Get VPS details
    Get {
        /// VPS ID (defaults to your own)
        id: Option<String>,
    },

    /// Deploy a new VPS
    Deploy {
        /// VPS name (defaults to `<username>-vps`)
        #[arg(short, long)]
        name: Option<String>,

        /// Image reference
        #[arg(short, long)]
        image: Option<String>,

        /// CPU allocation label
        #[arg(long, default_value = "2 cores")]
        cpu: String,

        /// Memory allocation label
        #[arg(long, default_value = "2GB")]
        ram: String,

        /// Disk allocation label
        #[arg(long, default_value = "20GB SSD")]
        disk: String,

        /// Exposed port (repeatable)
        #[arg(short, long = "port")]
        ports: Vec<u16>,

        /// Environment variable as KEY=VALUE (repeatable)
        #[arg(short, long = "env", value_parser = parse_env)]
        env: Vec<(String, String)>,

        /// Deploy on behalf of another user (admins only)
        #[arg(long)]
        owner: Option<String>,

        /// Wait until the VPS is running
        #[arg(short, long)]
        wait: bool,
    },

    /// Start a stopped VPS
    Start { id: Option<String> },

    /// Stop a running VPS
    Stop { id: Option<String> },

    /// Restart a VPS
    Restart {
        id: Option<String>,

        /// Wait until the VPS is running again
        #[arg(short, long)]
        wait: bool,
    },

    /// Destroy a VPS
    Destroy {
        id: Option<String>,

        /// Required; destruction cannot be undone
        #[arg(short, long)]
        yes: bool,
    },

    /// Show status and simulated resource usage
    Status { id: Option<String> },
}

fn parse_env(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Poll `status` until the VPS leaves its transient state
async fn wait_until_settled(client: &PanelClient, vps_id: &str) -> Result<LifecycleResult> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = loop {
        let status = client.docker_manager("status", Some(vps_id), None).await?;
        if !status.status.is_transient() {
            break status;
        }
        spinner.set_message(format!("{} is {}...", vps_id, status.status));
        tokio::time::sleep(Duration::from_millis(500)).await;
    };

    spinner.finish_and_clear();
    Ok(result)
}

pub async fn execute(cmd: VpsCommands, client: PanelClient, format: OutputFormat) -> Result<()> {
    match cmd {
        VpsCommands::List => {
            let rows: Vec<VpsDisplay> = client.list_vps().await?.into_iter().map(VpsDisplay).collect();
            print_list(&rows, format);
        }

        VpsCommands::Get { id } => {
            let id = resolve_vps_id(&client, id).await?;
            print_item(&VpsDisplay(client.get_vps(&id).await?), format);
        }

        VpsCommands::Deploy {
            name,
            image,
            cpu,
            ram,
            disk,
            ports,
            env,
            owner,
            wait,
        } => {
            let config = DeployRequest {
                name,
                image,
                resources: Some(ResourceSpec { cpu, ram, disk }),
                ports,
                environment: env.into_iter().collect::<BTreeMap<_, _>>(),
                owner_id: owner,
            };
            let mut result = client.docker_manager("deploy", None, Some(config)).await?;
            print_success(&format!(
                "Deploying {} as {} at {}",
                result.vps_id, result.container_id, result.ip_address
            ));
            if wait {
                result = wait_until_settled(&client, &result.vps_id).await?;
                print_success(&format!("{} is {}", result.vps_id, result.status));
            }
            print_item(&LifecycleDisplay(result), format);
        }

        VpsCommands::Start { id } => {
            let id = resolve_vps_id(&client, id).await?;
            let result = client.docker_manager("start", Some(&id), None).await?;
            print_success(&format!("VPS {} started", id));
            print_item(&LifecycleDisplay(result), format);
        }

        VpsCommands::Stop { id } => {
            let id = resolve_vps_id(&client, id).await?;
            let result = client.docker_manager("stop", Some(&id), None).await?;
            print_success(&format!("VPS {} stopped", id));
            print_item(&LifecycleDisplay(result), format);
        }

        VpsCommands::Restart { id, wait } => {
            let id = resolve_vps_id(&client, id).await?;
            let mut result = client.docker_manager("restart", Some(&id), None).await?;
            print_success(&format!("VPS {} restarting", id));
            if wait {
                result = wait_until_settled(&client, &id).await?;
            }
            print_item(&LifecycleDisplay(result), format);
        }

        VpsCommands::Destroy { id, yes } => {
            let id = resolve_vps_id(&client, id).await?;
            if !yes {
                print_warning(&format!("This permanently removes VPS {}", id));
                bail!("re-run with --yes to confirm");
            }
            client.docker_manager("destroy", Some(&id), None).await?;
            print_success(&format!("VPS {} destroyed", id));
        }

        VpsCommands::Status { id } => {
            let id = resolve_vps_id(&client, id).await?;
            let result = client.docker_manager("status", Some(&id), None).await?;
            if result.status == VpsStatus::Error {
                print_warning("The VPS reported an error state");
            }
            print_item(&LifecycleDisplay(result), format);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env() {
        assert_eq!(parse_env("A=1").unwrap(), ("A".to_string(), "1".to_string()));
        assert_eq!(parse_env("URL=a=b").unwrap(), ("URL".to_string(), "a=b".to_string()));
        assert!(parse_env("novalue").is_err());
        assert!(parse_env("=1").is_err());
    }
}
