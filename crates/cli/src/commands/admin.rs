//! User management (admin only)

use anyhow::{bail, Result};
use clap::Subcommand;
use vpspanel_common::Role;

use crate::client::PanelClient;
use crate::output::{print_item, print_list, print_success, OutputFormat};
use crate::views::IdentityDisplay;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// List accounts
    Users,

    /// Create an account
    CreateUser {
        username: String,

        #[arg(short, long, env = "VPSPANEL_PASSWORD")]
        password: String,

        /// admin or user
        #[arg(short, long, default_value = "user", value_parser = parse_role)]
        role: Role,
    },

    /// Delete an account and destroy its VPS
    DeleteUser {
        id: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// Re-enable an account
    Activate { id: String },

    /// Disable an account and end its sessions
    Deactivate { id: String },
}

fn parse_role(raw: &str) -> std::result::Result<Role, String> {
    raw.parse().map_err(|e: vpspanel_common::Error| e.to_string())
}

pub async fn execute(cmd: AdminCommands, client: PanelClient, format: OutputFormat) -> Result<()> {
    match cmd {
        AdminCommands::Users => {
            let rows: Vec<IdentityDisplay> = client
                .list_users()
                .await?
                .into_iter()
                .map(IdentityDisplay)
                .collect();
            print_list(&rows, format);
        }

        AdminCommands::CreateUser {
            username,
            password,
            role,
        } => {
            let identity = client.create_user(&username, &password, role).await?;
            print_success(&format!("Created {} account '{}'", identity.role, identity.username));
            print_item(&IdentityDisplay(identity), format);
        }

        AdminCommands::DeleteUser { id, yes } => {
            if !yes {
                bail!("deleting an account also destroys its VPS; re-run with --yes");
            }
            client.delete_user(&id).await?;
            print_success(&format!("Deleted account {}", id));
        }

        AdminCommands::Activate { id } => {
            let identity = client.set_active(&id, true).await?;
            print_success(&format!("Activated '{}'", identity.username));
        }

        AdminCommands::Deactivate { id } => {
            let identity = client.set_active(&id, false).await?;
            print_success(&format!("Deactivated '{}'", identity.username));
        }
    }

    Ok(())
}
