//! Sign-in and profile commands

use anyhow::{bail, Result};
use clap::Subcommand;
use std::io::{BufRead, Write};
use std::path::Path;
use vpspanel_common::api::UpdateProfileRequest;

use crate::client::PanelClient;
use crate::output::{print_item, print_success, OutputFormat};
use crate::session::SavedSession;
use crate::views::IdentityDisplay;

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in and remember the session
    Login {
        username: String,

        /// Password (prompted when omitted)
        #[arg(short, long, env = "VPSPANEL_PASSWORD")]
        password: Option<String>,
    },

    /// Create an account, then sign in
    Signup {
        username: String,

        #[arg(short, long, env = "VPSPANEL_PASSWORD")]
        password: Option<String>,

        #[arg(short, long)]
        email: Option<String>,
    },

    /// End the current session
    Logout,

    /// Show the signed-in identity
    Whoami,

    /// Change your password
    Passwd {
        /// New password (prompted when omitted)
        #[arg(short, long)]
        new_password: Option<String>,
    },

    /// Update your username or email
    Profile {
        #[arg(long)]
        username: Option<String>,

        #[arg(long, conflicts_with = "clear_email")]
        email: Option<String>,

        /// Remove the email address
        #[arg(long)]
        clear_email: bool,
    },
}

/// Read one line from stdin after printing `label`
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        bail!("no input");
    }
    Ok(value)
}

fn password_or_prompt(password: Option<String>, label: &str) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => prompt(label),
    }
}

async fn sign_in(client: &PanelClient, session_path: &Path, username: &str, password: &str) -> Result<()> {
    let login = client.login(username, password).await?;
    SavedSession {
        server: client.base_url().to_string(),
        token: login.token,
        username: login.identity.username.clone(),
        expires_at: login.expires_at,
    }
    .save(session_path)?;
    print_success(&format!(
        "Signed in as {} ({})",
        login.identity.username, login.identity.role
    ));
    Ok(())
}

pub async fn execute(
    cmd: AuthCommands,
    client: PanelClient,
    session_path: &Path,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        AuthCommands::Login { username, password } => {
            let password = password_or_prompt(password, "Password: ")?;
            sign_in(&client, session_path, &username, &password).await?;
        }

        AuthCommands::Signup {
            username,
            password,
            email,
        } => {
            let password = password_or_prompt(password, "Choose a password: ")?;
            let identity = client.sign_up(&username, &password, email).await?;
            print_success(&format!("Account '{}' created", identity.username));
            sign_in(&client, session_path, &username, &password).await?;
        }

        AuthCommands::Logout => {
            if let Err(e) = client.logout().await {
                tracing::debug!("Server-side logout failed: {}", e);
            }
            SavedSession::clear(session_path)?;
            print_success("Signed out");
        }

        AuthCommands::Whoami => {
            let me = client.me().await?;
            print_item(&IdentityDisplay::from(me), format);
        }

        AuthCommands::Passwd { new_password } => {
            let new_password = password_or_prompt(new_password, "New password: ")?;
            client.change_password(&new_password).await?;
            print_success("Password changed");
        }

        AuthCommands::Profile {
            username,
            email,
            clear_email,
        } => {
            let req = UpdateProfileRequest {
                username,
                email: if clear_email { Some(None) } else { email.map(Some) },
            };
            if req.username.is_none() && req.email.is_none() {
                bail!("nothing to update; pass --username, --email or --clear-email");
            }
            let me = client.update_profile(&req).await?;
            print_success("Profile updated");
            print_item(&IdentityDisplay::from(me), format);
        }
    }

    Ok(())
}
