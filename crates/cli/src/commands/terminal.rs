//! Fake-terminal commands: one-shot `exec` and an interactive session

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::resolve_vps_id;
use crate::client::PanelClient;
use crate::output::{print_error, print_structured, OutputFormat};

#[derive(Args)]
pub struct ExecArgs {
    /// VPS ID (defaults to your own)
    #[arg(long)]
    pub vps: Option<String>,

    /// Working directory
    #[arg(short = 'C', long)]
    pub cwd: Option<String>,

    /// Command line to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Args)]
pub struct TerminalArgs {
    /// VPS ID (defaults to your own)
    pub vps: Option<String>,
}

/// `root@<first 8 chars of id>:~#`
pub fn prompt_for(vps_id: &str) -> String {
    let short: String = vps_id.chars().take(8).collect();
    format!("root@{}:~#", short)
}

pub fn banner(name: &str, vps_id: &str) -> Vec<String> {
    vec![
        format!("Connected to {} ({})", name, vps_id),
        "Ubuntu 22.04.3 LTS".to_string(),
        "Welcome to your VPS instance!".to_string(),
    ]
}

pub async fn exec(args: ExecArgs, client: PanelClient, format: OutputFormat) -> Result<()> {
    let vps_id = resolve_vps_id(&client, args.vps).await?;
    let result = client
        .exec(&vps_id, &args.command.join(" "), args.cwd.as_deref())
        .await?;

    if !print_structured(&result, format) && !result.output.is_empty() {
        println!("{}", result.output);
    }
    if result.exit_code != 0 {
        std::process::exit(result.exit_code);
    }
    Ok(())
}

/// Line-by-line session against the fake terminal. `exit` leaves and
/// `clear` is handled locally.
pub async fn interactive(args: TerminalArgs, client: PanelClient) -> Result<()> {
    let vps_id = resolve_vps_id(&client, args.vps).await?;
    let vps = client.get_vps(&vps_id).await?;

    for line in banner(&vps.vps.name, &vps.vps.id) {
        println!("{}", line.green());
    }
    println!();

    let prompt = prompt_for(&vps.vps.id);
    let mut cwd: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", prompt.green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let command = line.trim();
        match command {
            "" => continue,
            "exit" | "logout" => break,
            "clear" => {
                print!("\x1b[2J\x1b[H");
                continue;
            }
            _ => {}
        }

        match client.exec(&vps.vps.id, command, cwd.as_deref()).await {
            Ok(result) => {
                if !result.output.is_empty() {
                    println!("{}", result.output);
                }
                cwd = Some(result.working_directory);
            }
            Err(e) => print_error(&e.to_string()),
        }
    }

    println!("Connection to {} closed.", vps.vps.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_uses_short_id() {
        assert_eq!(prompt_for("0123456789abcdef"), "root@01234567:~#");
        assert_eq!(prompt_for("abc"), "root@abc:~#");
    }

    #[test]
    fn test_banner() {
        let lines = banner("web", "id-1");
        assert_eq!(lines[0], "Connected to web (id-1)");
        assert_eq!(lines[2], "Welcome to your VPS instance!");
    }
}
