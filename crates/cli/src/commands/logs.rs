//! Activity log command

use anyhow::Result;
use clap::Args;

use crate::client::PanelClient;
use crate::output::{print_list, OutputFormat};
use crate::views::ActivityDisplay;

#[derive(Args)]
pub struct LogsArgs {
    /// Only entries for this VPS
    #[arg(long)]
    pub vps: Option<String>,

    /// Maximum entries, newest first
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
}

pub async fn execute(args: LogsArgs, client: PanelClient, format: OutputFormat) -> Result<()> {
    let entries = client.activity(args.vps.as_deref(), Some(args.limit)).await?;
    let rows: Vec<ActivityDisplay> = entries.into_iter().map(ActivityDisplay).collect();
    print_list(&rows, format);
    Ok(())
}
