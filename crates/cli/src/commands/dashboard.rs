//! Role-dependent dashboard

use anyhow::Result;
use colored::Colorize;
use vpspanel_common::api::{AdminDashboard, Dashboard, UserDashboard};

use crate::client::PanelClient;
use crate::output::{
    format_timestamp, format_uptime, print_info, print_list, print_structured, status_badge,
    OutputFormat,
};
use crate::views::{ActivityDisplay, UserSummaryDisplay, VpsDisplay};

pub async fn execute(client: PanelClient, format: OutputFormat) -> Result<()> {
    let dashboard = client.dashboard().await?;
    if print_structured(&dashboard, format) {
        return Ok(());
    }

    match dashboard {
        Dashboard::User(view) => render_user(view, format),
        Dashboard::Admin(view) => render_admin(view, format),
    }
    Ok(())
}

fn render_user(view: UserDashboard, format: OutputFormat) {
    println!("{}", format!(" Welcome, {}", view.identity.username).bold());
    println!();

    match view.vps {
        Some(v) => {
            println!("{}", " Your VPS".bold());
            println!("   Name:      {}", v.vps.name.cyan());
            println!("   ID:        {}", v.vps.id);
            println!("   Status:    {}", status_badge(v.vps.status));
            println!("   IP:        {}", v.vps.ip_address);
            println!("   Container: {}", v.vps.container_id);
            println!("   Image:     {}", v.vps.image);
            println!(
                "   Resources: {} / {} / {}",
                v.vps.resources.cpu, v.vps.resources.ram, v.vps.resources.disk
            );
            if let Some(uptime) = v.uptime_seconds {
                println!("   Uptime:    {}", format_uptime(uptime));
            }
            if let Some(deployed_at) = v.vps.deployed_at {
                println!("   Deployed:  {}", format_timestamp(deployed_at));
            }
        }
        None => print_info("You have no VPS yet. Deploy one with `vpspanel vps deploy`."),
    }

    println!();
    println!("{}", " Recent activity".bold());
    let rows: Vec<ActivityDisplay> = view.activity.into_iter().map(ActivityDisplay).collect();
    print_list(&rows, format);
}

fn render_admin(view: AdminDashboard, format: OutputFormat) {
    println!("{}", format!(" Admin dashboard ({})", view.identity.username).bold());
    println!(
        "   Users: {}   VPS: {}   Running: {}",
        view.totals.users.to_string().cyan(),
        view.totals.vps.to_string().cyan(),
        view.totals.running.to_string().green()
    );
    println!();

    println!("{}", " Users".bold());
    let users: Vec<UserSummaryDisplay> = view.users.into_iter().map(UserSummaryDisplay).collect();
    print_list(&users, format);
    println!();

    println!("{}", " VPS registry".bold());
    let vps: Vec<VpsDisplay> = view.vps.into_iter().map(VpsDisplay).collect();
    print_list(&vps, format);
}
