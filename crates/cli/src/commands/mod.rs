//! CLI command implementations

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod logs;
pub mod terminal;
pub mod vps;

use anyhow::{bail, Result};

use crate::client::PanelClient;

/// The caller's only VPS when no id is given
pub(crate) async fn resolve_vps_id(client: &PanelClient, id: Option<String>) -> Result<String> {
    if let Some(id) = id {
        return Ok(id);
    }
    let me = client.me().await?;
    let own: Vec<_> = client
        .list_vps()
        .await?
        .into_iter()
        .filter(|v| v.vps.owner_id == me.id)
        .collect();
    match own.as_slice() {
        [only] => Ok(only.vps.id.clone()),
        [] => bail!("you have no VPS; deploy one with `vpspanel vps deploy`"),
        _ => bail!("you own several VPS records; pass an id"),
    }
}
