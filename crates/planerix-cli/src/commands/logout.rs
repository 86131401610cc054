//! Logout command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(_args: LogoutArgs, api_url: Option<&str>) -> Result<()> {
    let session = session::open(api_url)?;

    session.client.logout().await.context("Failed to logout")?;
    session.clear()?;

    output::success("Logged out");

    Ok(())
}
