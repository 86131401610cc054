//! Refresh token command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RefreshTokenArgs {}

pub async fn run(_args: RefreshTokenArgs, api_url: Option<&str>) -> Result<()> {
    let session = session::open(api_url)?;

    eprintln!("{}", "Refreshing session...".dimmed());

    let result = session.client.refresh().await;

    // The server may have rotated the refresh cookie either way.
    session
        .save()
        .context("Failed to save refreshed session")?;

    result.context("Failed to refresh session. Run 'planerix login' again.")?;

    output::success("Session refreshed successfully");

    Ok(())
}
