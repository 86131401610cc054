//! Status command implementation.

use anyhow::Result;
use clap::Args;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct StatusArgs {}

fn presence(stored: bool) -> &'static str {
    if stored { "stored" } else { "none" }
}

pub async fn run(_args: StatusArgs, api_url: Option<&str>) -> Result<()> {
    let session = session::open(api_url)?;

    output::field("API", session.client.base_url().as_str());
    output::field("Session file", &session.path().display().to_string());
    output::field("Access token", presence(session.has_access_token()?));
    output::field("Refresh cookie", presence(session.has_refresh_cookie()?));

    Ok(())
}
