//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use planerix::Credentials;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long)]
    pub password: String,
}

pub async fn run(args: LoginArgs, api_url: Option<&str>) -> Result<()> {
    let session = session::open(api_url)?;
    let credentials = Credentials::new(&args.email, &args.password);

    eprintln!("{}", "Logging in...".dimmed());

    session
        .client
        .login(&credentials)
        .await
        .context("Failed to login")?;

    session.save().context("Failed to save session")?;

    output::success("Logged in successfully");
    println!();
    output::field("Email", credentials.email());
    output::field("API", session.client.base_url().as_str());

    Ok(())
}
