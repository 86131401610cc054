//! Subcommand implementations.

pub mod login;
pub mod logout;
pub mod refresh_token;
pub mod request;
pub mod status;

use anyhow::Result;

use crate::cli::{Cli, Commands};

pub async fn handle(cli: Cli) -> Result<()> {
    let api_url = cli.api_url.as_deref();
    match cli.command {
        Commands::Login(args) => login::run(args, api_url).await,
        Commands::Logout(args) => logout::run(args, api_url).await,
        Commands::Status(args) => status::run(args, api_url).await,
        Commands::RefreshToken(args) => refresh_token::run(args, api_url).await,
        Commands::Request(args) => request::run(args, api_url).await,
    }
}
