//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::commands::{login, logout, refresh_token, request, status};

/// Planerix API CLI tool.
#[derive(Parser, Debug)]
#[command(name = "planerix")]
#[command(author, version = env!("PLANERIX_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// API base URL (defaults to $PLANERIX_API_URL, then the saved session)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new session (login)
    Login(login::LoginArgs),

    /// End the session and forget stored credentials
    Logout(logout::LogoutArgs),

    /// Display the stored session
    Status(status::StatusArgs),

    /// Obtain a new access token using the refresh cookie
    RefreshToken(refresh_token::RefreshTokenArgs),

    /// Issue an authenticated API request
    Request(request::RequestArgs),
}
