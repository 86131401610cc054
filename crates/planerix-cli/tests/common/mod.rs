use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Session file inside a test's temporary directory.
pub fn session_file(dir: &Path) -> PathBuf {
    dir.join("session.json")
}

/// Run the CLI binary against an isolated session file and API URL.
///
/// Blocks the calling thread; call from `spawn_blocking` inside async tests.
pub fn run_cli_with_env(args: &[&str], session: &Path, api_url: &str) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_planerix"));
    cmd.args(args);
    cmd.env("PLANERIX_SESSION_FILE", session);
    cmd.env("PLANERIX_API_URL", api_url);
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("RUST_LOG");
    cmd.output().expect("Failed to execute CLI")
}

/// Run the CLI off the async runtime.
pub async fn run_cli(args: &[&str], session: &Path, api_url: &str) -> Output {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let session = session.to_path_buf();
    let api_url = api_url.to_string();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_cli_with_env(&args, &session, &api_url)
    })
    .await
    .expect("CLI task panicked")
}

/// Run the CLI and expect success, returning stdout.
pub async fn run_cli_success(args: &[&str], session: &Path, api_url: &str) -> String {
    let output = run_cli(args, session, api_url).await;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Read the persisted session entries.
pub fn read_session(path: &Path) -> serde_json::Value {
    let json = std::fs::read_to_string(path).expect("session file missing");
    serde_json::from_str(&json).expect("session file is not JSON")
}
