//! Request command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;

use planerix::{Method, RequestOptions};

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE, ...)
    pub method: String,

    /// Path relative to the API base URL (e.g., /projects)
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    /// Extra header as NAME:VALUE (repeatable)
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,

    /// Query parameter as KEY=VALUE (repeatable)
    #[arg(long = "query", short = 'q')]
    pub query: Vec<String>,

    /// Fail on 401 instead of refreshing the access token
    #[arg(long)]
    pub no_retry: bool,

    /// Output compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

fn build_options(args: &RequestArgs) -> Result<RequestOptions> {
    let mut options = RequestOptions::new();

    for raw in &args.headers {
        let Some((name, value)) = raw.split_once(':') else {
            bail!("Invalid header '{raw}', expected NAME:VALUE");
        };
        options = options
            .header(name.trim(), value.trim())
            .with_context(|| format!("Invalid header '{raw}'"))?;
    }

    for raw in &args.query {
        let Some((key, value)) = raw.split_once('=') else {
            bail!("Invalid query parameter '{raw}', expected KEY=VALUE");
        };
        options = options.query(key, value);
    }

    if args.no_retry {
        options = options.skip_auth_retry();
    }

    Ok(options)
}

pub async fn run(args: RequestArgs, api_url: Option<&str>) -> Result<()> {
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", args.method))?;
    let body = args
        .data
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("Request body is not valid JSON")?;
    let options = build_options(&args)?;

    let session = session::open(api_url)?;

    let result = session
        .client
        .request::<serde_json::Value>(method, &args.path, body.as_ref(), &options)
        .await;

    session.save().context("Failed to save session")?;

    let value = match result {
        Ok(value) => value,
        Err(e) if e.is_session_expired() => {
            return Err(e).context("Session expired. Run 'planerix login' again.");
        }
        Err(e) => return Err(e).context("Request failed"),
    };

    if args.compact {
        output::json(&value)?;
    } else {
        output::json_pretty(&value)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(headers: &[&str], query: &[&str]) -> RequestArgs {
        RequestArgs {
            method: "get".to_string(),
            path: "/projects".to_string(),
            data: None,
            headers: headers.iter().map(|s| s.to_string()).collect(),
            query: query.iter().map(|s| s.to_string()).collect(),
            no_retry: false,
            compact: false,
        }
    }

    #[test]
    fn parses_headers_and_query() {
        let options = build_options(&args(&["X-Org-Id: 42"], &["page=2", "q=a=b"])).unwrap();
        assert_eq!(options.headers()["x-org-id"], "42");
        assert_eq!(
            options.query_pairs(),
            [
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "a=b".to_string()),
            ]
        );
        assert!(!options.skips_auth_retry());
    }

    #[test]
    fn no_retry_flag_skips_refresh() {
        let mut args = args(&[], &[]);
        args.no_retry = true;
        assert!(build_options(&args).unwrap().skips_auth_retry());
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(build_options(&args(&["X-Org-Id"], &[])).is_err());
    }

    #[test]
    fn rejects_malformed_query() {
        assert!(build_options(&args(&[], &["page"])).is_err());
    }
}
