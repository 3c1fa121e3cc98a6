use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    records_url: Option<String>,
    pub timeout: Duration,
    pub reconcile_delay: Duration,
    pub opaque_writes: bool,
    pub session_path: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Only commands that talk to the record service need the endpoint.
    pub fn records_url(&self) -> anyhow::Result<&str> {
        self.records_url
            .as_deref()
            .context("DASHBOARD_RECORDS_URL must be set to the record service endpoint")
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let records_url = lookup("DASHBOARD_RECORDS_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let timeout_secs: u64 = match lookup("DASHBOARD_TIMEOUT_SECS") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("DASHBOARD_TIMEOUT_SECS is not a number: {value}"))?,
            None => 10,
        };

        let reconcile_delay_ms: u64 = match lookup("DASHBOARD_RECONCILE_DELAY_MS") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| {
                    format!("DASHBOARD_RECONCILE_DELAY_MS is not a number: {value}")
                })?,
            None => 1500,
        };

        let opaque_writes = match lookup("DASHBOARD_OPAQUE_WRITES").as_deref().map(str::trim) {
            None | Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => {
                anyhow::bail!("DASHBOARD_OPAQUE_WRITES must be true or false, got {other}")
            }
        };

        let session_path = lookup("DASHBOARD_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".dashboard-session.json"));

        Ok(Self {
            records_url,
            timeout: Duration::from_secs(timeout_secs.max(1)),
            reconcile_delay: Duration::from_millis(reconcile_delay_ms),
            opaque_writes,
            session_path,
        })
    }
}
