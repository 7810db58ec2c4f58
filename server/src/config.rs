use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Server settings, read from the environment (and a `.env` file, if any).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Prefix of the share urls handed out on create. Falls back to the
    /// request's `Host` header when unset.
    pub base_url: Option<String>,
    /// RocksDB directory. Pastes are kept in memory when unset.
    pub db_path: Option<PathBuf>,
    /// Honor the `x-test-now-ms` header.
    pub test_mode: bool,
    pub cleanup_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 8080).into(),
            base_url: None,
            db_path: None,
            test_mode: false,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut bind_addr: SocketAddr = var("BIND_ADDR")
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .trim()
            .parse()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:8080")?;

        if let Some(port) = var("PORT") {
            bind_addr.set_port(
                port.trim()
                    .parse()
                    .with_context(|| format!("PORT must be a port number, got {port:?}"))?,
            );
        }

        let test_mode = match var("TEST_MODE").as_deref().map(str::trim) {
            None | Some("0" | "false") => false,
            Some("1" | "true") => true,
            Some(other) => bail!("TEST_MODE must be 0 or 1, got {other:?}"),
        };

        let cleanup_interval = match var("CLEANUP_INTERVAL_SECS") {
            Some(secs) => {
                let secs: u64 = secs.trim().parse().with_context(|| {
                    format!("CLEANUP_INTERVAL_SECS must be a whole number, got {secs:?}")
                })?;
                if secs == 0 {
                    bail!("CLEANUP_INTERVAL_SECS must be positive");
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_CLEANUP_INTERVAL,
        };

        Ok(Self {
            bind_addr,
            base_url: var("BASE_URL").map(|url| url.trim().trim_end_matches('/').to_string()),
            db_path: var("DB_PATH").map(PathBuf::from),
            test_mode,
            cleanup_interval,
        })
    }
}
