use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use vigil_engine::EngineConfig;
use vigil_source::ProxyEntry;

/// Everything the daemon reads from the environment. A `.env` file is
/// honored when present; missing required values are fatal at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_url: String,
    pub gateway_token: String,
    pub db_path: PathBuf,
    pub channel_file: PathBuf,
    pub proxies: Vec<ProxyEntry>,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let gateway_url =
            std::env::var("VIGIL_GATEWAY_URL").context("VIGIL_GATEWAY_URL is not set")?;
        let gateway_token =
            std::env::var("VIGIL_GATEWAY_TOKEN").context("VIGIL_GATEWAY_TOKEN is not set")?;

        let engine = EngineConfig {
            mode: env_or("VIGIL_SYNC_MODE", "event").parse()?,
            poll_interval: Duration::from_secs(parsed_var("VIGIL_POLL_INTERVAL", 60u64)?),
            catchup_interval: Duration::from_secs(parsed_var("VIGIL_CATCHUP_INTERVAL", 300u64)?),
            backfill_limit: parsed_var("VIGIL_BACKFILL_LIMIT", 10i64)?,
            content_dir: env_or("VIGIL_CONTENT_DIR", "downloads").into(),
            utc_offset_hours: parsed_var("VIGIL_UTC_OFFSET_HOURS", 9i32)?,
        };

        Ok(Self {
            gateway_url,
            gateway_token,
            db_path: env_or("VIGIL_DB_PATH", "vigil.db").into(),
            channel_file: env_or("VIGIL_CHANNEL_FILE", "channels.txt").into(),
            proxies: ProxyEntry::parse_list(&std::env::var("VIGIL_PROXIES").unwrap_or_default()),
            engine,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn parsed_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

/// Read the channel-name list: one name per line, blank lines and
/// `#`-prefixed lines ignored.
pub fn load_channel_names(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading channel list {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}
