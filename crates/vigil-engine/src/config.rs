use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::bail;

/// Which synchronization strategy the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Live push stream only; the engine ends when the connection does.
    Event,
    /// Periodic cursor-based polling, forever.
    Poll,
    /// Push stream plus a slower catch-up poll covering dropped events.
    Hybrid,
}

impl FromStr for SyncMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event" => Ok(Self::Event),
            "poll" => Ok(Self::Poll),
            "hybrid" => Ok(Self::Hybrid),
            other => bail!("unknown sync mode '{other}' (expected event|poll|hybrid)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: SyncMode,
    pub poll_interval: Duration,
    pub catchup_interval: Duration,
    /// How much history to mirror the first time a channel is seen.
    /// Zero or negative disables backfill for all channels.
    pub backfill_limit: i64,
    /// Where attachments are downloaded.
    pub content_dir: PathBuf,
    /// Fixed reporting offset applied to source UTC timestamps.
    pub utc_offset_hours: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::Event,
            poll_interval: Duration::from_secs(60),
            catchup_interval: Duration::from_secs(300),
            backfill_limit: 10,
            content_dir: PathBuf::from("downloads"),
            utc_offset_hours: 9,
        }
    }
}
