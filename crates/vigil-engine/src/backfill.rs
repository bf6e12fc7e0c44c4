use anyhow::Result;
use tracing::info;

use vigil_source::{ChannelSource, HistoryRequest};

use crate::sync::Engine;

impl<S: ChannelSource> Engine<S> {
    /// One-time historical ingestion, run once per channel before the
    /// steady-state loop starts. A channel with any persisted rows is
    /// already caught up and skips it, independently of the others.
    pub async fn backfill(&self) -> Result<()> {
        let limit = self.cfg.backfill_limit;
        if limit <= 0 {
            info!(limit, "backfill disabled");
            return Ok(());
        }

        for channel in &self.channels {
            if !self.should_backfill(channel.id).await? {
                info!(channel = %channel.name, "rows already present, skipping backfill");
                continue;
            }

            info!(channel = %channel.name, limit, "first run: backfilling recent history");
            let batch = self
                .fetch_history(
                    channel,
                    HistoryRequest {
                        min_id: 0,
                        limit: Some(limit as u32),
                        oldest_first: true,
                    },
                )
                .await?;
            self.process_batch(channel, batch).await;
        }

        Ok(())
    }

    /// A channel needs backfill only when nothing was ever persisted for it.
    pub async fn should_backfill(&self, channel_id: i64) -> Result<bool> {
        Ok(self.last_message_id(channel_id).await? == 0)
    }
}
