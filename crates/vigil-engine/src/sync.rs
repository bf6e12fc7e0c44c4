use std::time::Duration;

use anyhow::{Context, Result, ensure};
use tracing::{debug, info, warn};

use vigil_source::{ChannelSource, HistoryRequest, RawMessage, SourceError, SourceEvent};
use vigil_store::Store;
use vigil_types::{ChannelHandle, MessageRecord};

use crate::config::{EngineConfig, SyncMode};
use crate::materialize::Materializer;

/// Drives the configured synchronization strategy for the process lifetime.
///
/// All state that matters for crash recovery lives in the store: the cursor
/// is re-derived from `last_message_id` before every pass and never cached,
/// which is what keeps the hybrid mode's two loops race-safe without locks.
pub struct Engine<S> {
    pub(crate) source: S,
    pub(crate) store: Store,
    pub(crate) materializer: Materializer,
    pub(crate) channels: Vec<ChannelHandle>,
    pub(crate) cfg: EngineConfig,
}

impl<S: ChannelSource> Engine<S> {
    pub fn new(
        source: S,
        store: Store,
        channels: Vec<ChannelHandle>,
        cfg: EngineConfig,
    ) -> Result<Self> {
        ensure!(!channels.is_empty(), "engine started with no resolved channels");
        let materializer = Materializer::new(&cfg.content_dir, cfg.utc_offset_hours)?;
        Ok(Self {
            source,
            store,
            materializer,
            channels,
            cfg,
        })
    }

    /// Backfill first-run channels, then run the configured strategy until
    /// the source disconnects (event/hybrid) or forever (poll).
    pub async fn run(&self) -> Result<()> {
        self.backfill().await?;

        match self.cfg.mode {
            SyncMode::Event => self.event_loop().await,
            SyncMode::Poll => self.poll_loop(self.cfg.poll_interval).await,
            SyncMode::Hybrid => self.hybrid().await,
        }
    }

    async fn event_loop(&self) -> Result<()> {
        let mut events = self
            .source
            .subscribe(&self.channels)
            .await
            .context("subscribing to push stream")?;
        info!(channels = self.channels.len(), "event mode: waiting for new messages");

        while let Some(event) = events.recv().await {
            match event {
                SourceEvent::Message { channel_id, message } => {
                    let Some(channel) = self.channels.iter().find(|c| c.id == channel_id) else {
                        warn!(channel_id, "event for unresolved channel, ignoring");
                        continue;
                    };
                    self.process_raw(channel, &message).await;
                }
                SourceEvent::Closed { reason } => {
                    warn!(%reason, "push stream closed");
                    break;
                }
            }
        }

        info!("push stream ended");
        Ok(())
    }

    async fn poll_loop(&self, interval: Duration) -> Result<()> {
        info!(interval_secs = interval.as_secs(), "poll loop started");
        loop {
            for channel in &self.channels {
                if let Err(e) = self.poll_channel(channel).await {
                    warn!(channel = %channel.name, error = %e, "channel pass failed, continuing");
                }
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// The event stream and a slower catch-up poll run concurrently; the
    /// catch-up pass re-ingests anything the push channel dropped, which the
    /// idempotent store collapses. Ends when the push stream does.
    async fn hybrid(&self) -> Result<()> {
        info!("hybrid mode: event stream with periodic catch-up");
        tokio::select! {
            res = self.event_loop() => res,
            res = self.poll_loop(self.cfg.catchup_interval) => res,
        }
    }

    /// One pass over a channel: re-derive the cursor, fetch everything
    /// strictly newer, persist oldest-first.
    pub async fn poll_channel(&self, channel: &ChannelHandle) -> Result<()> {
        let min_id = self.last_message_id(channel.id).await?;
        let batch = self
            .fetch_history(
                channel,
                HistoryRequest {
                    min_id,
                    limit: None,
                    oldest_first: true,
                },
            )
            .await?;
        self.process_batch(channel, batch).await;
        Ok(())
    }

    /// Run a history query, honoring rate-limit cooldowns: wait exactly the
    /// indicated duration and retry the same request. Skipping here would
    /// create gaps the idempotent store cannot recover.
    pub(crate) async fn fetch_history(
        &self,
        channel: &ChannelHandle,
        req: HistoryRequest,
    ) -> Result<Vec<RawMessage>> {
        loop {
            match self.source.history(channel, req).await {
                Ok(batch) => return Ok(batch),
                Err(SourceError::RateLimited { retry_after }) => {
                    warn!(
                        channel = %channel.name,
                        wait_secs = retry_after.as_secs(),
                        "rate limited during history fetch, suspending"
                    );
                    tokio::time::sleep(retry_after).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Process a fetched batch oldest-to-newest regardless of the order the
    /// source returned it in.
    pub(crate) async fn process_batch(&self, channel: &ChannelHandle, mut batch: Vec<RawMessage>) {
        batch.sort_by_key(|m| m.id);
        for raw in &batch {
            self.process_raw(channel, raw).await;
        }
    }

    /// Materialize and persist one message. Failures are isolated: the
    /// message is logged and skipped, the loop keeps going.
    pub(crate) async fn process_raw(&self, channel: &ChannelHandle, raw: &RawMessage) {
        let record = loop {
            match self.materializer.materialize(&self.source, channel, raw).await {
                Ok(record) => break record,
                Err(SourceError::RateLimited { retry_after }) => {
                    warn!(
                        channel = %channel.name,
                        message_id = raw.id,
                        wait_secs = retry_after.as_secs(),
                        "rate limited during download, suspending"
                    );
                    tokio::time::sleep(retry_after).await;
                }
                Err(e) => {
                    warn!(
                        channel = %channel.name,
                        message_id = raw.id,
                        error = %e,
                        "failed to materialize message, skipping"
                    );
                    return;
                }
            }
        };

        match self.persist(record).await {
            Ok(true) => info!(channel = %channel.name, message_id = raw.id, "saved message"),
            Ok(false) => debug!(channel = %channel.name, message_id = raw.id, "duplicate, ignored"),
            Err(e) => warn!(
                channel = %channel.name,
                message_id = raw.id,
                error = %e,
                "failed to persist message"
            ),
        }
    }

    /// Dispatch the blocking upsert to the worker pool so a store round-trip
    /// never stalls delivery of concurrently arriving push events.
    pub(crate) async fn persist(&self, record: MessageRecord) -> Result<bool> {
        let store = self.store.clone();
        let written = tokio::task::spawn_blocking(move || store.upsert(&record)).await??;
        Ok(written)
    }

    pub(crate) async fn last_message_id(&self, channel_id: i64) -> Result<i64> {
        let store = self.store.clone();
        let id = tokio::task::spawn_blocking(move || store.last_message_id(channel_id)).await??;
        Ok(id)
    }
}
