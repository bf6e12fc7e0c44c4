//! The transport boundary of the mirror.
//!
//! The engine only ever talks to a [`ChannelSource`]; the shipped
//! implementation is [`GatewaySource`], a REST + WebSocket client for a
//! channel server. Other providers implement the same trait out of tree.

pub mod config;
pub mod error;
pub mod gateway;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use vigil_types::ChannelHandle;

pub use config::{ProxyEntry, SourceConfig};
pub use error::SourceError;
pub use gateway::GatewaySource;

/// Opaque reference to a message's binary payload, as issued by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Provider-side locator; for the gateway transport this is a URL path.
    pub locator: String,
}

/// A message as the source hands it over, before materialization.
///
/// Both history items and live push events reduce to this shape at the
/// boundary; nothing downstream sees provider-specific payloads.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: i64,
    pub text: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub attachment: Option<AttachmentRef>,
}

/// A live item from the push stream.
#[derive(Debug)]
pub enum SourceEvent {
    /// A new message in one of the subscribed channels.
    Message { channel_id: i64, message: RawMessage },

    /// The underlying connection was torn down. The stream ends after this.
    Closed { reason: String },
}

/// Range query over a channel's history.
///
/// `min_id` is exclusive: only messages with a strictly greater id are
/// returned. `oldest_first` asks the source for ascending order; callers
/// must not rely on it and should sort a batch before processing.
#[derive(Debug, Clone, Copy)]
pub struct HistoryRequest {
    pub min_id: i64,
    pub limit: Option<u32>,
    pub oldest_first: bool,
}

/// A connected, authenticated messaging source.
///
/// Every method may fail with [`SourceError::RateLimited`], which carries a
/// mandatory wait; callers suspend for exactly that duration and retry the
/// same call.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Enumerate the channels visible to the authenticated session.
    async fn dialogs(&self) -> Result<Vec<ChannelHandle>, SourceError>;

    /// Fetch messages from a channel's history per `req`.
    async fn history(
        &self,
        channel: &ChannelHandle,
        req: HistoryRequest,
    ) -> Result<Vec<RawMessage>, SourceError>;

    /// Open the push stream scoped to `channels`. The receiver yields live
    /// messages until the connection is torn down, then closes.
    async fn subscribe(
        &self,
        channels: &[ChannelHandle],
    ) -> Result<mpsc::Receiver<SourceEvent>, SourceError>;

    /// Download a message's binary payload to `dest`.
    async fn download(
        &self,
        channel: &ChannelHandle,
        message_id: i64,
        attachment: &AttachmentRef,
        dest: &Path,
    ) -> Result<PathBuf, SourceError>;
}
