use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Maximum stored length of a channel name, in characters.
pub const CHANNEL_NAME_MAX: usize = 100;

/// A channel resolved against the session's dialog list.
///
/// The numeric id is the stable identity assigned by the source; the name is
/// only used for configuration matching and logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelHandle {
    pub id: i64,
    pub name: String,
}

/// A message in its persisted shape.
///
/// `(channel_id, message_id)` is the identity key: the store treats a second
/// write under the same pair as a no-op, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub channel_id: i64,
    pub channel_name: String,
    pub message_id: i64,
    pub content: String,
    pub has_attachment: bool,
    pub attachment_path: Option<PathBuf>,
    /// Source UTC timestamp shifted to the configured reporting offset.
    pub posted_at: DateTime<FixedOffset>,
}
