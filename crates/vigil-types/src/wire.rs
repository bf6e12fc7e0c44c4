use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A channel as the gateway server lists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChannel {
    pub id: i64,
    pub name: String,
}

/// A message as the gateway server serves it, shared by the history REST
/// endpoint and the push stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: i64,
    pub channel_id: i64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub has_attachment: bool,
    pub posted_at: DateTime<Utc>,
}

/// Commands sent FROM the mirror TO the gateway over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Restrict pushed events to the given channels.
    /// The server only forwards `MessageCreate` for subscribed channels.
    Subscribe { channel_ids: Vec<i64> },
}

/// Events pushed by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready,

    /// A new message was posted in a subscribed channel
    MessageCreate(WireMessage),
}
