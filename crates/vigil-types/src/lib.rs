pub mod models;
pub mod wire;

pub use models::{CHANNEL_NAME_MAX, ChannelHandle, MessageRecord};
