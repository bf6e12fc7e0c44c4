use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::FixedOffset;
use tracing::warn;

use vigil_source::{ChannelSource, RawMessage, SourceError};
use vigil_types::{CHANNEL_NAME_MAX, ChannelHandle, MessageRecord};

/// Shapes raw source messages into their persisted form.
pub struct Materializer {
    content_dir: PathBuf,
    offset: FixedOffset,
}

impl Materializer {
    pub fn new(content_dir: &Path, utc_offset_hours: i32) -> Result<Self> {
        std::fs::create_dir_all(content_dir)
            .with_context(|| format!("creating content dir {}", content_dir.display()))?;
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .context("reporting offset out of range")?;
        Ok(Self {
            content_dir: content_dir.to_path_buf(),
            offset,
        })
    }

    /// Build the persisted record for one raw message.
    ///
    /// An attachment is downloaded best-effort as `{channel_id}_{message_id}`
    /// under the content dir: a failed download keeps the textual content and
    /// leaves the path null. The only error this returns is `RateLimited`,
    /// which the caller must honor by waiting and retrying the same message.
    pub async fn materialize<S: ChannelSource>(
        &self,
        source: &S,
        channel: &ChannelHandle,
        raw: &RawMessage,
    ) -> Result<MessageRecord, SourceError> {
        let has_attachment = raw.attachment.is_some();
        let mut attachment_path = None;

        if let Some(attachment) = &raw.attachment {
            let dest = self.content_dir.join(format!("{}_{}", channel.id, raw.id));
            match source.download(channel, raw.id, attachment, &dest).await {
                Ok(path) => attachment_path = Some(path),
                Err(SourceError::RateLimited { retry_after }) => {
                    return Err(SourceError::RateLimited { retry_after });
                }
                Err(e) => {
                    warn!(
                        channel = %channel.name,
                        message_id = raw.id,
                        error = %e,
                        "attachment download failed, keeping text"
                    );
                }
            }
        }

        Ok(MessageRecord {
            channel_id: channel.id,
            channel_name: truncate_chars(&channel.name, CHANNEL_NAME_MAX),
            message_id: raw.id,
            content: raw.text.clone().unwrap_or_default(),
            has_attachment,
            attachment_path,
            posted_at: raw.sent_at.with_timezone(&self.offset),
        })
    }
}

/// Truncate to at most `max` characters, never splitting a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio::sync::mpsc;
    use vigil_source::{AttachmentRef, HistoryRequest, SourceEvent};

    /// Materializer-only tests never touch the source.
    struct NoSource;

    #[async_trait]
    impl ChannelSource for NoSource {
        async fn dialogs(&self) -> Result<Vec<ChannelHandle>, SourceError> {
            Ok(vec![])
        }

        async fn history(
            &self,
            _channel: &ChannelHandle,
            _req: HistoryRequest,
        ) -> Result<Vec<RawMessage>, SourceError> {
            Ok(vec![])
        }

        async fn subscribe(
            &self,
            _channels: &[ChannelHandle],
        ) -> Result<mpsc::Receiver<SourceEvent>, SourceError> {
            Err(SourceError::Protocol("no source".into()))
        }

        async fn download(
            &self,
            _channel: &ChannelHandle,
            _message_id: i64,
            _attachment: &AttachmentRef,
            _dest: &std::path::Path,
        ) -> Result<PathBuf, SourceError> {
            Err(SourceError::Protocol("no source".into()))
        }
    }

    fn channel(name: &str) -> ChannelHandle {
        ChannelHandle {
            id: 7,
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn missing_text_defaults_to_empty_and_offset_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(dir.path(), 9).unwrap();

        let raw = RawMessage {
            id: 3,
            text: None,
            sent_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
            attachment: None,
        };
        let record = materializer
            .materialize(&NoSource, &channel("alerts"), &raw)
            .await
            .unwrap();

        assert_eq!(record.content, "");
        assert!(!record.has_attachment);
        assert_eq!(record.posted_at.to_rfc3339(), "2026-08-01T09:00:00+09:00");
    }

    #[tokio::test]
    async fn long_channel_names_are_truncated_for_storage() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(dir.path(), 0).unwrap();

        let name = "é".repeat(120);
        let raw = RawMessage {
            id: 1,
            text: Some("hello".into()),
            sent_at: Utc::now(),
            attachment: None,
        };
        let record = materializer
            .materialize(&NoSource, &channel(&name), &raw)
            .await
            .unwrap();

        assert_eq!(record.channel_name.chars().count(), CHANNEL_NAME_MAX);
    }

    #[test]
    fn truncate_is_a_noop_for_short_names() {
        assert_eq!(truncate_chars("alerts", CHANNEL_NAME_MAX), "alerts");
    }
}
