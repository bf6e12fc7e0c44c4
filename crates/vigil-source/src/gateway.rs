use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::{Response, StatusCode, header};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use vigil_types::ChannelHandle;
use vigil_types::wire::{GatewayCommand, GatewayEvent, WireChannel, WireMessage};

use crate::{
    AttachmentRef, ChannelSource, HistoryRequest, RawMessage, SourceConfig, SourceError,
    SourceEvent,
};

/// Buffered live events before the engine picks them up.
const EVENT_QUEUE: usize = 256;

/// REST + WebSocket client for a channel server's gateway protocol.
pub struct GatewaySource {
    http: reqwest::Client,
    base: String,
    ws_base: String,
    token: String,
}

impl GatewaySource {
    /// Build the HTTP client (optionally through a SOCKS5 proxy) and verify
    /// the credential with an authenticated probe. A rejected token maps to
    /// [`SourceError::NotAuthorized`] so the caller can exit with guidance.
    pub async fn connect(cfg: &SourceConfig) -> Result<Self, SourceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &cfg.proxy {
            info!(proxy = %format!("{}:{}", proxy.host, proxy.port), "routing HTTP through proxy");
            builder = builder.proxy(reqwest::Proxy::all(proxy.socks_url())?);
        }
        let http = builder.build()?;

        let base = cfg.base_url.trim_end_matches('/').to_string();
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(SourceError::Protocol(format!(
                "base url must be http(s): {base}"
            )));
        };

        let source = Self {
            http,
            base,
            ws_base,
            token: cfg.token.clone(),
        };

        let probe = source.get(&format!("{}/auth/session", source.base)).await?;
        Self::check(probe)?;
        info!(base = %source.base, "gateway session authorized");
        Ok(source)
    }

    async fn get(&self, url: &str) -> Result<Response, SourceError> {
        Ok(self.http.get(url).bearer_auth(&self.token).send().await?)
    }

    /// Map gateway status codes onto the boundary error taxonomy. A 429 must
    /// carry `Retry-After`; the wait it names is mandatory.
    fn check(resp: Response) -> Result<Response, SourceError> {
        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::NotAuthorized),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .map(std::time::Duration::from_secs)
                    .ok_or_else(|| {
                        SourceError::Protocol("429 without a Retry-After duration".into())
                    })?;
                Err(SourceError::RateLimited { retry_after })
            }
            status if status.is_success() => Ok(resp),
            status => Err(SourceError::Protocol(format!(
                "unexpected status {status} from {}",
                resp.url()
            ))),
        }
    }
}

#[async_trait]
impl ChannelSource for GatewaySource {
    async fn dialogs(&self) -> Result<Vec<ChannelHandle>, SourceError> {
        let resp = Self::check(self.get(&format!("{}/channels", self.base)).await?)?;
        let channels: Vec<WireChannel> = resp.json().await?;
        debug!(count = channels.len(), "listed dialogs");
        Ok(channels
            .into_iter()
            .map(|c| ChannelHandle {
                id: c.id,
                name: c.name,
            })
            .collect())
    }

    async fn history(
        &self,
        channel: &ChannelHandle,
        req: HistoryRequest,
    ) -> Result<Vec<RawMessage>, SourceError> {
        let mut url = format!(
            "{}/channels/{}/messages?min_id={}",
            self.base, channel.id, req.min_id
        );
        if req.oldest_first {
            url.push_str("&order=asc");
        }
        if let Some(limit) = req.limit {
            url.push_str(&format!("&limit={limit}"));
        }

        let resp = Self::check(self.get(&url).await?)?;
        let messages: Vec<WireMessage> = resp.json().await?;
        Ok(messages.into_iter().map(wire_to_raw).collect())
    }

    async fn subscribe(
        &self,
        channels: &[ChannelHandle],
    ) -> Result<mpsc::Receiver<SourceEvent>, SourceError> {
        let url = format!("{}/gateway", self.ws_base);
        let (ws, _) = connect_async(url.as_str()).await?;
        let (mut sink, mut stream) = ws.split();

        let identify = GatewayCommand::Identify {
            token: self.token.clone(),
        };
        sink.send(Message::Text(serde_json::to_string(&identify)?.into()))
            .await?;

        let subscribe = GatewayCommand::Subscribe {
            channel_ids: channels.iter().map(|c| c.id).collect(),
        };
        sink.send(Message::Text(serde_json::to_string(&subscribe)?.into()))
            .await?;

        info!(channels = channels.len(), "subscribed to gateway push stream");

        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let message = match frame {
                    Ok(message) => message,
                    Err(e) => {
                        let _ = tx
                            .send(SourceEvent::Closed {
                                reason: e.to_string(),
                            })
                            .await;
                        break;
                    }
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<GatewayEvent>(text.as_str())
                    {
                        Ok(GatewayEvent::MessageCreate(wire)) => {
                            let channel_id = wire.channel_id;
                            let event = SourceEvent::Message {
                                channel_id,
                                message: wire_to_raw(wire),
                            };
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Ok(GatewayEvent::Ready) => trace!("gateway ready"),
                        Err(e) => warn!(error = %e, "undecodable gateway frame"),
                    },
                    Message::Close(_) => {
                        let _ = tx
                            .send(SourceEvent::Closed {
                                reason: "server closed the gateway".into(),
                            })
                            .await;
                        break;
                    }
                    _ => {}
                }
            }
            let _ = sink.close().await;
        });

        Ok(rx)
    }

    async fn download(
        &self,
        _channel: &ChannelHandle,
        message_id: i64,
        attachment: &AttachmentRef,
        dest: &Path,
    ) -> Result<PathBuf, SourceError> {
        let url = format!("{}{}", self.base, attachment.locator);
        let resp = Self::check(self.get(&url).await?)?;
        let body = resp.bytes().await?;
        tokio::fs::write(dest, &body).await?;
        debug!(message_id, path = %dest.display(), "downloaded attachment");
        Ok(dest.to_path_buf())
    }
}

/// Reduce a wire message to the boundary shape the engine consumes.
pub(crate) fn wire_to_raw(wire: WireMessage) -> RawMessage {
    let attachment = wire.has_attachment.then(|| AttachmentRef {
        locator: format!(
            "/channels/{}/messages/{}/attachment",
            wire.channel_id, wire.id
        ),
    });
    RawMessage {
        id: wire.id,
        text: wire.content,
        sent_at: wire.posted_at,
        attachment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn decodes_message_create_event() {
        let json = r#"{
            "type": "MessageCreate",
            "data": {
                "id": 42,
                "channel_id": 7,
                "content": "breach dump",
                "has_attachment": true,
                "posted_at": "2026-08-01T12:00:00Z"
            }
        }"#;
        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        match event {
            GatewayEvent::MessageCreate(wire) => {
                assert_eq!(wire.id, 42);
                assert_eq!(wire.channel_id, 7);
                assert_eq!(wire.content.as_deref(), Some("breach dump"));
                assert!(wire.has_attachment);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn wire_without_attachment_has_no_ref() {
        let raw = wire_to_raw(WireMessage {
            id: 1,
            channel_id: 2,
            content: None,
            has_attachment: false,
            posted_at: Utc::now(),
        });
        assert!(raw.attachment.is_none());
        assert!(raw.text.is_none());
    }

    #[test]
    fn attachment_locator_is_scoped_to_channel_and_message() {
        let raw = wire_to_raw(WireMessage {
            id: 9,
            channel_id: 4,
            content: Some("payload".into()),
            has_attachment: true,
            posted_at: Utc::now(),
        });
        let attachment = raw.attachment.unwrap();
        assert_eq!(attachment.locator, "/channels/4/messages/9/attachment");
    }
}
