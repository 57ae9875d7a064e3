//! Socket.IO realtime channel over WebSocket
//!
//! Only the subset of Engine.IO v4 / Socket.IO v5 the widget needs: the
//! handshake, ping/pong keepalive, and the `start`, `token` and
//! `sourceDocuments` events on the default namespace.

use async_stream::stream;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tokio_util::sync::CancellationToken;

use crate::{
    channel::{ChannelConnection, ChannelConnector, ChannelEvent},
    error::{Error, Result},
    types::SourceDocument,
};

/// Connects to the backend's Socket.IO endpoint
pub struct SocketIoConnector {
    api_host: String,
}

impl SocketIoConnector {
    /// Create a connector for an API host (http/https/ws/wss)
    pub fn new(api_host: impl Into<String>) -> Self {
        Self {
            api_host: api_host.into(),
        }
    }
}

/// Build the WebSocket URL for an API host
pub fn socket_url(api_host: &str) -> Result<String> {
    let host = api_host.trim_end_matches('/');
    let base = if let Some(rest) = host.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = host.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if host.starts_with("ws://") || host.starts_with("wss://") {
        host.to_string()
    } else {
        return Err(Error::InvalidConfig(format!(
            "unsupported API host scheme: {}",
            api_host
        )));
    };
    Ok(format!("{}/socket.io/?EIO=4&transport=websocket", base))
}

/// A decoded text frame
#[derive(Debug, Clone, PartialEq)]
enum Frame {
    /// Engine.IO handshake
    Open,
    /// Engine.IO close
    Close,
    /// Engine.IO ping; must be answered with a pong
    Ping,
    /// Namespace connected
    Connect { sid: Option<String> },
    /// Namespace refused the connection
    ConnectError(String),
    /// Namespace disconnected
    Disconnect,
    /// Named event with arguments
    Event { name: String, args: Vec<Value> },
    /// Anything the widget does not consume
    Other,
}

/// Strip an optional `/namespace,` prefix and ack id from a Socket.IO payload
fn strip_namespace_and_ack(payload: &str) -> &str {
    let payload = if payload.starts_with('/') {
        payload.split_once(',').map(|(_, rest)| rest).unwrap_or("")
    } else {
        payload
    };
    payload.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn parse_frame(text: &str) -> Frame {
    let mut chars = text.chars();
    match chars.next() {
        Some('0') => Frame::Open,
        Some('1') => Frame::Close,
        Some('2') => Frame::Ping,
        Some('4') => parse_socket_packet(chars.as_str()),
        _ => Frame::Other,
    }
}

fn parse_socket_packet(packet: &str) -> Frame {
    let mut chars = packet.chars();
    let kind = chars.next();
    let payload = chars.as_str();
    match kind {
        Some('0') => {
            let body = if payload.starts_with('/') {
                payload.split_once(',').map(|(_, rest)| rest).unwrap_or("")
            } else {
                payload
            };
            let sid = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("sid").and_then(Value::as_str).map(str::to_string))
                .filter(|sid| !sid.is_empty());
            Frame::Connect { sid }
        }
        Some('1') => Frame::Disconnect,
        Some('2') => {
            let body = strip_namespace_and_ack(payload);
            match serde_json::from_str::<Vec<Value>>(body) {
                Ok(mut items) if !items.is_empty() => match items.remove(0) {
                    Value::String(name) => Frame::Event { name, args: items },
                    _ => Frame::Other,
                },
                _ => Frame::Other,
            }
        }
        Some('4') => Frame::ConnectError(payload.to_string()),
        _ => Frame::Other,
    }
}

/// A namespace connect is only usable with a socket id to send back
fn connected_event(sid: Option<String>) -> Option<ChannelEvent> {
    match sid {
        Some(client_id) => Some(ChannelEvent::Connected { client_id }),
        None => {
            tracing::warn!("Namespace connected without a socket id; answers will not stream");
            None
        }
    }
}

/// Map a named Socket.IO event to a channel event
fn to_channel_event(name: &str, args: Vec<Value>) -> Option<ChannelEvent> {
    match name {
        "start" => Some(ChannelEvent::Start),
        "token" => {
            let text = match args.into_iter().next() {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            Some(ChannelEvent::Token { text })
        }
        "sourceDocuments" => {
            let value = args.into_iter().next().unwrap_or(Value::Array(vec![]));
            match serde_json::from_value::<Vec<SourceDocument>>(value) {
                Ok(documents) => Some(ChannelEvent::SourceDocuments { documents }),
                Err(e) => {
                    tracing::warn!("Ignoring malformed sourceDocuments event: {}", e);
                    None
                }
            }
        }
        _ => None,
    }
}

#[async_trait]
impl ChannelConnector for SocketIoConnector {
    async fn connect(&self) -> Result<ChannelConnection> {
        let url = socket_url(&self.api_host)?;
        tracing::debug!("Connecting realtime channel at {}", url);

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Socket(format!("Failed to connect to {}: {}", url, e)))?;
        let (mut sink, mut incoming) = ws_stream.split();

        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let events = stream! {
            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => None,
                    msg = incoming.next() => Some(msg),
                };
                let Some(msg) = next else {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                };

                let reply = match msg {
                    Some(Ok(WsMessage::Text(text))) => match parse_frame(&text) {
                        Frame::Open => Some("40"),
                        Frame::Ping => Some("3"),
                        Frame::Connect { sid } => {
                            if let Some(event) = connected_event(sid) {
                                yield event;
                            }
                            None
                        }
                        Frame::Event { name, args } => {
                            if let Some(event) = to_channel_event(&name, args) {
                                yield event;
                            }
                            None
                        }
                        Frame::ConnectError(reason) => {
                            tracing::warn!("Realtime channel refused: {}", reason);
                            break;
                        }
                        Frame::Close | Frame::Disconnect => break,
                        Frame::Other => None,
                    },
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => None,
                    Some(Err(e)) => {
                        tracing::warn!("Realtime channel error: {}", e);
                        break;
                    }
                };

                if let Some(reply) = reply {
                    if let Err(e) = sink.send(WsMessage::Text(reply.to_string().into())).await {
                        tracing::warn!("Failed to write to realtime channel: {}", e);
                        break;
                    }
                }
            }
            yield ChannelEvent::Disconnected;
        };

        Ok(ChannelConnection {
            events: Box::pin(events),
            cancel,
        })
    }
}
