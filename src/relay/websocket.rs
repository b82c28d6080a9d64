//! NIP-01 relay over WebSocket.
//!
//! Publishing sends `["EVENT", <event>]` and waits for the matching
//! `["OK", <id>, <accepted>, <message>]`. Frames for other events (late
//! answers to attempts that were cancelled) and `NOTICE`s are skipped.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::{RelayAck, RelayConnection, RelayError, Result};
use crate::event::Note;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to one relay.
///
/// One publish at a time per relay; concurrent fan-out happens across relays.
pub struct WebSocketRelay {
    url: String,
    socket: Mutex<Option<Socket>>,
}

impl WebSocketRelay {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            socket: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RelayConnection for WebSocketRelay {
    fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<()> {
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| RelayError::Connection(format!("{}: {}", self.url, e)))?;
        *self.socket.lock().await = Some(socket);
        info!(relay = %self.url, "Connected to relay");
        Ok(())
    }

    async fn send_event(&self, note: &Note) -> Result<RelayAck> {
        let mut guard = self.socket.lock().await;
        let socket = guard
            .as_mut()
            .ok_or_else(|| RelayError::NotConnected(self.url.clone()))?;

        let frame = serde_json::to_string(&("EVENT", note))
            .map_err(|e| RelayError::Send(e.to_string()))?;
        socket
            .send(Message::Text(frame))
            .await
            .map_err(|e| RelayError::Send(format!("{}: {}", self.url, e)))?;

        while let Some(message) = socket.next().await {
            let message = message.map_err(|e| RelayError::Send(format!("{}: {}", self.url, e)))?;
            match message {
                Message::Text(text) => match parse_ok(&text, note.id()) {
                    Some(ack) => return Ok(ack),
                    None => debug!(relay = %self.url, frame = %text, "Skipping relay frame"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }

        *guard = None;
        Err(RelayError::Connection(format!(
            "{}: connection closed by relay",
            self.url
        )))
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(mut socket) = self.socket.lock().await.take() {
            socket
                .close(None)
                .await
                .map_err(|e| RelayError::Connection(format!("{}: {}", self.url, e)))?;
            debug!(relay = %self.url, "Disconnected from relay");
        }
        Ok(())
    }
}

/// Parse an `OK` frame for `event_id`. Other frames yield `None`.
fn parse_ok(text: &str, event_id: &str) -> Option<RelayAck> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let fields = value.as_array()?;
    if fields.first()?.as_str()? != "OK" || fields.get(1)?.as_str()? != event_id {
        return None;
    }
    let accepted = fields.get(2)?.as_bool()?;
    let message = fields
        .get(3)
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();

    Some(if accepted {
        RelayAck::Accepted
    } else {
        RelayAck::Rejected(message)
    })
}
