//! Relay connection capability.
//!
//! This module contains:
//! - `RelayConnection` trait: connect, send one event, disconnect
//! - `RelayAck`: a relay's verdict on one event
//! - Implementations: WebSocket (NIP-01), Simulated (in-process)
//!
//! Relays are independent and individually unreliable: `send_event` may
//! reject, fail, or never resolve. Callers bound it with their own deadline.

use std::sync::Arc;

use async_trait::async_trait;

use crate::event::Note;

pub mod simulated;
pub mod websocket;

pub use simulated::{RelayBehavior, SimulatedRelay};
pub use websocket::WebSocketRelay;

/// URL scheme selecting an in-process simulated relay.
pub const SIMULATED_SCHEME: &str = "sim://";

// ============================================================================
// Traits
// ============================================================================

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors talking to a single relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Not connected to {0}")]
    NotConnected(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Unsupported relay URL: {0}")]
    UnsupportedUrl(String),
}

/// A relay's answer to one published event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAck {
    Accepted,
    /// Rejected with the relay's message (NIP-01 `OK` false).
    Rejected(String),
}

/// One relay endpoint.
#[async_trait]
pub trait RelayConnection: Send + Sync {
    /// Endpoint identifier.
    fn url(&self) -> &str;

    /// Open the connection.
    async fn connect(&self) -> Result<()>;

    /// Send a signed event and wait for the relay's verdict.
    ///
    /// May never resolve; callers apply their own timeout and drop the
    /// future to cancel.
    async fn send_event(&self, note: &Note) -> Result<RelayAck>;

    /// Close the connection. Disconnecting an unconnected relay is a no-op.
    async fn disconnect(&self) -> Result<()>;
}

// ============================================================================
// Factory
// ============================================================================

/// Create a relay connection for a configured URL.
///
/// - `ws://` / `wss://` → [`WebSocketRelay`]
/// - `sim://<behavior>` → [`SimulatedRelay`]
pub fn relay_for_url(url: &str) -> Result<Arc<dyn RelayConnection>> {
    if url.starts_with(SIMULATED_SCHEME) {
        Ok(Arc::new(SimulatedRelay::from_url(url)?))
    } else if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(Arc::new(WebSocketRelay::new(url)))
    } else {
        Err(RelayError::UnsupportedUrl(url.to_string()))
    }
}

/// True if `url` has a scheme [`relay_for_url`] understands.
pub fn is_supported_url(url: &str) -> bool {
    url.starts_with(SIMULATED_SCHEME) || url.starts_with("ws://") || url.starts_with("wss://")
}
