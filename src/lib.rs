//! nostr-threadgen - NIP-10 thread synthesis
//!
//! Generates realistic multi-participant discussion threads and publishes
//! them to a set of independent Nostr relays, confirming acceptance.
//!
//! ## Data flow
//! ```text
//! Identity ──sign──> EventBuilder <──tags── threading::resolve_tags
//!                        │                        ▲
//!                        ▼                        │ parent
//!                    Publisher ──confirmed──> ThreadPool <── topology
//!                        │
//!                        ▼
//!              relays (WebSocket / simulated)
//! ```
//!
//! The [`orchestrator::ThreadOrchestrator`] sequences the whole run.

pub mod config;
pub mod encoding;
pub mod event;
pub mod identity;
pub mod orchestrator;
pub mod publish;
pub mod relay;
pub mod threading;
pub mod topology;
pub mod utils;
