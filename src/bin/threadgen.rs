//! threadgen: synthesize NIP-10 discussion threads on Nostr relays
//!
//! Generates a root author plus participants, publishes one or more
//! threads to the configured relays, and prints a summary with the root
//! ids for external verification.
//!
//! ## Usage
//! ```text
//! threadgen [config.yaml]
//! ```
//!
//! ## Configuration
//! - `threadgen.yaml` in the working directory, the file given as the
//!   first argument, or the file named by THREADGEN_CONFIG
//! - THREADGEN__RELAYS: comma-separated relay URLs (`wss://`, `sim://`)
//! - THREADGEN__ROOT_SECRET_KEY: fixed root identity (hex or nsec)
//! - THREADGEN_LOG: tracing filter (default: info)
//!
//! Exits non-zero when the run aborts (signing or configuration error,
//! Ctrl+C) after printing whatever was published.

use tracing::{error, info};

use nostr_threadgen::config::Config;
use nostr_threadgen::encoding::Bech32Encoder;
use nostr_threadgen::orchestrator::ThreadOrchestrator;
use nostr_threadgen::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = Config::load(path.as_deref())?.resolve().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    let mut orchestrator = ThreadOrchestrator::from_config(config)?;

    let handle = orchestrator.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping run");
            handle.stop();
        }
    });

    let result = orchestrator.run().await;
    println!("{}", orchestrator.summary().render(&Bech32Encoder));

    result?;
    Ok(())
}
