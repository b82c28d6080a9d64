//! Identifier encoding capability.
//!
//! Converts raw hex identifiers into NIP-19 bech32 forms (`npub`, `note`)
//! for reporting, and decodes `nsec` key material supplied through
//! configuration.

use bech32::{Bech32, Hrp};

/// Human-readable prefix for public keys.
pub const NPUB_PREFIX: &str = "npub";
/// Human-readable prefix for note ids.
pub const NOTE_PREFIX: &str = "note";
/// Human-readable prefix for secret keys.
pub const NSEC_PREFIX: &str = "nsec";

/// Errors decoding user-supplied bech32 identifiers.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Expected '{expected}' prefix, found '{found}'")]
    WrongPrefix { expected: String, found: String },

    #[error("Invalid bech32: {0}")]
    Invalid(String),
}

/// Renders raw identifiers for display.
///
/// Pure: encoders never fail; unencodable input is returned unchanged.
pub trait IdentifierEncoder: Send + Sync {
    fn encode_public_key(&self, hex_key: &str) -> String;
    fn encode_note_id(&self, hex_id: &str) -> String;
}

/// NIP-19 bech32 encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bech32Encoder;

impl IdentifierEncoder for Bech32Encoder {
    fn encode_public_key(&self, hex_key: &str) -> String {
        encode_hex(NPUB_PREFIX, hex_key).unwrap_or_else(|| hex_key.to_string())
    }

    fn encode_note_id(&self, hex_id: &str) -> String {
        encode_hex(NOTE_PREFIX, hex_id).unwrap_or_else(|| hex_id.to_string())
    }
}

fn encode_hex(prefix: &str, hex_value: &str) -> Option<String> {
    let bytes = hex::decode(hex_value).ok()?;
    let hrp = Hrp::parse(prefix).ok()?;
    bech32::encode::<Bech32>(hrp, &bytes).ok()
}

/// Decode an `nsec1...` string into raw secret key bytes.
pub fn decode_secret_key(value: &str) -> Result<Vec<u8>, DecodeError> {
    let (hrp, data) =
        bech32::decode(value.trim()).map_err(|e| DecodeError::Invalid(e.to_string()))?;
    let found = hrp.to_string().to_lowercase();
    if found != NSEC_PREFIX {
        return Err(DecodeError::WrongPrefix {
            expected: NSEC_PREFIX.to_string(),
            found,
        });
    }
    Ok(data)
}
