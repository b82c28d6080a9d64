//! Participant identities and the signing capability.
//!
//! An [`Identity`] pairs a display name with a [`Signer`]. Identities are
//! created once per participant at startup and owned by the orchestrator for
//! the lifetime of a run; the signer is passed explicitly into every
//! build/sign call rather than being attached to shared client state.

use std::fmt;

use rand::Rng;
use secp256k1::{schnorr, All, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};

/// Length in bytes of secret key material.
pub const SECRET_KEY_LEN: usize = 32;

/// Errors raised while creating keys or signing.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Invalid secret key material: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    Failed(String),

    #[error("Draft replies to {0} but its tags do not reference it as parent")]
    ParentNotReferenced(String),
}

/// Signs event digests on behalf of one public key.
pub trait Signer: Send + Sync {
    /// Hex-encoded x-only public key.
    fn public_key(&self) -> &str;

    /// Sign a 32-byte event digest, returning the hex-encoded signature.
    fn sign(&self, digest: &[u8; 32]) -> Result<String, SigningError>;
}

/// BIP-340 Schnorr signer over secp256k1.
pub struct SchnorrSigner {
    secp: Secp256k1<All>,
    keypair: Keypair,
    public_key: String,
}

impl SchnorrSigner {
    /// Build a signer from raw 32-byte secret key material.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(SigningError::InvalidKey(format!(
                "expected {} bytes, got {}",
                SECRET_KEY_LEN,
                bytes.len()
            )));
        }
        let secret =
            SecretKey::from_slice(bytes).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &secret);
        let (x_only, _parity) = keypair.x_only_public_key();

        Ok(Self {
            secp,
            keypair,
            public_key: hex::encode(x_only.serialize()),
        })
    }

    /// Build a signer from 64 hex characters of secret key material.
    pub fn from_hex(secret: &str) -> Result<Self, SigningError> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| SigningError::InvalidKey(format!("not hex: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    /// Generate a fresh key from the given random source.
    ///
    /// Draws until the bytes form a valid scalar; invalid draws are
    /// astronomically rare.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        loop {
            let mut bytes = [0u8; SECRET_KEY_LEN];
            rng.fill(&mut bytes);
            if let Ok(signer) = Self::from_secret_bytes(&bytes) {
                return signer;
            }
        }
    }
}

impl Signer for SchnorrSigner {
    fn public_key(&self) -> &str {
        &self.public_key
    }

    fn sign(&self, digest: &[u8; 32]) -> Result<String, SigningError> {
        let message = Message::from_digest(*digest);
        let signature = self.secp.sign_schnorr_no_aux_rand(&message, &self.keypair);
        Ok(signature.to_string())
    }
}

/// Verify a hex Schnorr signature over a digest against a hex x-only key.
///
/// Malformed inputs verify as `false`.
pub fn verify_signature(public_key: &str, digest: &[u8; 32], signature: &str) -> bool {
    let Ok(key_bytes) = hex::decode(public_key) else {
        return false;
    };
    let Ok(key) = XOnlyPublicKey::from_slice(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(sig) = schnorr::Signature::from_slice(&sig_bytes) else {
        return false;
    };

    Secp256k1::verification_only()
        .verify_schnorr(&sig, &Message::from_digest(*digest), &key)
        .is_ok()
}

/// A participant: display name, public key and exclusive signing capability.
pub struct Identity {
    name: String,
    public_key: String,
    signer: Box<dyn Signer>,
}

impl Identity {
    /// Wrap an existing signer.
    pub fn new(name: impl Into<String>, signer: Box<dyn Signer>) -> Self {
        Self {
            name: name.into(),
            public_key: signer.public_key().to_string(),
            signer,
        }
    }

    /// Create an identity with a freshly generated Schnorr key.
    pub fn generate<R: Rng + ?Sized>(name: impl Into<String>, rng: &mut R) -> Self {
        Self::new(name, Box::new(SchnorrSigner::generate(rng)))
    }

    /// Create an identity from raw secret key bytes.
    pub fn from_secret_bytes(
        name: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self, SigningError> {
        Ok(Self::new(
            name,
            Box::new(SchnorrSigner::from_secret_bytes(bytes)?),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Sign a digest with this identity's key.
    pub fn sign(&self, digest: &[u8; 32]) -> Result<String, SigningError> {
        self.signer.sign(digest)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("public_key", &self.public_key)
            .field("signer", &"<Signer>")
            .finish()
    }
}
