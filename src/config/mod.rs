//! Run configuration.
//!
//! [`Config`] is the raw, serde-deserialized view loaded from YAML files and
//! environment variables. [`Config::resolve`] validates it into a typed
//! [`RunConfig`]; every validation failure is fatal and reported before
//! any relay is contacted.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::encoding::{decode_secret_key, NSEC_PREFIX};
use crate::identity::{SchnorrSigner, SECRET_KEY_LEN};
use crate::publish::SettlePolicy;
use crate::relay::is_supported_url;
use crate::topology::{Strategy, StrategyKind, DEFAULT_BRANCH_PROBABILITY};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "threadgen.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "THREADGEN_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "THREADGEN";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "THREADGEN_LOG";

/// Configuration errors. All of them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(String),

    #[error("No relays configured")]
    NoRelays,

    #[error("Unsupported relay URL '{0}' (expected ws://, wss:// or sim://)")]
    UnsupportedRelay(String),

    #[error("Branch probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    #[error("{replies} replies requested but no participants configured")]
    NoParticipants { replies: usize },

    #[error("Invalid root secret key: {0}")]
    InvalidKey(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl From<::config::ConfigError> for ConfigError {
    fn from(err: ::config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

/// Raw run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Relay endpoints (`ws://`, `wss://`, or `sim://<behavior>`).
    pub relays: Vec<String>,
    /// Number of generated participant identities.
    pub participants: usize,
    /// Number of threads (roots) per run.
    pub threads: usize,
    /// Replies scheduled per thread.
    pub replies: usize,
    pub strategy: StrategyKind,
    /// Probability of answering the root under `branch`.
    pub branch_probability: f64,
    /// Delay enforced between consecutive publishes.
    pub pacing_ms: u64,
    pub publish_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Hold after the last publish before teardown.
    pub drain_grace_ms: u64,
    /// Extra publish attempts for retryable failures.
    pub publish_retries: usize,
    pub settle: SettlePolicy,
    /// Seed for topology and content; random when unset.
    pub seed: Option<u64>,
    /// Fixed root identity key, hex or `nsec`.
    pub root_secret_key: Option<String>,
    /// Publish kind 0 profiles before the first thread.
    pub publish_profiles: bool,
    /// Relay hint written into e-tags; the first relay when unset.
    pub relay_hint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relays: Vec::new(),
            participants: 5,
            threads: 1,
            replies: 10,
            strategy: StrategyKind::default(),
            branch_probability: DEFAULT_BRANCH_PROBABILITY,
            pacing_ms: 1000,
            publish_timeout_ms: 5000,
            connect_timeout_ms: 5000,
            drain_grace_ms: 2000,
            publish_retries: 0,
            settle: SettlePolicy::default(),
            seed: None,
            root_secret_key: None,
            publish_profiles: true,
            relay_hint: None,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `threadgen.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            // THREADGEN__RELAYS=wss://a,wss://b
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("relays")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, File, FileFormat};

        let config = ConfigLib::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validate into a typed run configuration.
    pub fn resolve(&self) -> Result<RunConfig, ConfigError> {
        if self.relays.is_empty() {
            return Err(ConfigError::NoRelays);
        }
        if let Some(url) = self.relays.iter().find(|url| !is_supported_url(url)) {
            return Err(ConfigError::UnsupportedRelay(url.clone()));
        }
        if !(0.0..=1.0).contains(&self.branch_probability) {
            return Err(ConfigError::InvalidProbability(self.branch_probability));
        }
        if self.participants == 0 && self.replies > 0 {
            return Err(ConfigError::NoParticipants {
                replies: self.replies,
            });
        }
        if self.threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "threads",
                reason: "at least one thread is required".to_string(),
            });
        }
        if self.publish_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "publish_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }

        if self.strategy == StrategyKind::Alternating && self.participants > 1 {
            warn!(
                participants = self.participants,
                "Alternating strategy only pairs the root author with the first participant; the others never post"
            );
        }

        let root_secret_key = self
            .root_secret_key
            .as_deref()
            .map(SecretKey::parse)
            .transpose()?;

        Ok(RunConfig {
            relays: self.relays.clone(),
            participants: self.participants,
            threads: self.threads,
            replies: self.replies,
            strategy: Strategy::from_kind(self.strategy, self.branch_probability),
            pacing: Duration::from_millis(self.pacing_ms),
            publish_timeout: Duration::from_millis(self.publish_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            drain_grace: Duration::from_millis(self.drain_grace_ms),
            publish_retries: self.publish_retries,
            settle: self.settle,
            seed: self.seed,
            root_secret_key,
            publish_profiles: self.publish_profiles,
            relay_hint: self
                .relay_hint
                .clone()
                .or_else(|| self.relays.first().cloned()),
        })
    }
}

/// Validated run configuration consumed by the orchestrator.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub relays: Vec<String>,
    pub participants: usize,
    pub threads: usize,
    pub replies: usize,
    pub strategy: Strategy,
    pub pacing: Duration,
    pub publish_timeout: Duration,
    pub connect_timeout: Duration,
    pub drain_grace: Duration,
    pub publish_retries: usize,
    pub settle: SettlePolicy,
    pub seed: Option<u64>,
    pub root_secret_key: Option<SecretKey>,
    pub publish_profiles: bool,
    pub relay_hint: Option<String>,
}

/// Validated secp256k1 secret key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; SECRET_KEY_LEN]);

impl SecretKey {
    /// Parse 64-char hex or a bech32 `nsec`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        let bytes = if value.starts_with(NSEC_PREFIX) {
            decode_secret_key(value).map_err(|e| ConfigError::InvalidKey(e.to_string()))?
        } else {
            hex::decode(value).map_err(|e| ConfigError::InvalidKey(e.to_string()))?
        };

        let key: [u8; SECRET_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            ConfigError::InvalidKey(format!(
                "expected {} bytes, got {}",
                SECRET_KEY_LEN,
                bytes.len()
            ))
        })?;
        SchnorrSigner::from_secret_bytes(&key)
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}
