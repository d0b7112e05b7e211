//! Configuration management
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML file, and `SRTP__`-prefixed environment variables
//! (`SRTP__NETWORK__REMOTE=10.0.0.2:40000`).

use std::net::SocketAddr;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::crypto_suite::CryptoSuite;
use crate::domain::shared::SrtpError;
use crate::domain::srtp_params::SrtpParams;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid base64 key for {direction}: {source}")]
    InvalidKey {
        direction: &'static str,
        source: base64::DecodeError,
    },

    #[error("No SRTP keys configured: set [srtp.rtp.send] and [srtp.rtp.recv] (see --generate-key)")]
    MissingKeys,

    #[error(transparent)]
    Srtp(#[from] SrtpError),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub srtp: SrtpConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub bind: SocketAddr,
    pub remote: SocketAddr,
    /// Interval between outgoing RTP packets
    pub packet_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrtpConfig {
    #[serde(default)]
    pub external_auth: bool,
    /// RTP keys; there is no built-in key material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtp: Option<KeyPairConfig>,
    /// Separate RTCP keys; RTCP uses the RTP keys when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtcp: Option<KeyPairConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPairConfig {
    pub send: KeyConfig,
    pub recv: KeyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    pub suite: CryptoSuite,
    /// Base64 master key followed by master salt
    pub key: String,
    #[serde(default)]
    pub encrypted_header_ids: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus scrape address; metrics stay off when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<SocketAddr>,
}

impl KeyConfig {
    pub fn new(suite: CryptoSuite, key: &[u8]) -> Self {
        Self {
            suite,
            key: STANDARD.encode(key),
            encrypted_header_ids: Vec::new(),
        }
    }

    fn to_params(&self, direction: &'static str) -> Result<SrtpParams, ConfigError> {
        let key = STANDARD
            .decode(self.key.trim())
            .map_err(|source| ConfigError::InvalidKey { direction, source })?;
        let params = SrtpParams::new(self.suite, key)
            .with_encrypted_header_ids(self.encrypted_header_ids.iter().copied());
        params.validate()?;
        Ok(params)
    }
}

impl KeyPairConfig {
    /// Decoded and validated (send, recv) parameters
    pub fn to_params(&self) -> Result<(SrtpParams, SrtpParams), ConfigError> {
        Ok((self.send.to_params("send")?, self.recv.to_params("recv")?))
    }
}

impl SrtpConfig {
    /// Decoded (send, recv) RTP parameters, failing when no keys are set
    pub fn rtp_params(&self) -> Result<(SrtpParams, SrtpParams), ConfigError> {
        self.rtp.as_ref().ok_or(ConfigError::MissingKeys)?.to_params()
    }
}

impl Config {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("SRTP")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                bind: SocketAddr::from(([127, 0, 0, 1], 40000)),
                remote: SocketAddr::from(([127, 0, 0, 1], 40002)),
                packet_interval_ms: 20,
            },
            srtp: SrtpConfig {
                external_auth: false,
                rtp: None,
                rtcp: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            metrics: MetricsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key_pair() -> KeyPairConfig {
        let suite = CryptoSuite::AesCm128HmacSha1_80;
        KeyPairConfig {
            send: KeyConfig::new(suite, b"123456789012345678901234567890"),
            recv: KeyConfig::new(suite, b"987654321098765432109876543210"),
        }
    }

    fn write_temp_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir()
            .join(format!("srtp-peer-{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_carry_no_keys() {
        let config = Config::default();
        assert!(config.srtp.rtp.is_none());
        assert!(matches!(config.srtp.rtp_params(), Err(ConfigError::MissingKeys)));

        let rendered = config.to_toml_string().unwrap();
        assert!(!rendered.contains("key ="));
    }

    #[test]
    fn test_file_without_srtp_section_has_no_keys() {
        let path = write_temp_config(
            "network-only",
            r#"
[network]
bind = "127.0.0.1:50000"
remote = "127.0.0.1:50002"
packet_interval_ms = 20
"#,
        );
        let config = Config::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(config.srtp.rtp.is_none());
        assert!(matches!(config.srtp.rtp_params(), Err(ConfigError::MissingKeys)));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        let mut keys = test_key_pair();
        keys.send.encrypted_header_ids = vec![1, 2];
        config.srtp.rtp = Some(keys);
        config.metrics.listen = Some("127.0.0.1:9100".parse().unwrap());

        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("AES_CM_128_HMAC_SHA1_80"));

        let parsed: Config = toml::from_str(&rendered).unwrap();
        let (send, recv) = parsed.srtp.rtp_params().unwrap();
        assert_eq!(send.encrypted_header_ids, vec![1, 2]);
        assert_eq!(recv.key, b"987654321098765432109876543210");
        assert_eq!(parsed.metrics.listen, config.metrics.listen);
        assert!(parsed.srtp.rtcp.is_none());
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let path = write_temp_config(
            "full",
            r#"
[network]
bind = "127.0.0.1:50000"
remote = "127.0.0.1:50002"
packet_interval_ms = 40

[srtp]
external_auth = true

[srtp.rtp.send]
suite = "AEAD_AES_128_GCM"
key = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVoxMg=="

[srtp.rtp.recv]
suite = "AEAD_AES_128_GCM"
key = "MjFaWVhXVlVUU1JRUE9OTUxLSklIR0ZFRENCQQ=="
"#,
        );

        let config = Config::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.network.packet_interval_ms, 40);
        assert!(config.srtp.external_auth);
        assert_eq!(config.logging.level, "info");

        let (send, recv) = config.srtp.rtp_params().unwrap();
        assert_eq!(send.key, b"ABCDEFGHIJKLMNOPQRSTUVWXYZ12");
        assert_eq!(recv.key, b"21ZYXWVUTSRQPONMLKJIHGFEDCBA");
    }

    #[test]
    fn test_bad_keys_rejected() {
        let mut pair = test_key_pair();
        pair.recv.key = "not base64!".to_string();
        assert!(matches!(
            pair.to_params(),
            Err(ConfigError::InvalidKey { direction: "recv", .. })
        ));

        pair.recv = KeyConfig::new(CryptoSuite::AeadAes256Gcm, b"too short");
        assert!(matches!(
            pair.to_params(),
            Err(ConfigError::Srtp(SrtpError::InvalidKeyLength { .. }))
        ));
    }
}
