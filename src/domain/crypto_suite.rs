//! Cipher suite registry
//!
//! Static knowledge of the SRTP protection profiles this crate can negotiate:
//! AES counter mode with a truncated HMAC-SHA1 tag (RFC 3711) and AES-GCM
//! (RFC 7714).

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::shared::SrtpError;

/// Every suite the registry knows, in order of preference.
pub const SUPPORTED_SUITES: [CryptoSuite; 4] = [
    CryptoSuite::AeadAes256Gcm,
    CryptoSuite::AeadAes128Gcm,
    CryptoSuite::AesCm128HmacSha1_80,
    CryptoSuite::AesCm128HmacSha1_32,
];

/// SRTP protection profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CryptoSuite {
    /// AES-128 counter mode, HMAC-SHA1 truncated to 80 bits
    #[serde(rename = "AES_CM_128_HMAC_SHA1_80")]
    AesCm128HmacSha1_80,
    /// AES-128 counter mode, HMAC-SHA1 truncated to 32 bits on RTP
    #[serde(rename = "AES_CM_128_HMAC_SHA1_32")]
    AesCm128HmacSha1_32,
    /// AES-128 GCM with a 128-bit tag
    #[serde(rename = "AEAD_AES_128_GCM")]
    AeadAes128Gcm,
    /// AES-256 GCM with a 128-bit tag
    #[serde(rename = "AEAD_AES_256_GCM")]
    AeadAes256Gcm,
}

impl CryptoSuite {
    /// Suite name as used in SDP crypto attributes
    pub fn name(&self) -> &'static str {
        match self {
            Self::AesCm128HmacSha1_80 => "AES_CM_128_HMAC_SHA1_80",
            Self::AesCm128HmacSha1_32 => "AES_CM_128_HMAC_SHA1_32",
            Self::AeadAes128Gcm => "AEAD_AES_128_GCM",
            Self::AeadAes256Gcm => "AEAD_AES_256_GCM",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        SUPPORTED_SUITES.iter().copied().find(|s| s.name() == name)
    }

    /// DTLS-SRTP protection profile identifier (RFC 5764, RFC 7714)
    pub fn id(&self) -> u16 {
        match self {
            Self::AesCm128HmacSha1_80 => 0x0001,
            Self::AesCm128HmacSha1_32 => 0x0002,
            Self::AeadAes128Gcm => 0x0007,
            Self::AeadAes256Gcm => 0x0008,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        SUPPORTED_SUITES.iter().copied().find(|s| s.id() == id)
    }

    /// Master key length in bytes
    pub fn key_len(&self) -> usize {
        match self {
            Self::AesCm128HmacSha1_80 | Self::AesCm128HmacSha1_32 | Self::AeadAes128Gcm => 16,
            Self::AeadAes256Gcm => 32,
        }
    }

    /// Master salt length in bytes
    pub fn salt_len(&self) -> usize {
        match self {
            Self::AesCm128HmacSha1_80 | Self::AesCm128HmacSha1_32 => 14,
            Self::AeadAes128Gcm | Self::AeadAes256Gcm => 12,
        }
    }

    /// Length of the combined key || salt material a peer must supply
    pub fn master_key_len(&self) -> usize {
        self.key_len() + self.salt_len()
    }

    /// Authentication tag appended to SRTP packets
    pub fn rtp_auth_tag_len(&self) -> usize {
        match self {
            Self::AesCm128HmacSha1_80 => 10,
            Self::AesCm128HmacSha1_32 => 4,
            Self::AeadAes128Gcm | Self::AeadAes256Gcm => 16,
        }
    }

    /// Authentication tag appended to SRTCP packets. The 32-bit suite keeps
    /// the full 80-bit tag here (RFC 5764 section 4.1.2).
    pub fn rtcp_auth_tag_len(&self) -> usize {
        match self {
            Self::AesCm128HmacSha1_80 | Self::AesCm128HmacSha1_32 => 10,
            Self::AeadAes128Gcm | Self::AeadAes256Gcm => 16,
        }
    }

    /// Session authentication key length; zero when the cipher carries its own tag
    pub fn auth_key_len(&self) -> usize {
        if self.is_aead() {
            0
        } else {
            20
        }
    }

    pub fn is_aead(&self) -> bool {
        matches!(self, Self::AeadAes128Gcm | Self::AeadAes256Gcm)
    }

    /// Generate random key || salt material for this suite
    pub fn generate_master_key(&self) -> Vec<u8> {
        let mut key = vec![0u8; self.master_key_len()];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }
}

impl Default for CryptoSuite {
    fn default() -> Self {
        Self::AesCm128HmacSha1_80
    }
}

impl fmt::Display for CryptoSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CryptoSuite {
    type Err = SrtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| SrtpError::UnsupportedSuite(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_geometry() {
        let cm80 = CryptoSuite::AesCm128HmacSha1_80;
        assert_eq!(cm80.master_key_len(), 30);
        assert_eq!(cm80.rtp_auth_tag_len(), 10);
        assert_eq!(cm80.auth_key_len(), 20);
        assert!(!cm80.is_aead());

        let cm32 = CryptoSuite::AesCm128HmacSha1_32;
        assert_eq!(cm32.master_key_len(), 30);
        assert_eq!(cm32.rtp_auth_tag_len(), 4);
        assert_eq!(cm32.rtcp_auth_tag_len(), 10);

        assert_eq!(CryptoSuite::AeadAes128Gcm.master_key_len(), 28);
        assert_eq!(CryptoSuite::AeadAes256Gcm.master_key_len(), 44);
        assert_eq!(CryptoSuite::AeadAes256Gcm.rtp_auth_tag_len(), 16);
        assert_eq!(CryptoSuite::AeadAes256Gcm.auth_key_len(), 0);
        assert!(CryptoSuite::AeadAes128Gcm.is_aead());
    }

    #[test]
    fn test_lookup_by_name_and_id() {
        for suite in SUPPORTED_SUITES {
            assert_eq!(CryptoSuite::from_name(suite.name()), Some(suite));
            assert_eq!(CryptoSuite::from_id(suite.id()), Some(suite));
            assert_eq!(suite.to_string().parse::<CryptoSuite>().unwrap(), suite);
        }

        assert_eq!(CryptoSuite::from_name("AES_CM_256_HMAC_SHA1_80"), None);
        assert_eq!(CryptoSuite::from_id(0x0005), None);
    }

    #[test]
    fn test_unknown_suite_is_configuration_error() {
        let err = "NULL_HMAC_SHA1_80".parse::<CryptoSuite>().unwrap_err();
        assert!(matches!(err, SrtpError::UnsupportedSuite(ref name) if name == "NULL_HMAC_SHA1_80"));
    }

    #[test]
    fn test_generate_master_key() {
        let a = CryptoSuite::AeadAes256Gcm.generate_master_key();
        let b = CryptoSuite::AeadAes256Gcm.generate_master_key();
        assert_eq!(a.len(), 44);
        assert_ne!(a, b);
    }

    #[test]
    fn test_serde_uses_suite_names() {
        let encoded = toml::to_string(&std::collections::BTreeMap::from([(
            "suite",
            CryptoSuite::AesCm128HmacSha1_32,
        )]))
        .unwrap();
        assert_eq!(encoded.trim(), "suite = \"AES_CM_128_HMAC_SHA1_32\"");
    }
}
