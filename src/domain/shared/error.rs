//! Secure transport errors

use thiserror::Error;

use crate::domain::crypto_suite::CryptoSuite;

/// Coarse classification of a failure, used by callers that only care about
/// which stage rejected a packet or a configuration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    NotActive,
    Crypto,
    Classification,
    Transport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::NotActive => "not_active",
            Self::Crypto => "crypto",
            Self::Classification => "classification",
            Self::Transport => "transport",
        }
    }
}

#[derive(Error, Debug)]
pub enum SrtpError {
    #[error("Unsupported crypto suite: {0}")]
    UnsupportedSuite(String),

    #[error("Invalid key length for {suite}: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        suite: CryptoSuite,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid header extension id: {0}")]
    InvalidHeaderExtensionId(u8),

    #[error("Crypto session already configured")]
    AlreadyConfigured,

    #[error("External authentication unavailable: {0}")]
    ExternalAuthUnavailable(&'static str),

    #[error("Crypto session not configured")]
    NotConfigured,

    #[error("Secure transport is not active")]
    NotActive,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Replayed packet for SSRC {ssrc:08x} at index {index}")]
    ReplayDetected { ssrc: u32, index: u64 },

    #[error("Key expired: packet index space exhausted")]
    KeyExpired,

    #[error("Buffer too small: need {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Packet too short: {0} bytes")]
    PacketTooShort(usize),

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Cipher error: {0}")]
    Cipher(&'static str),

    #[error("Packet is neither RTP nor RTCP")]
    Unclassifiable,

    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl SrtpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedSuite(_)
            | Self::InvalidKeyLength { .. }
            | Self::InvalidHeaderExtensionId(_)
            | Self::AlreadyConfigured
            | Self::ExternalAuthUnavailable(_) => ErrorKind::Configuration,
            Self::NotConfigured | Self::NotActive => ErrorKind::NotActive,
            Self::AuthenticationFailed
            | Self::ReplayDetected { .. }
            | Self::KeyExpired
            | Self::BufferTooSmall { .. }
            | Self::PacketTooShort(_)
            | Self::MalformedPacket(_)
            | Self::Cipher(_) => ErrorKind::Crypto,
            Self::Unclassifiable => ErrorKind::Classification,
            Self::Io(_) => ErrorKind::Transport,
        }
    }
}
