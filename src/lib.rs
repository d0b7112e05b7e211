//! srtp-transport - SRTP/SRTCP secure transport for RTP media
//!
//! Protects outgoing RTP and RTCP packets (RFC 3711, RFC 7714, RFC 6904)
//! before they reach a raw datagram transport, and authenticates and
//! decrypts incoming ones before delivering them to the application.
//!
//! Layout follows the usual layering: `domain` holds suite and packet
//! value types, `infrastructure` the wire formats, crypto and transports,
//! `application` the [`SecureTransport`] service.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use application::{SecureTransport, TransportState};
pub use domain::shared::error::SrtpError;
pub use domain::shared::result::Result;
pub use domain::{CryptoSuite, PacketFlags, PacketKind, PacketOptions, SrtpParams};
