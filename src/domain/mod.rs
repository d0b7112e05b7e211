//! Domain layer - Value types for secure media transport
//!
//! This layer contains:
//! - The cipher suite registry
//! - Negotiated per-direction SRTP parameters
//! - Packet metadata shared by the application and transport layers
//! - Shared error and result types

pub mod crypto_suite;
pub mod packet;
pub mod shared;
pub mod srtp_params;

// Re-export commonly used types
pub use crypto_suite::{CryptoSuite, SUPPORTED_SUITES};
pub use packet::{PacketFlags, PacketKind, PacketOptions, SrtpPacketAuth};
pub use shared::{ErrorKind, Result, SrtpError};
pub use srtp_params::SrtpParams;
