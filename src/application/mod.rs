//! Application layer - the secure transport service
//!
//! Ties the SRTP sessions to a raw packet transport: outbound packets are
//! classified, protected and sent; inbound datagrams are unprotected and
//! delivered to a single registered handler.

pub mod secure_transport;

pub use secure_transport::{PacketHandler, SecureTransport, TransportState};
