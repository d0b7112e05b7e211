//! Infrastructure layer - packet formats, cryptography and I/O
//!
//! Everything that touches bytes on the wire lives here: RTP/RTCP parsing,
//! the SRTP transforms, and the datagram transports underneath.

pub mod media;
pub mod transport;
