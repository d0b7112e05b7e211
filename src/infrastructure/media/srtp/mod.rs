//! SRTP (Secure Real-time Transport Protocol) implementation
//! RFC 3711, RFC 6904, RFC 7714
//!
//! This module provides encryption and authentication for RTP and RTCP packets.

pub mod context;
pub mod crypto;
pub mod header_extension;
pub mod replay;
pub mod session;
pub mod srtcp;

use bytes::BytesMut;

pub use context::SrtpContext;
pub use crypto::SessionKeys;
pub use replay::{ReplayWindow, RolloverCounter};
pub use session::{AuthParams, CryptoSession};
pub use srtcp::SrtcpContext;

use crate::domain::packet::SrtpPacketAuth;
use crate::domain::shared::Result;

/// Append the RTP authentication tag to a packet that was protected with
/// external authentication active: HMAC-SHA1(auth key, packet || ROC).
pub fn complete_external_auth(packet: &mut BytesMut, auth: &SrtpPacketAuth) -> Result<()> {
    let tag = crypto::compute_auth_tag(
        &auth.auth_key,
        &[&packet[..], &auth.roc().to_be_bytes()],
        auth.tag_len,
    )?;
    packet.extend_from_slice(&tag);
    Ok(())
}
