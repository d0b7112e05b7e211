//! Media packet handling: RTP framing and SRTP protection

pub mod rtp;
pub mod srtp;

pub use rtp::{RtcpHeader, RtpHeaderView, RtpPacket, RtpSession, SenderReport};
pub use srtp::{complete_external_auth, AuthParams, CryptoSession};
