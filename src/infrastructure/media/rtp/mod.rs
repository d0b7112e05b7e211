//! RTP (Real-time Transport Protocol) Implementation
//!
//! Header parsing and packet building per RFC 3550, as far as SRTP needs
//! them.

pub mod extension;
pub mod packet;
pub mod rtcp;
pub mod session;

pub use extension::{parse_elements, ExtensionElement, HeaderExtensionBuilder};
pub use packet::{ExtensionRange, RtpError, RtpHeaderView, RtpPacket};
pub use rtcp::{
    Goodbye, ReceiverReport, ReceptionReport, RtcpError, RtcpHeader, RtcpPacketType, SenderReport,
    RTCP_HEADER_LEN,
};
pub use session::RtpSession;
