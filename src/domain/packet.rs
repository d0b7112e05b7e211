//! Packet metadata carried between the application, the secure transport
//! and the raw transport

use std::fmt;
use std::ops::BitOr;

/// Smallest datagram that can hold an RTP fixed header
pub const MIN_RTP_PACKET_LEN: usize = 12;
/// Smallest datagram that can hold an RTCP common header
pub const MIN_RTCP_PACKET_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Rtp,
    Rtcp,
}

impl PacketKind {
    /// Demultiplex RTP and RTCP sharing one channel (RFC 5761 section 4).
    ///
    /// RTCP packet types 192..=223 land in 64..=95 once the marker bit is
    /// masked off, a range no dynamic RTP payload type may use.
    pub fn classify(data: &[u8]) -> Option<Self> {
        if data.len() < MIN_RTCP_PACKET_LEN || data[0] >> 6 != 2 {
            return None;
        }

        let payload_type = data[1] & 0x7F;
        if (64..96).contains(&payload_type) {
            Some(Self::Rtcp)
        } else if data.len() >= MIN_RTP_PACKET_LEN {
            Some(Self::Rtp)
        } else {
            None
        }
    }

    pub fn is_rtcp(&self) -> bool {
        matches!(self, Self::Rtcp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rtp => "rtp",
            Self::Rtcp => "rtcp",
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Send flags passed through untouched to the raw transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags(u8);

impl PacketFlags {
    pub const NONE: Self = Self(0);
    /// Packet is already SRTP protected; the raw transport must not apply
    /// its own protection on top.
    pub const SRTP_BYPASS: Self = Self(0x01);
    /// Packet is a retransmission
    pub const RETRANSMISSION: Self = Self(0x02);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl BitOr for PacketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Material a downstream component needs to append the SRTP authentication
/// tag itself when external authentication is active.
#[derive(Clone, PartialEq, Eq)]
pub struct SrtpPacketAuth {
    pub auth_key: Vec<u8>,
    pub tag_len: usize,
    /// 48-bit SRTP packet index (ROC << 16 | SEQ)
    pub packet_index: u64,
}

impl SrtpPacketAuth {
    /// Rollover counter that goes into the authenticated portion
    pub fn roc(&self) -> u32 {
        (self.packet_index >> 16) as u32
    }
}

impl fmt::Debug for SrtpPacketAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrtpPacketAuth")
            .field("auth_key", &format_args!("<{} bytes>", self.auth_key.len()))
            .field("tag_len", &self.tag_len)
            .field("packet_index", &self.packet_index)
            .finish()
    }
}

/// Per-packet options handed down to the raw transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketOptions {
    /// DSCP value for the outgoing datagram
    pub dscp: Option<u8>,
    /// Application-assigned id echoed back in send notifications
    pub packet_id: Option<u64>,
    /// Filled in by the secure transport when the tag is deferred
    pub srtp_auth: Option<SrtpPacketAuth>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rtp() {
        let mut rtp = [0u8; 12];
        rtp[0] = 0x80;
        rtp[1] = 0x00; // PCMU
        assert_eq!(PacketKind::classify(&rtp), Some(PacketKind::Rtp));

        rtp[1] = 0x80 | 111; // marker + dynamic PT
        assert_eq!(PacketKind::classify(&rtp), Some(PacketKind::Rtp));
    }

    #[test]
    fn test_classify_rtcp() {
        // Sender report, receiver report and BYE
        for pt in [200u8, 201, 203] {
            let rtcp = [0x80, pt, 0x00, 0x01];
            assert_eq!(PacketKind::classify(&rtcp), Some(PacketKind::Rtcp));
        }
    }

    #[test]
    fn test_classify_rejects_garbage() {
        assert_eq!(PacketKind::classify(&[]), None);
        assert_eq!(PacketKind::classify(&[0x80, 0x00, 0x00]), None);
        // Version 1
        assert_eq!(PacketKind::classify(&[0x40, 200, 0x00, 0x01]), None);
        // Too short for RTP, not an RTCP type
        assert_eq!(PacketKind::classify(&[0x80, 0x00, 0x00, 0x01, 0x00]), None);
    }

    #[test]
    fn test_flags() {
        let flags = PacketFlags::SRTP_BYPASS | PacketFlags::RETRANSMISSION;
        assert!(flags.contains(PacketFlags::SRTP_BYPASS));
        assert!(flags.contains(PacketFlags::RETRANSMISSION));
        assert!(!PacketFlags::NONE.contains(PacketFlags::SRTP_BYPASS));
        assert_eq!(PacketFlags::default(), PacketFlags::NONE);
    }

    #[test]
    fn test_packet_auth_roc() {
        let auth = SrtpPacketAuth {
            auth_key: vec![0; 20],
            tag_len: 10,
            packet_index: (3 << 16) | 0xFFFE,
        };
        assert_eq!(auth.roc(), 3);
        assert!(format!("{:?}", auth).contains("<20 bytes>"));
    }
}
