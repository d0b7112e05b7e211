//! RTCP (RTP Control Protocol) common header and the few reports the
//! peer emits (RFC 3550 section 6)

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::shared::SrtpError;

/// Fixed part every SRTCP transform leaves in the clear: common header
/// plus sender SSRC.
pub const RTCP_HEADER_LEN: usize = 8;

/// RTCP Packet Type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RtcpPacketType {
    /// Sender Report
    SR = 200,
    /// Receiver Report
    RR = 201,
    /// Source Description
    SDES = 202,
    /// Goodbye
    BYE = 203,
    /// Application Defined
    APP = 204,
}

impl RtcpPacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            200 => Some(Self::SR),
            201 => Some(Self::RR),
            202 => Some(Self::SDES),
            203 => Some(Self::BYE),
            204 => Some(Self::APP),
            _ => None,
        }
    }
}

/// First packet header of a (possibly compound) RTCP datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpHeader {
    pub count: u8,
    pub packet_type: u8,
    /// Length in 32-bit words minus one
    pub length: u16,
    pub ssrc: u32,
}

impl RtcpHeader {
    pub fn parse(data: &[u8]) -> Result<Self, RtcpError> {
        if data.len() < RTCP_HEADER_LEN {
            return Err(RtcpError::PacketTooShort);
        }

        let mut buf = &data[..];
        let byte0 = buf.get_u8();
        let version = byte0 >> 6;
        if version != 2 {
            return Err(RtcpError::InvalidVersion(version));
        }

        Ok(Self {
            count: byte0 & 0x1F,
            packet_type: buf.get_u8(),
            length: buf.get_u16(),
            ssrc: buf.get_u32(),
        })
    }

    pub fn kind(&self) -> Option<RtcpPacketType> {
        RtcpPacketType::from_u8(self.packet_type)
    }
}

/// Sender Report (SR) without reception report blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    pub ssrc: u32,
    pub ntp_timestamp: u64,
    pub rtp_timestamp: u32,
    pub packet_count: u32,
    pub octet_count: u32,
}

impl SenderReport {
    const LEN: usize = 28;

    pub fn new(ssrc: u32, rtp_timestamp: u32, packet_count: u32, octet_count: u32) -> Self {
        Self {
            ssrc,
            ntp_timestamp: ntp_now(),
            rtp_timestamp,
            packet_count,
            octet_count,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, RtcpError> {
        let header = RtcpHeader::parse(data)?;
        if header.kind() != Some(RtcpPacketType::SR) {
            return Err(RtcpError::UnsupportedPacketType(header.packet_type));
        }
        if data.len() < Self::LEN {
            return Err(RtcpError::PacketTooShort);
        }

        let mut buf = &data[RTCP_HEADER_LEN..];
        Ok(Self {
            ssrc: header.ssrc,
            ntp_timestamp: buf.get_u64(),
            rtp_timestamp: buf.get_u32(),
            packet_count: buf.get_u32(),
            octet_count: buf.get_u32(),
        })
    }

    /// Serialize with `reserve` bytes of spare capacity for the SRTCP trailer
    pub fn serialize_with_reserve(&self, reserve: usize) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::LEN + reserve);

        buf.put_u8(0x80);
        buf.put_u8(RtcpPacketType::SR as u8);
        buf.put_u16((Self::LEN / 4 - 1) as u16);
        buf.put_u32(self.ssrc);
        buf.put_u64(self.ntp_timestamp);
        buf.put_u32(self.rtp_timestamp);
        buf.put_u32(self.packet_count);
        buf.put_u32(self.octet_count);

        buf
    }

    pub fn serialize(&self) -> Bytes {
        self.serialize_with_reserve(0).freeze()
    }
}

/// Goodbye (BYE) for a single source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goodbye {
    pub ssrc: u32,
}

impl Goodbye {
    pub fn new(ssrc: u32) -> Self {
        Self { ssrc }
    }

    pub fn serialize_with_reserve(&self, reserve: usize) -> BytesMut {
        let mut buf = BytesMut::with_capacity(RTCP_HEADER_LEN + reserve);
        buf.put_u8(0x81);
        buf.put_u8(RtcpPacketType::BYE as u8);
        buf.put_u16(1);
        buf.put_u32(self.ssrc);
        buf
    }
}

/// Receiver Report (RR)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub reports: Vec<ReceptionReport>,
}

impl ReceiverReport {
    const MAX_REPORTS: usize = 31;

    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            reports: Vec::new(),
        }
    }

    /// Returns false once the 5-bit report count is exhausted
    pub fn add_report(&mut self, report: ReceptionReport) -> bool {
        if self.reports.len() >= Self::MAX_REPORTS {
            return false;
        }
        self.reports.push(report);
        true
    }

    pub fn parse(data: &[u8]) -> Result<Self, RtcpError> {
        let header = RtcpHeader::parse(data)?;
        if header.kind() != Some(RtcpPacketType::RR) {
            return Err(RtcpError::UnsupportedPacketType(header.packet_type));
        }
        let len = (header.length as usize + 1) * 4;
        let needed = RTCP_HEADER_LEN + header.count as usize * ReceptionReport::LEN;
        if data.len() < len || len < needed {
            return Err(RtcpError::PacketTooShort);
        }

        let mut buf = &data[RTCP_HEADER_LEN..len];
        let reports = (0..header.count)
            .map(|_| ReceptionReport::parse_from_buf(&mut buf))
            .collect();

        Ok(Self {
            ssrc: header.ssrc,
            reports,
        })
    }

    pub fn len(&self) -> usize {
        RTCP_HEADER_LEN + self.reports.len() * ReceptionReport::LEN
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Serialize with `reserve` bytes of spare capacity for the SRTCP trailer
    pub fn serialize_with_reserve(&self, reserve: usize) -> BytesMut {
        let len = self.len();
        let mut buf = BytesMut::with_capacity(len + reserve);

        buf.put_u8(0x80 | (self.reports.len() as u8 & 0x1F));
        buf.put_u8(RtcpPacketType::RR as u8);
        buf.put_u16((len / 4 - 1) as u16);
        buf.put_u32(self.ssrc);

        for report in &self.reports {
            report.serialize_into_buf(&mut buf);
        }

        buf
    }

    pub fn serialize(&self) -> Bytes {
        self.serialize_with_reserve(0).freeze()
    }
}

/// Reception Report Block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceptionReport {
    pub ssrc: u32,
    pub fraction_lost: u8,
    /// 24-bit cumulative packet loss
    pub cumulative_lost: u32,
    pub highest_seq: u32,
    pub jitter: u32,
    pub lsr: u32,  // Last SR timestamp
    pub dlsr: u32, // Delay since last SR
}

impl ReceptionReport {
    const LEN: usize = 24;

    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            ..Default::default()
        }
    }

    fn parse_from_buf(buf: &mut &[u8]) -> Self {
        let ssrc = buf.get_u32();
        let lost = buf.get_u32();

        Self {
            ssrc,
            fraction_lost: (lost >> 24) as u8,
            cumulative_lost: lost & 0x00FF_FFFF,
            highest_seq: buf.get_u32(),
            jitter: buf.get_u32(),
            lsr: buf.get_u32(),
            dlsr: buf.get_u32(),
        }
    }

    fn serialize_into_buf(&self, buf: &mut BytesMut) {
        buf.put_u32(self.ssrc);
        buf.put_u32(((self.fraction_lost as u32) << 24) | (self.cumulative_lost & 0x00FF_FFFF));
        buf.put_u32(self.highest_seq);
        buf.put_u32(self.jitter);
        buf.put_u32(self.lsr);
        buf.put_u32(self.dlsr);
    }
}

/// NTP timestamp (seconds since 1900 in the high word)
fn ntp_now() -> u64 {
    const NTP_EPOCH_OFFSET: u64 = 2_208_988_800;

    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let seconds = duration.as_secs() + NTP_EPOCH_OFFSET;
    let fraction = ((duration.subsec_nanos() as u64) << 32) / 1_000_000_000;

    (seconds << 32) | fraction
}

/// RTCP Errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RtcpError {
    #[error("Packet too short")]
    PacketTooShort,
    #[error("Invalid version: {0}")]
    InvalidVersion(u8),
    #[error("Unsupported packet type: {0}")]
    UnsupportedPacketType(u8),
}

impl From<RtcpError> for SrtpError {
    fn from(err: RtcpError) -> Self {
        SrtpError::MalformedPacket(format!("RTCP: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_report() {
        let sr = SenderReport::new(0x12345678, 1000, 100, 16000);
        let data = sr.serialize();
        assert_eq!(data.len(), 28);

        let parsed = SenderReport::parse(&data).unwrap();
        assert_eq!(parsed, sr);
    }

    #[test]
    fn test_header() {
        let data = Goodbye::new(0x11223344).serialize_with_reserve(0);
        let header = RtcpHeader::parse(&data).unwrap();

        assert_eq!(header.count, 1);
        assert_eq!(header.kind(), Some(RtcpPacketType::BYE));
        assert_eq!(header.length, 1);
        assert_eq!(header.ssrc, 0x11223344);
    }

    #[test]
    fn test_receiver_report() {
        let mut rr = ReceiverReport::new(0xCAFEBABE);
        assert!(rr.is_empty());
        rr.add_report(ReceptionReport {
            ssrc: 0x01020304,
            fraction_lost: 12,
            cumulative_lost: 0x00ABCDEF,
            highest_seq: 70_000,
            jitter: 42,
            lsr: 0x11112222,
            dlsr: 65536,
        });
        rr.add_report(ReceptionReport::new(0x05060708));

        let data = rr.serialize();
        assert_eq!(data.len(), 8 + 2 * 24);
        assert_eq!(data[0], 0x82);
        assert_eq!(&data[12..16], &[12, 0xAB, 0xCD, 0xEF]);

        let header = RtcpHeader::parse(&data).unwrap();
        assert_eq!(header.kind(), Some(RtcpPacketType::RR));
        assert_eq!(header.length, 13);

        assert_eq!(ReceiverReport::parse(&data).unwrap(), rr);
    }

    #[test]
    fn test_receiver_report_limits() {
        let mut rr = ReceiverReport::new(1);
        for i in 0..31 {
            assert!(rr.add_report(ReceptionReport::new(i)));
        }
        assert!(!rr.add_report(ReceptionReport::new(99)));
        assert_eq!(rr.reports.len(), 31);

        // Count claims one block but the length only covers the header
        let mut data = ReceiverReport::new(1).serialize().to_vec();
        data[0] = 0x81;
        assert_eq!(ReceiverReport::parse(&data), Err(RtcpError::PacketTooShort));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(RtcpHeader::parse(&[0x80, 200, 0, 6]), Err(RtcpError::PacketTooShort));

        let mut data = SenderReport::new(1, 0, 0, 0).serialize().to_vec();
        data[0] = 0x40;
        assert_eq!(SenderReport::parse(&data), Err(RtcpError::InvalidVersion(1)));

        let bye = Goodbye::new(1).serialize_with_reserve(0);
        assert_eq!(
            SenderReport::parse(&bye),
            Err(RtcpError::UnsupportedPacketType(203))
        );
    }
}
