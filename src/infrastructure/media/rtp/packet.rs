//! RTP Packet Implementation (RFC 3550)

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::domain::shared::SrtpError;

/// RTP Packet Structure
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       sequence number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           synchronization source (SSRC) identifier            |
/// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// |            contributing source (CSRC) identifiers             |
/// |                             ....                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// Marker bit
    pub marker: bool,
    /// Payload type
    pub payload_type: u8,
    /// Sequence number
    pub sequence: u16,
    /// Timestamp
    pub timestamp: u32,
    /// Synchronization source identifier
    pub ssrc: u32,
    /// Contributing source identifiers
    pub csrc: Vec<u32>,
    /// Header extension profile and data, data padded to a 32-bit boundary
    pub extension: Option<(u16, Bytes)>,
    /// Payload data
    pub payload: Bytes,
}

impl RtpPacket {
    /// Minimum RTP header size (without CSRC or extension)
    pub const MIN_HEADER_SIZE: usize = 12;

    /// Create a new RTP packet
    pub fn new(payload_type: u8, sequence: u16, timestamp: u32, ssrc: u32, payload: Bytes) -> Self {
        Self {
            marker: false,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            csrc: Vec::new(),
            extension: None,
            payload,
        }
    }

    /// Parse RTP packet from bytes. Padding, if any, stays in the payload.
    pub fn parse(data: &[u8]) -> Result<Self, RtpError> {
        let header = RtpHeaderView::parse(data)?;
        let mut buf = &data[..];

        let byte0 = buf.get_u8();
        let csrc_count = (byte0 & 0x0F) as usize;

        // Byte 1: M(1), PT(7)
        let byte1 = buf.get_u8();
        let sequence = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        let csrc = (0..csrc_count).map(|_| buf.get_u32()).collect();

        let extension = header.extension.map(|ext| {
            (
                ext.profile,
                Bytes::copy_from_slice(&data[ext.data_offset..ext.data_offset + ext.data_len]),
            )
        });

        Ok(Self {
            marker: (byte1 & 0x80) != 0,
            payload_type: byte1 & 0x7F,
            sequence,
            timestamp,
            ssrc,
            csrc,
            extension,
            payload: Bytes::copy_from_slice(&data[header.header_len..]),
        })
    }

    /// Serialize into a buffer with `reserve` bytes of spare capacity, so an
    /// SRTP tag can be appended without reallocating.
    pub fn serialize_with_reserve(&self, reserve: usize) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size() + reserve);

        // Byte 0: V(2), P(1), X(1), CC(4)
        let byte0 = (2 << 6) | ((self.extension.is_some() as u8) << 4) | (self.csrc.len() as u8 & 0x0F);
        buf.put_u8(byte0);

        // Byte 1: M(1), PT(7)
        buf.put_u8(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);

        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }

        if let Some((profile, data)) = &self.extension {
            buf.put_u16(*profile);
            buf.put_u16((data.len() / 4) as u16); // Length in 32-bit words
            buf.put_slice(data);
        }

        buf.put_slice(&self.payload);
        buf
    }

    /// Serialize RTP packet to bytes
    pub fn serialize(&self) -> Bytes {
        self.serialize_with_reserve(0).freeze()
    }

    /// Total packet size
    pub fn size(&self) -> usize {
        let ext_len = self.extension.as_ref().map_or(0, |(_, data)| 4 + data.len());
        Self::MIN_HEADER_SIZE + self.csrc.len() * 4 + ext_len + self.payload.len()
    }

    /// Set marker bit
    pub fn set_marker(&mut self, marker: bool) {
        self.marker = marker;
    }

    /// Add CSRC (at most 15)
    pub fn add_csrc(&mut self, csrc: u32) {
        if self.csrc.len() < 15 {
            self.csrc.push(csrc);
        }
    }

    /// Set extension; `data` must already be padded to a multiple of four bytes
    pub fn set_extension(&mut self, profile: u16, data: Bytes) {
        self.extension = Some((profile, data));
    }
}

impl fmt::Display for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RTP[PT={}, Seq={}, TS={}, SSRC={:08x}, Marker={}, Payload={}]",
            self.payload_type,
            self.sequence,
            self.timestamp,
            self.ssrc,
            self.marker,
            self.payload.len()
        )
    }
}

/// Location of the header extension block inside a serialized packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionRange {
    pub profile: u16,
    /// Offset of the first extension data byte (after profile and length)
    pub data_offset: usize,
    pub data_len: usize,
}

/// Zero-copy view of the fields SRTP needs from an RTP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeaderView {
    pub sequence: u16,
    pub ssrc: u32,
    /// Fixed header + CSRC list + extension block
    pub header_len: usize,
    pub extension: Option<ExtensionRange>,
}

impl RtpHeaderView {
    pub fn parse(data: &[u8]) -> Result<Self, RtpError> {
        if data.len() < RtpPacket::MIN_HEADER_SIZE {
            return Err(RtpError::PacketTooShort);
        }

        let version = data[0] >> 6;
        if version != 2 {
            return Err(RtpError::InvalidVersion(version));
        }

        let has_extension = (data[0] & 0x10) != 0;
        let csrc_count = (data[0] & 0x0F) as usize;
        let sequence = u16::from_be_bytes([data[2], data[3]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut header_len = RtpPacket::MIN_HEADER_SIZE + csrc_count * 4;
        if data.len() < header_len {
            return Err(RtpError::PacketTooShort);
        }

        let extension = if has_extension {
            if data.len() < header_len + 4 {
                return Err(RtpError::PacketTooShort);
            }
            let profile = u16::from_be_bytes([data[header_len], data[header_len + 1]]);
            let data_len = u16::from_be_bytes([data[header_len + 2], data[header_len + 3]]) as usize * 4;
            let data_offset = header_len + 4;
            header_len = data_offset + data_len;
            if data.len() < header_len {
                return Err(RtpError::PacketTooShort);
            }
            Some(ExtensionRange {
                profile,
                data_offset,
                data_len,
            })
        } else {
            None
        };

        Ok(Self {
            sequence,
            ssrc,
            header_len,
            extension,
        })
    }
}

/// RTP errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RtpError {
    #[error("Packet too short")]
    PacketTooShort,
    #[error("Invalid version: {0}")]
    InvalidVersion(u8),
}

impl From<RtpError> for SrtpError {
    fn from(err: RtpError) -> Self {
        SrtpError::MalformedPacket(format!("RTP: {}", err))
    }
}
