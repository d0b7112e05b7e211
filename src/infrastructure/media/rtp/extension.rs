//! RTP header extension elements (RFC 8285)
//!
//! Only element boundaries are of interest here: SRTP header extension
//! encryption (RFC 6904) needs to know which bytes belong to which id.

use bytes::{BufMut, Bytes, BytesMut};

/// One-byte header profile
pub const ONE_BYTE_PROFILE: u16 = 0xBEDE;
/// Two-byte header profile, low four bits are application bits
pub const TWO_BYTE_PROFILE: u16 = 0x1000;
const TWO_BYTE_PROFILE_MASK: u16 = 0xFFF0;

/// Id that terminates one-byte element parsing
const ONE_BYTE_STOP_ID: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionProfile {
    OneByte,
    TwoByte,
}

impl ExtensionProfile {
    pub fn from_u16(profile: u16) -> Option<Self> {
        if profile == ONE_BYTE_PROFILE {
            Some(Self::OneByte)
        } else if profile & TWO_BYTE_PROFILE_MASK == TWO_BYTE_PROFILE {
            Some(Self::TwoByte)
        } else {
            None
        }
    }
}

/// Position of one element's data inside the extension data block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionElement {
    pub id: u8,
    pub offset: usize,
    pub len: usize,
}

/// Walk the elements of an extension block. Unknown profiles yield nothing;
/// a truncated trailing element ends the walk.
pub fn parse_elements(profile: u16, data: &[u8]) -> Vec<ExtensionElement> {
    let mut elements = Vec::new();
    let mut pos = 0;

    match ExtensionProfile::from_u16(profile) {
        Some(ExtensionProfile::OneByte) => {
            while pos < data.len() {
                let byte = data[pos];
                if byte == 0 {
                    pos += 1;
                    continue;
                }
                let id = byte >> 4;
                if id == ONE_BYTE_STOP_ID {
                    break;
                }
                let len = (byte & 0x0F) as usize + 1;
                pos += 1;
                if pos + len > data.len() {
                    break;
                }
                elements.push(ExtensionElement { id, offset: pos, len });
                pos += len;
            }
        }
        Some(ExtensionProfile::TwoByte) => {
            while pos < data.len() {
                let id = data[pos];
                if id == 0 {
                    pos += 1;
                    continue;
                }
                if pos + 1 >= data.len() {
                    break;
                }
                let len = data[pos + 1] as usize;
                pos += 2;
                if pos + len > data.len() {
                    break;
                }
                elements.push(ExtensionElement { id, offset: pos, len });
                pos += len;
            }
        }
        None => {}
    }

    elements
}

/// Builds an extension data block, padded to a 32-bit boundary
#[derive(Debug, Clone)]
pub struct HeaderExtensionBuilder {
    profile: ExtensionProfile,
    buf: BytesMut,
}

impl HeaderExtensionBuilder {
    pub fn one_byte() -> Self {
        Self {
            profile: ExtensionProfile::OneByte,
            buf: BytesMut::new(),
        }
    }

    pub fn two_byte() -> Self {
        Self {
            profile: ExtensionProfile::TwoByte,
            buf: BytesMut::new(),
        }
    }

    /// Append an element. One-byte elements take ids 1..=14 and 1..=16 data
    /// bytes; anything outside that range is skipped.
    pub fn push(mut self, id: u8, data: &[u8]) -> Self {
        match self.profile {
            ExtensionProfile::OneByte => {
                if (1..ONE_BYTE_STOP_ID).contains(&id) && (1..=16).contains(&data.len()) {
                    self.buf.put_u8((id << 4) | (data.len() as u8 - 1));
                    self.buf.put_slice(data);
                }
            }
            ExtensionProfile::TwoByte => {
                if id != 0 && data.len() <= u8::MAX as usize {
                    self.buf.put_u8(id);
                    self.buf.put_u8(data.len() as u8);
                    self.buf.put_slice(data);
                }
            }
        }
        self
    }

    /// Profile value and padded data, ready for `RtpPacket::set_extension`
    pub fn build(mut self) -> (u16, Bytes) {
        while self.buf.len() % 4 != 0 {
            self.buf.put_u8(0);
        }
        let profile = match self.profile {
            ExtensionProfile::OneByte => ONE_BYTE_PROFILE,
            ExtensionProfile::TwoByte => TWO_BYTE_PROFILE,
        };
        (profile, self.buf.freeze())
    }
}
