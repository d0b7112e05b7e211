//! SRTCP (Secure RTCP) implementation
//! RFC 3711 Section 3.4, RFC 7714 Section 9

use std::collections::HashMap;

use bytes::BytesMut;
use tracing::{trace, warn};

use super::crypto::{
    aes_cm_iv, aes_ctr_apply, compute_auth_tag, gcm_rtcp_iv, verify_auth_tag, GcmCipher,
    SessionKeys, GCM_TAG_LEN,
};
use super::replay::ReplayWindow;
use crate::domain::crypto_suite::CryptoSuite;
use crate::domain::shared::{Result, SrtpError};
use crate::infrastructure::media::rtp::rtcp::{RtcpHeader, RTCP_HEADER_LEN};

/// Length of the E flag || SRTCP index trailer
pub const SRTCP_INDEX_LEN: usize = 4;
const E_FLAG: u32 = 0x8000_0000;
const INDEX_MASK: u32 = 0x7FFF_FFFF;

enum RtcpCipher {
    AesCm {
        key: Vec<u8>,
        salt: Vec<u8>,
        auth_key: Vec<u8>,
        tag_len: usize,
    },
    Gcm {
        cipher: GcmCipher,
        salt: Vec<u8>,
    },
}

/// SRTCP context for one direction
pub struct SrtcpContext {
    cipher: RtcpCipher,
    /// Index for the next outbound packet; past `INDEX_MASK` the key is spent
    next_index: u64,
    /// Per-SSRC replay windows over received SRTCP indices
    replay: HashMap<u32, ReplayWindow>,
}

impl SrtcpContext {
    pub fn new(suite: CryptoSuite, keys: &SessionKeys) -> Result<Self> {
        let cipher = if suite.is_aead() {
            RtcpCipher::Gcm {
                cipher: GcmCipher::new(&keys.rtcp_cipher_key)?,
                salt: keys.rtcp_salt.clone(),
            }
        } else {
            RtcpCipher::AesCm {
                key: keys.rtcp_cipher_key.clone(),
                salt: keys.rtcp_salt.clone(),
                auth_key: keys.rtcp_auth_key.clone(),
                tag_len: suite.rtcp_auth_tag_len(),
            }
        };

        Ok(Self {
            cipher,
            next_index: 0,
            replay: HashMap::new(),
        })
    }

    fn tag_len(&self) -> usize {
        match &self.cipher {
            RtcpCipher::AesCm { tag_len, .. } => *tag_len,
            RtcpCipher::Gcm { .. } => GCM_TAG_LEN,
        }
    }

    /// Bytes appended by `protect`: index trailer plus tag
    pub fn overhead(&self) -> usize {
        SRTCP_INDEX_LEN + self.tag_len()
    }

    /// Encrypt everything after the first eight octets, then append the
    /// E || index trailer and the tag. Returns the SRTCP index used.
    ///
    /// Fails with `KeyExpired` once all 2^31 indices have been used.
    ///
    /// Output layout:
    /// - AES-CM: header | ciphertext | E||index | tag
    /// - AES-GCM: header | ciphertext | tag | E||index
    pub fn protect(&mut self, packet: &mut BytesMut) -> Result<u32> {
        let header = RtcpHeader::parse(packet)?;
        let needed = self.overhead();
        let available = packet.capacity() - packet.len();
        if available < needed {
            return Err(SrtpError::BufferTooSmall { needed, available });
        }

        if self.next_index > INDEX_MASK as u64 {
            warn!(
                "SRTCP index space exhausted for SSRC {:08x}, refusing to protect",
                header.ssrc
            );
            return Err(SrtpError::KeyExpired);
        }
        let index = self.next_index as u32;
        self.next_index += 1;
        let trailer = (E_FLAG | index).to_be_bytes();

        match &self.cipher {
            RtcpCipher::AesCm {
                key,
                salt,
                auth_key,
                tag_len,
            } => {
                let iv = aes_cm_iv(salt, header.ssrc, index as u64);
                aes_ctr_apply(key, &iv, &mut packet[RTCP_HEADER_LEN..])?;
                packet.extend_from_slice(&trailer);
                let tag = compute_auth_tag(auth_key, &[&packet[..]], *tag_len)?;
                packet.extend_from_slice(&tag);
            }
            RtcpCipher::Gcm { cipher, salt } => {
                let iv = gcm_rtcp_iv(salt, header.ssrc, index);
                let mut aad = [0u8; RTCP_HEADER_LEN + SRTCP_INDEX_LEN];
                aad[..RTCP_HEADER_LEN].copy_from_slice(&packet[..RTCP_HEADER_LEN]);
                aad[RTCP_HEADER_LEN..].copy_from_slice(&trailer);

                let tag = cipher.seal(&iv, &aad, &mut packet[RTCP_HEADER_LEN..])?;
                packet.extend_from_slice(&tag);
                packet.extend_from_slice(&trailer);
            }
        }

        trace!("Protected RTCP ssrc={:08x} index={}", header.ssrc, index);
        Ok(index)
    }

    /// Verify, decrypt and strip trailer and tag. Packets sent with the E
    /// flag clear are authenticated only.
    pub fn unprotect(&mut self, packet: &mut BytesMut) -> Result<()> {
        let header = RtcpHeader::parse(packet)?;
        let overhead = self.overhead();
        if packet.len() < RTCP_HEADER_LEN + overhead {
            return Err(SrtpError::PacketTooShort(packet.len()));
        }

        let trailer_offset = match self.cipher {
            RtcpCipher::AesCm { tag_len, .. } => packet.len() - tag_len - SRTCP_INDEX_LEN,
            RtcpCipher::Gcm { .. } => packet.len() - SRTCP_INDEX_LEN,
        };
        let trailer: [u8; SRTCP_INDEX_LEN] = [
            packet[trailer_offset],
            packet[trailer_offset + 1],
            packet[trailer_offset + 2],
            packet[trailer_offset + 3],
        ];
        let word = u32::from_be_bytes(trailer);
        let encrypted = word & E_FLAG != 0;
        let index = word & INDEX_MASK;

        if let Some(window) = self.replay.get(&header.ssrc) {
            if !window.check(index as u64) {
                return Err(SrtpError::ReplayDetected {
                    ssrc: header.ssrc,
                    index: index as u64,
                });
            }
        }

        let body_end = packet.len() - overhead;
        match &self.cipher {
            RtcpCipher::AesCm {
                key,
                salt,
                auth_key,
                tag_len,
            } => {
                let tag_offset = packet.len() - tag_len;
                let (authenticated, tag) = packet.split_at(tag_offset);
                verify_auth_tag(auth_key, &[authenticated], tag)?;
                packet.truncate(body_end);

                if encrypted {
                    let iv = aes_cm_iv(salt, header.ssrc, index as u64);
                    aes_ctr_apply(key, &iv, &mut packet[RTCP_HEADER_LEN..])?;
                }
            }
            RtcpCipher::Gcm { cipher, salt } => {
                let iv = gcm_rtcp_iv(salt, header.ssrc, index);
                let (sealed, rest) = packet.split_at_mut(body_end);
                let tag = &rest[..GCM_TAG_LEN];

                if encrypted {
                    let mut aad = [0u8; RTCP_HEADER_LEN + SRTCP_INDEX_LEN];
                    aad[..RTCP_HEADER_LEN].copy_from_slice(&sealed[..RTCP_HEADER_LEN]);
                    aad[RTCP_HEADER_LEN..].copy_from_slice(&trailer);
                    cipher.open(&iv, &aad, &mut sealed[RTCP_HEADER_LEN..], tag)?;
                } else {
                    // Whole packet is associated data, nothing to decrypt
                    let mut aad = Vec::with_capacity(body_end + SRTCP_INDEX_LEN);
                    aad.extend_from_slice(sealed);
                    aad.extend_from_slice(&trailer);
                    cipher.open(&iv, &aad, &mut [], tag)?;
                }
                packet.truncate(body_end);
            }
        }

        self.replay.entry(header.ssrc).or_default().update(index as u64);

        trace!(
            "Unprotected RTCP ssrc={:08x} index={} encrypted={}",
            header.ssrc,
            index,
            encrypted
        );
        Ok(())
    }
}
