//! SRTP context for protecting and unprotecting RTP packets

use std::collections::HashMap;

use bytes::BytesMut;
use tracing::{trace, warn};

use super::crypto::{
    aes_cm_iv, aes_ctr_apply, compute_auth_tag, gcm_rtp_iv, verify_auth_tag, GcmCipher,
    SessionKeys, GCM_TAG_LEN,
};
use super::header_extension::HeaderExtensionCipher;
use super::replay::{ReplayWindow, RolloverCounter};
use crate::domain::crypto_suite::CryptoSuite;
use crate::domain::shared::{Result, SrtpError};
use crate::infrastructure::media::rtp::packet::RtpHeaderView;

/// Payload transform selected by the suite
enum RtpCipher {
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

/// Per-SSRC index state
#[derive(Debug, Default)]
struct StreamState {
    rollover: RolloverCounter,
    replay: ReplayWindow,
}

/// SRTP context for one direction
pub struct SrtpContext {
    cipher: RtpCipher,
    header_cipher: HeaderExtensionCipher,
    streams: HashMap<u32, StreamState>,
}

impl SrtpContext {
    pub fn new(suite: CryptoSuite, keys: &SessionKeys, encrypted_header_ids: Vec<u8>) -> Result<Self> {
        let cipher = if suite.is_aead() {
            RtpCipher::Gcm {
                cipher: GcmCipher::new(&keys.rtp_cipher_key)?,
                salt: keys.rtp_salt.clone(),
            }
        } else {
            RtpCipher::AesCm {
                key: keys.rtp_cipher_key.clone(),
                salt: keys.rtp_salt.clone(),
                auth_key: keys.rtp_auth_key.clone(),
                tag_len: suite.rtp_auth_tag_len(),
            }
        };

        Ok(Self {
            cipher,
            header_cipher: HeaderExtensionCipher::new(
                keys.header_cipher_key.clone(),
                keys.header_salt.clone(),
                encrypted_header_ids,
            ),
            streams: HashMap::new(),
        })
    }

    /// Bytes appended by `protect`
    pub fn tag_len(&self) -> usize {
        match &self.cipher {
            RtpCipher::AesCm { tag_len, .. } => *tag_len,
            RtpCipher::Gcm { .. } => GCM_TAG_LEN,
        }
    }

    /// HMAC key, absent for AEAD suites
    pub fn auth_key(&self) -> Option<&[u8]> {
        match &self.cipher {
            RtpCipher::AesCm { auth_key, .. } => Some(auth_key),
            RtpCipher::Gcm { .. } => None,
        }
    }

    /// Encrypt `packet` in place and append the tag unless `append_tag` is
    /// false (external authentication; ignored for AEAD). Returns the packet
    /// index used.
    ///
    /// The buffer must already have spare capacity for the tag. Repeating a
    /// sequence number under one key is logged but not refused.
    pub fn protect(&mut self, packet: &mut BytesMut, append_tag: bool) -> Result<u64> {
        let header = RtpHeaderView::parse(packet)?;
        let tag_len = match self.cipher {
            RtpCipher::AesCm { .. } if !append_tag => 0,
            _ => self.tag_len(),
        };
        let available = packet.capacity() - packet.len();
        if available < tag_len {
            return Err(SrtpError::BufferTooSmall {
                needed: tag_len,
                available,
            });
        }

        let stream = self.streams.entry(header.ssrc).or_default();
        let index = stream.rollover.estimate(header.sequence);
        match stream.replay.contains(index) {
            Some(true) => warn!(
                "keystream reuse: SSRC {:08x} protected index {} more than once",
                header.ssrc, index
            ),
            None => warn!(
                "SSRC {:08x} protected index {} below the reuse window (highest {}), reuse unchecked",
                header.ssrc,
                index,
                stream.replay.highest().unwrap_or_default()
            ),
            Some(false) => {}
        }
        stream.replay.update(index);
        stream.rollover.update(index);
        let roc = (index >> 16) as u32;

        self.header_cipher.apply(packet, &header, index)?;

        match &self.cipher {
            RtpCipher::AesCm {
                key,
                salt,
                auth_key,
                tag_len,
            } => {
                let iv = aes_cm_iv(salt, header.ssrc, index);
                aes_ctr_apply(key, &iv, &mut packet[header.header_len..])?;
                if append_tag {
                    let tag =
                        compute_auth_tag(auth_key, &[&packet[..], &roc.to_be_bytes()], *tag_len)?;
                    packet.extend_from_slice(&tag);
                }
            }
            RtpCipher::Gcm { cipher, salt } => {
                let iv = gcm_rtp_iv(salt, header.ssrc, roc, header.sequence);
                let (aad, payload) = packet.split_at_mut(header.header_len);
                let tag = cipher.seal(&iv, aad, payload)?;
                packet.extend_from_slice(&tag);
            }
        }

        trace!("Protected RTP ssrc={:08x} index={}", header.ssrc, index);
        Ok(index)
    }

    /// Authenticate, decrypt and strip the tag. On failure the packet
    /// contents are unspecified and the stream state is unchanged.
    pub fn unprotect(&mut self, packet: &mut BytesMut) -> Result<()> {
        let header = RtpHeaderView::parse(packet)?;
        let tag_len = self.tag_len();
        if packet.len() < header.header_len + tag_len {
            return Err(SrtpError::PacketTooShort(packet.len()));
        }

        let index = self
            .streams
            .get(&header.ssrc)
            .map_or(header.sequence as u64, |s| s.rollover.estimate(header.sequence));
        if let Some(stream) = self.streams.get(&header.ssrc) {
            if !stream.replay.check(index) {
                return Err(SrtpError::ReplayDetected {
                    ssrc: header.ssrc,
                    index,
                });
            }
        }
        let roc = (index >> 16) as u32;
        let body_end = packet.len() - tag_len;

        match &self.cipher {
            RtpCipher::AesCm {
                key,
                salt,
                auth_key,
                ..
            } => {
                let (authenticated, tag) = packet.split_at(body_end);
                verify_auth_tag(auth_key, &[authenticated, &roc.to_be_bytes()], tag)?;
                packet.truncate(body_end);

                let iv = aes_cm_iv(salt, header.ssrc, index);
                aes_ctr_apply(key, &iv, &mut packet[header.header_len..])?;
            }
            RtpCipher::Gcm { cipher, salt } => {
                let iv = gcm_rtp_iv(salt, header.ssrc, roc, header.sequence);
                let (sealed, tag) = packet.split_at_mut(body_end);
                let (aad, payload) = sealed.split_at_mut(header.header_len);
                cipher.open(&iv, aad, payload, tag)?;
                packet.truncate(body_end);
            }
        }

        self.header_cipher.apply(packet, &header, index)?;

        let stream = self.streams.entry(header.ssrc).or_default();
        stream.replay.update(index);
        stream.rollover.update(index);

        trace!("Unprotected RTP ssrc={:08x} index={}", header.ssrc, index);
        Ok(())
    }

    /// Current rollover counter for `ssrc`
    pub fn roc(&self, ssrc: u32) -> Option<u32> {
        self.streams.get(&ssrc).map(|s| s.rollover.roc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::media::rtp::packet::RtpPacket;
    use bytes::Bytes;

    fn contexts(suite: CryptoSuite) -> (SrtpContext, SrtpContext) {
        let master = vec![0x5Au8; suite.master_key_len()];
        let (key, salt) = master.split_at(suite.key_len());
        let keys = SessionKeys::derive(suite, key, salt).unwrap();
        (
            SrtpContext::new(suite, &keys, Vec::new()).unwrap(),
            SrtpContext::new(suite, &keys, Vec::new()).unwrap(),
        )
    }

    fn create_test_rtp_packet(ssrc: u32, seq: u16) -> BytesMut {
        RtpPacket::new(0, seq, 160 * seq as u32, ssrc, Bytes::from_static(&[0xAB; 160]))
            .serialize_with_reserve(GCM_TAG_LEN)
    }

    #[test]
    fn test_protect_unprotect_all_suites() {
        for suite in crate::domain::SUPPORTED_SUITES {
            let (mut tx, mut rx) = contexts(suite);
            let original = create_test_rtp_packet(0x12345678, 1000);
            let mut packet = original.clone();

            tx.protect(&mut packet, true).unwrap();
            assert_eq!(packet.len(), original.len() + suite.rtp_auth_tag_len());
            assert_eq!(packet[..12], original[..12]);
            assert_ne!(packet[12..original.len()], original[12..]);

            rx.unprotect(&mut packet).unwrap();
            assert_eq!(packet, original, "{}", suite);
        }
    }

    #[test]
    fn test_buffer_without_room_for_tag() {
        let (mut tx, _) = contexts(CryptoSuite::AesCm128HmacSha1_80);
        let original = create_test_rtp_packet(1, 1);
        let mut packet = BytesMut::with_capacity(original.len());
        packet.extend_from_slice(&original);
        assert_eq!(packet.capacity(), packet.len());

        let err = tx.protect(&mut packet, true).unwrap_err();
        assert!(matches!(
            err,
            SrtpError::BufferTooSmall {
                needed: 10,
                available: 0
            }
        ));
        assert_eq!(packet, original);

        // Without a tag no room is needed
        tx.protect(&mut packet, false).unwrap();
        assert_eq!(packet.len(), original.len());
    }

    #[test]
    fn test_tampered_packet_rejected() {
        for suite in [CryptoSuite::AesCm128HmacSha1_32, CryptoSuite::AeadAes128Gcm] {
            let (mut tx, mut rx) = contexts(suite);
            let mut packet = create_test_rtp_packet(7, 42);
            tx.protect(&mut packet, true).unwrap();

            let mut tampered = packet.clone();
            tampered[20] ^= 0x01;
            assert!(matches!(
                rx.unprotect(&mut tampered),
                Err(SrtpError::AuthenticationFailed)
            ));

            // The genuine packet still goes through afterwards
            rx.unprotect(&mut packet).unwrap();
        }
    }

    #[test]
    fn test_replay_rejected() {
        let (mut tx, mut rx) = contexts(CryptoSuite::AesCm128HmacSha1_80);
        let mut packet = create_test_rtp_packet(7, 42);
        tx.protect(&mut packet, true).unwrap();

        let mut first = packet.clone();
        rx.unprotect(&mut first).unwrap();

        let mut replay = packet.clone();
        assert!(matches!(
            rx.unprotect(&mut replay),
            Err(SrtpError::ReplayDetected { ssrc: 7, index: 42 })
        ));
    }

    #[test]
    fn test_duplicate_sequence_is_still_protected() {
        let (mut tx, _) = contexts(CryptoSuite::AesCm128HmacSha1_80);
        let mut first = create_test_rtp_packet(7, 42);
        let mut second = create_test_rtp_packet(7, 42);

        assert_eq!(tx.protect(&mut first, true).unwrap(), 42);
        assert_eq!(tx.protect(&mut second, true).unwrap(), 42);
        // Same key, same index: identical output, which is why reuse is a caller error
        assert_eq!(first, second);
    }

    #[test]
    fn test_old_unused_index_is_protected() {
        let (mut tx, mut rx) = contexts(CryptoSuite::AesCm128HmacSha1_80);
        for seq in [200u16, 100] {
            let original = create_test_rtp_packet(3, seq);
            let mut packet = original.clone();
            assert_eq!(tx.protect(&mut packet, true).unwrap(), seq as u64);
            assert_ne!(packet[12..original.len()], original[12..]);
        }
        // 100 was never used, it only fell below the window
        let stream = &tx.streams[&3];
        assert_eq!(stream.replay.contains(200), Some(true));
        assert_eq!(stream.replay.contains(100), None);

        let mut packet = create_test_rtp_packet(3, 201);
        tx.protect(&mut packet, true).unwrap();
        rx.unprotect(&mut packet).unwrap();
    }

    #[test]
    fn test_rollover_across_wrap() {
        let (mut tx, mut rx) = contexts(CryptoSuite::AeadAes256Gcm);
        for seq in [65534u16, 65535, 0, 1] {
            let original = create_test_rtp_packet(9, seq);
            let mut packet = original.clone();
            tx.protect(&mut packet, true).unwrap();
            rx.unprotect(&mut packet).unwrap();
            assert_eq!(packet, original);
        }
        assert_eq!(tx.roc(9), Some(1));
        assert_eq!(rx.roc(9), Some(1));
    }

    #[test]
    fn test_short_packet() {
        let (_, mut rx) = contexts(CryptoSuite::AesCm128HmacSha1_80);
        let mut packet = create_test_rtp_packet(1, 1);
        packet.truncate(15);
        assert!(matches!(
            rx.unprotect(&mut packet),
            Err(SrtpError::PacketTooShort(15))
        ));
    }
}
