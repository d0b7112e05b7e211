//! Encryption of selected RTP header extension elements (RFC 6904)
//!
//! A keystream covering the whole extension data block is generated with the
//! header extension session key and salt. Only the data bytes of elements
//! whose id is in the negotiated set are XORed; element headers, padding and
//! the remaining elements stay in the clear. The operation is its own inverse.

use super::crypto::{aes_cm_iv, aes_ctr_apply};
use crate::domain::shared::Result;
use crate::infrastructure::media::rtp::extension::parse_elements;
use crate::infrastructure::media::rtp::packet::RtpHeaderView;

pub struct HeaderExtensionCipher {
    key: Vec<u8>,
    salt: Vec<u8>,
    ids: Vec<u8>,
}

impl HeaderExtensionCipher {
    pub fn new(key: Vec<u8>, salt: Vec<u8>, mut ids: Vec<u8>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self { key, salt, ids }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ids.is_empty()
    }

    /// XOR the keystream for packet `index` into the selected elements
    pub fn apply(&self, packet: &mut [u8], header: &RtpHeaderView, index: u64) -> Result<()> {
        let Some(ext) = header.extension else {
            return Ok(());
        };
        if !self.is_enabled() {
            return Ok(());
        }

        let block = &mut packet[ext.data_offset..ext.data_offset + ext.data_len];
        let selected: Vec<_> = parse_elements(ext.profile, block)
            .into_iter()
            .filter(|e| self.ids.binary_search(&e.id).is_ok())
            .collect();
        if selected.is_empty() {
            return Ok(());
        }

        let mut keystream = vec![0u8; block.len()];
        let iv = aes_cm_iv(&self.salt, header.ssrc, index);
        aes_ctr_apply(&self.key, &iv, &mut keystream)?;

        for element in selected {
            let range = element.offset..element.offset + element.len;
            for (b, k) in block[range.clone()].iter_mut().zip(&keystream[range]) {
                *b ^= k;
            }
        }

        Ok(())
    }
}
