//! SRTP key derivation and cipher primitives
//! RFC 3711 - The Secure Real-time Transport Protocol (SRTP)
//! RFC 7714 - AES-GCM Authenticated Encryption in SRTP

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::{Aes128, Aes256};
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce, Tag};
use ctr::Ctr128BE;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::domain::crypto_suite::CryptoSuite;
use crate::domain::shared::{Result, SrtpError};

type HmacSha1 = Hmac<Sha1>;
type Aes128Ctr = Ctr128BE<Aes128>;
type Aes256Ctr = Ctr128BE<Aes256>;

/// AES-GCM authentication tag length
pub const GCM_TAG_LEN: usize = 16;
/// Salt length used by the AES-CM PRF and the header extension keystream
const CM_SALT_LEN: usize = 14;

/// Key derivation label (RFC 3711 section 4.3.2, RFC 6904 section 4.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLabel {
    RtpEncryption = 0x00,
    RtpAuthentication = 0x01,
    RtpSalting = 0x02,
    RtcpEncryption = 0x03,
    RtcpAuthentication = 0x04,
    RtcpSalting = 0x05,
    RtpHeaderEncryption = 0x06,
    RtpHeaderSalting = 0x07,
}

/// AES-CM PRF with a key derivation rate of zero.
///
/// x = label || 0^48 XORed into the low 7 bytes of the (14 byte) master
/// salt; the keystream starting at IV = x * 2^16 is the derived key. Shorter
/// salts are zero padded on the right.
pub fn srtp_kdf(
    master_key: &[u8],
    master_salt: &[u8],
    label: KeyLabel,
    output_len: usize,
) -> Result<Vec<u8>> {
    let mut iv = [0u8; 16];
    let salt_len = master_salt.len().min(CM_SALT_LEN);
    iv[..salt_len].copy_from_slice(&master_salt[..salt_len]);
    iv[7] ^= label as u8;

    let mut out = vec![0u8; output_len];
    aes_ctr_apply(master_key, &iv, &mut out)?;
    Ok(out)
}

/// Session keys derived from one master key
#[derive(Clone)]
pub struct SessionKeys {
    pub rtp_cipher_key: Vec<u8>,
    /// Empty for AEAD suites
    pub rtp_auth_key: Vec<u8>,
    pub rtp_salt: Vec<u8>,
    pub rtcp_cipher_key: Vec<u8>,
    pub rtcp_auth_key: Vec<u8>,
    pub rtcp_salt: Vec<u8>,
    pub header_cipher_key: Vec<u8>,
    pub header_salt: Vec<u8>,
}

impl SessionKeys {
    pub fn derive(suite: CryptoSuite, master_key: &[u8], master_salt: &[u8]) -> Result<Self> {
        let key_len = suite.key_len();
        let auth_len = suite.auth_key_len();
        let salt_len = suite.salt_len();
        let kdf = |label, len| srtp_kdf(master_key, master_salt, label, len);

        Ok(Self {
            rtp_cipher_key: kdf(KeyLabel::RtpEncryption, key_len)?,
            rtp_auth_key: kdf(KeyLabel::RtpAuthentication, auth_len)?,
            rtp_salt: kdf(KeyLabel::RtpSalting, salt_len)?,
            rtcp_cipher_key: kdf(KeyLabel::RtcpEncryption, key_len)?,
            rtcp_auth_key: kdf(KeyLabel::RtcpAuthentication, auth_len)?,
            rtcp_salt: kdf(KeyLabel::RtcpSalting, salt_len)?,
            header_cipher_key: kdf(KeyLabel::RtpHeaderEncryption, key_len)?,
            header_salt: kdf(KeyLabel::RtpHeaderSalting, CM_SALT_LEN)?,
        })
    }
}

/// XOR the AES counter mode keystream starting at `iv` into `data`
pub fn aes_ctr_apply(key: &[u8], iv: &[u8; 16], data: &mut [u8]) -> Result<()> {
    match key.len() {
        16 => Aes128Ctr::new_from_slices(key, iv)
            .map_err(|_| SrtpError::Cipher("invalid AES-128 key"))?
            .apply_keystream(data),
        32 => Aes256Ctr::new_from_slices(key, iv)
            .map_err(|_| SrtpError::Cipher("invalid AES-256 key"))?
            .apply_keystream(data),
        _ => return Err(SrtpError::Cipher("unsupported AES key length")),
    }
    Ok(())
}

/// AES-CM IV: (salt * 2^16) XOR (SSRC * 2^64) XOR (index * 2^16)
pub fn aes_cm_iv(salt: &[u8], ssrc: u32, index: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    let salt_len = salt.len().min(CM_SALT_LEN);
    iv[..salt_len].copy_from_slice(&salt[..salt_len]);

    for (b, s) in iv[4..8].iter_mut().zip(ssrc.to_be_bytes()) {
        *b ^= s;
    }
    for (b, i) in iv[8..14].iter_mut().zip(&index.to_be_bytes()[2..]) {
        *b ^= i;
    }
    iv
}

/// RFC 7714 section 8.1: salt XOR (0x0000 || SSRC || ROC || SEQ)
pub fn gcm_rtp_iv(salt: &[u8], ssrc: u32, roc: u32, seq: u16) -> [u8; 12] {
    let mut iv = [0u8; 12];
    iv[2..6].copy_from_slice(&ssrc.to_be_bytes());
    iv[6..10].copy_from_slice(&roc.to_be_bytes());
    iv[10..12].copy_from_slice(&seq.to_be_bytes());
    xor_in_place(&mut iv, salt);
    iv
}

/// RFC 7714 section 9.1: salt XOR (0x0000 || SSRC || 0x0000 || 0 || SRTCP index)
pub fn gcm_rtcp_iv(salt: &[u8], ssrc: u32, index: u32) -> [u8; 12] {
    let mut iv = [0u8; 12];
    iv[2..6].copy_from_slice(&ssrc.to_be_bytes());
    iv[8..12].copy_from_slice(&(index & 0x7FFF_FFFF).to_be_bytes());
    xor_in_place(&mut iv, salt);
    iv
}

fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// HMAC-SHA1 over the concatenation of `parts`, truncated to `tag_len`
pub fn compute_auth_tag(auth_key: &[u8], parts: &[&[u8]], tag_len: usize) -> Result<Vec<u8>> {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(auth_key)
        .map_err(|_| SrtpError::Cipher("invalid HMAC key"))?;
    for part in parts {
        mac.update(part);
    }
    let full = mac.finalize().into_bytes();
    Ok(full[..tag_len.min(full.len())].to_vec())
}

/// Constant-time check of a truncated HMAC-SHA1 tag
pub fn verify_auth_tag(auth_key: &[u8], parts: &[&[u8]], tag: &[u8]) -> Result<()> {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(auth_key)
        .map_err(|_| SrtpError::Cipher("invalid HMAC key"))?;
    for part in parts {
        mac.update(part);
    }
    mac.verify_truncated_left(tag)
        .map_err(|_| SrtpError::AuthenticationFailed)
}

/// AES-GCM with either key size
pub enum GcmCipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl GcmCipher {
    pub fn new(key: &[u8]) -> Result<Self> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(Self::Aes128)
                .map_err(|_| SrtpError::Cipher("invalid AES-128-GCM key")),
            32 => Aes256Gcm::new_from_slice(key)
                .map(Self::Aes256)
                .map_err(|_| SrtpError::Cipher("invalid AES-256-GCM key")),
            _ => Err(SrtpError::Cipher("unsupported AES-GCM key length")),
        }
    }

    /// Encrypt `data` in place and return the detached tag
    pub fn seal(&self, iv: &[u8; 12], aad: &[u8], data: &mut [u8]) -> Result<[u8; GCM_TAG_LEN]> {
        let nonce = Nonce::from_slice(iv);
        let tag = match self {
            Self::Aes128(cipher) => cipher.encrypt_in_place_detached(nonce, aad, data),
            Self::Aes256(cipher) => cipher.encrypt_in_place_detached(nonce, aad, data),
        }
        .map_err(|_| SrtpError::Cipher("AES-GCM encryption failed"))?;

        let mut out = [0u8; GCM_TAG_LEN];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    /// Verify `tag` and decrypt `data` in place. `data` is untouched on failure.
    pub fn open(&self, iv: &[u8; 12], aad: &[u8], data: &mut [u8], tag: &[u8]) -> Result<()> {
        if tag.len() != GCM_TAG_LEN {
            return Err(SrtpError::AuthenticationFailed);
        }
        let nonce = Nonce::from_slice(iv);
        let tag = Tag::from_slice(tag);
        let result = match self {
            Self::Aes128(cipher) => cipher.decrypt_in_place_detached(nonce, aad, data, tag),
            Self::Aes256(cipher) => cipher.decrypt_in_place_detached(nonce, aad, data, tag),
        };
        result.map_err(|_| SrtpError::AuthenticationFailed)
    }
}
