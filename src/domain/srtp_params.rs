//! Negotiated SRTP parameters for one direction

use std::fmt;

use super::crypto_suite::CryptoSuite;
use super::shared::{Result, SrtpError};

/// Suite, key material and encrypted header extension ids agreed for one
/// direction of one stream (RTP or RTCP).
#[derive(Clone, PartialEq, Eq)]
pub struct SrtpParams {
    pub suite: CryptoSuite,
    /// Master key followed by master salt
    pub key: Vec<u8>,
    /// RTP header extension ids whose data is encrypted (RFC 6904)
    pub encrypted_header_ids: Vec<u8>,
}

impl SrtpParams {
    pub fn new(suite: CryptoSuite, key: impl Into<Vec<u8>>) -> Self {
        Self {
            suite,
            key: key.into(),
            encrypted_header_ids: Vec::new(),
        }
    }

    pub fn with_encrypted_header_ids(mut self, ids: impl IntoIterator<Item = u8>) -> Self {
        self.encrypted_header_ids = ids.into_iter().collect();
        self.encrypted_header_ids.sort_unstable();
        self.encrypted_header_ids.dedup();
        self
    }

    /// Check key length against the suite and reject the reserved extension id 0
    pub fn validate(&self) -> Result<()> {
        let expected = self.suite.master_key_len();
        if self.key.len() != expected {
            return Err(SrtpError::InvalidKeyLength {
                suite: self.suite,
                expected,
                actual: self.key.len(),
            });
        }

        if let Some(&id) = self.encrypted_header_ids.iter().find(|&&id| id == 0) {
            return Err(SrtpError::InvalidHeaderExtensionId(id));
        }

        Ok(())
    }

    pub fn master_key(&self) -> &[u8] {
        &self.key[..self.suite.key_len().min(self.key.len())]
    }

    pub fn master_salt(&self) -> &[u8] {
        &self.key[self.suite.key_len().min(self.key.len())..]
    }
}

impl fmt::Debug for SrtpParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrtpParams")
            .field("suite", &self.suite)
            .field("key", &format_args!("<{} bytes>", self.key.len()))
            .field("encrypted_header_ids", &self.encrypted_header_ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_30: &[u8] = b"123456789012345678901234567890";

    #[test]
    fn test_validate_key_length() {
        let params = SrtpParams::new(CryptoSuite::AesCm128HmacSha1_80, KEY_30);
        assert!(params.validate().is_ok());
        assert_eq!(params.master_key().len(), 16);
        assert_eq!(params.master_salt().len(), 14);

        let short = SrtpParams::new(CryptoSuite::AesCm128HmacSha1_80, &KEY_30[..29]);
        assert!(matches!(
            short.validate(),
            Err(SrtpError::InvalidKeyLength { expected: 30, actual: 29, .. })
        ));

        let gcm = SrtpParams::new(CryptoSuite::AeadAes128Gcm, KEY_30);
        assert!(gcm.validate().is_err());
    }

    #[test]
    fn test_header_ids_are_normalized() {
        let params = SrtpParams::new(CryptoSuite::AesCm128HmacSha1_80, KEY_30)
            .with_encrypted_header_ids([4, 1, 4, 2]);
        assert_eq!(params.encrypted_header_ids, vec![1, 2, 4]);

        let reserved = SrtpParams::new(CryptoSuite::AesCm128HmacSha1_80, KEY_30)
            .with_encrypted_header_ids([0, 1]);
        assert!(matches!(
            reserved.validate(),
            Err(SrtpError::InvalidHeaderExtensionId(0))
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let params = SrtpParams::new(CryptoSuite::AesCm128HmacSha1_80, KEY_30);
        let debug = format!("{:?}", params);
        assert!(debug.contains("<30 bytes>"));
        assert!(!debug.contains("1234567890"));
    }
}
