//! Crypto session: one direction's SRTP and SRTCP state under one set of
//! negotiated parameters

use bytes::BytesMut;
use tracing::{debug, warn};

use super::context::SrtpContext;
use super::crypto::SessionKeys;
use super::srtcp::SrtcpContext;
use crate::domain::crypto_suite::CryptoSuite;
use crate::domain::packet::PacketKind;
use crate::domain::shared::{Result, SrtpError};
use crate::domain::srtp_params::SrtpParams;

/// Borrowed material for computing SRTP tags outside this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthParams<'a> {
    pub auth_key: &'a [u8],
    pub tag_len: usize,
}

struct Configured {
    suite: CryptoSuite,
    srtp: SrtpContext,
    srtcp: SrtcpContext,
}

/// Protects or unprotects one direction of traffic.
///
/// Created empty and configured exactly once; a second `configure` is
/// refused and leaves the first configuration in place.
pub struct CryptoSession {
    name: &'static str,
    state: Option<Configured>,
    external_auth: bool,
}

impl CryptoSession {
    /// `name` only labels log lines ("send", "recv", ...)
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: None,
            external_auth: false,
        }
    }

    pub fn configure(&mut self, params: &SrtpParams) -> Result<()> {
        if self.state.is_some() {
            warn!("{} crypto session already configured", self.name);
            return Err(SrtpError::AlreadyConfigured);
        }
        params.validate()?;

        let keys = SessionKeys::derive(params.suite, params.master_key(), params.master_salt())?;
        self.state = Some(Configured {
            suite: params.suite,
            srtp: SrtpContext::new(params.suite, &keys, params.encrypted_header_ids.clone())?,
            srtcp: SrtcpContext::new(params.suite, &keys)?,
        });

        debug!(
            "{} crypto session configured: suite={}, encrypted header ids={:?}",
            self.name, params.suite, params.encrypted_header_ids
        );
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.state.is_some()
    }

    pub fn suite(&self) -> Option<CryptoSuite> {
        self.state.as_ref().map(|s| s.suite)
    }

    /// Defer RTP tag computation to the caller. Has no effect on RTCP or
    /// on AEAD suites.
    pub fn set_external_auth(&mut self, enabled: bool) {
        self.external_auth = enabled;
    }

    /// True when RTP packets leave `protect` without a tag
    pub fn is_external_auth_active(&self) -> bool {
        self.external_auth && self.state.as_ref().is_some_and(|s| !s.suite.is_aead())
    }

    fn configured(&mut self) -> Result<&mut Configured> {
        self.state.as_mut().ok_or(SrtpError::NotConfigured)
    }

    /// Protect in place. Returns the SRTP packet index (RTP) or SRTCP
    /// index (RTCP).
    pub fn protect(&mut self, packet: &mut BytesMut, kind: PacketKind) -> Result<u64> {
        match kind {
            PacketKind::Rtp => self.protect_rtp(packet),
            PacketKind::Rtcp => self.protect_rtcp(packet).map(u64::from),
        }
    }

    pub fn unprotect(&mut self, packet: &mut BytesMut, kind: PacketKind) -> Result<()> {
        match kind {
            PacketKind::Rtp => self.unprotect_rtp(packet),
            PacketKind::Rtcp => self.unprotect_rtcp(packet),
        }
    }

    pub fn protect_rtp(&mut self, packet: &mut BytesMut) -> Result<u64> {
        let append_tag = !self.is_external_auth_active();
        self.configured()?.srtp.protect(packet, append_tag)
    }

    pub fn unprotect_rtp(&mut self, packet: &mut BytesMut) -> Result<()> {
        self.configured()?.srtp.unprotect(packet)
    }

    pub fn protect_rtcp(&mut self, packet: &mut BytesMut) -> Result<u32> {
        self.configured()?.srtcp.protect(packet)
    }

    pub fn unprotect_rtcp(&mut self, packet: &mut BytesMut) -> Result<()> {
        self.configured()?.srtcp.unprotect(packet)
    }

    /// RTP authentication tag length, 0 when unconfigured. Reported even
    /// when external authentication leaves the tag to someone else.
    pub fn rtp_overhead(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.srtp.tag_len())
    }

    /// SRTCP trailer plus tag, 0 when unconfigured
    pub fn rtcp_overhead(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.srtcp.overhead())
    }

    /// RTP authentication key and tag length for external authentication
    pub fn auth_params(&self) -> Result<AuthParams<'_>> {
        let state = self.state.as_ref().ok_or(SrtpError::NotConfigured)?;
        let auth_key = state
            .srtp
            .auth_key()
            .ok_or(SrtpError::ExternalAuthUnavailable("AEAD suites carry their own tag"))?;

        Ok(AuthParams {
            auth_key,
            tag_len: state.srtp.tag_len(),
        })
    }
}

impl std::fmt::Debug for CryptoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoSession")
            .field("name", &self.name)
            .field("suite", &self.suite())
            .field("external_auth", &self.external_auth)
            .finish()
    }
}
