//! Secure transport: SRTP/SRTCP protection layered on a raw packet transport

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace, warn};

use crate::domain::packet::{PacketFlags, PacketKind, PacketOptions, SrtpPacketAuth};
use crate::domain::shared::{Result, SrtpError};
use crate::domain::srtp_params::SrtpParams;
use crate::infrastructure::media::srtp::{AuthParams, CryptoSession};
use crate::infrastructure::transport::PacketTransport;
use crate::interface::metrics;

/// Receives every packet that passed authentication, already decrypted
pub type PacketHandler = Box<dyn FnMut(PacketKind, Bytes) + Send>;

/// Configuration progress of the RTP session pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Uninitialized,
    SendConfigured,
    ReceiveConfigured,
    Active,
}

/// Send and receive sessions for one of RTP or RTCP
#[derive(Debug)]
struct SessionPair {
    send: CryptoSession,
    recv: CryptoSession,
}

impl SessionPair {
    fn new(send_name: &'static str, recv_name: &'static str) -> Self {
        Self {
            send: CryptoSession::new(send_name),
            recv: CryptoSession::new(recv_name),
        }
    }

    /// Both sides or neither: every check that can fail runs before either
    /// session is touched.
    fn configure(&mut self, send: &SrtpParams, recv: &SrtpParams) -> Result<()> {
        if self.send.is_configured() || self.recv.is_configured() {
            return Err(SrtpError::AlreadyConfigured);
        }
        send.validate()?;
        recv.validate()?;

        self.send.configure(send)?;
        self.recv.configure(recv)
    }

    fn is_active(&self) -> bool {
        self.send.is_configured() && self.recv.is_configured()
    }
}

/// Protects outbound RTP/RTCP before handing it to `T` and unprotects
/// inbound datagrams before passing them to the registered handler.
///
/// Driven from a single task; nothing in here blocks or locks.
///
/// Every RTP packet sent under one configuration must carry a sequence
/// number (per SSRC, extended by the rollover counter) that was never sent
/// before. Repeating one reuses keystream. The transport logs a repeat but
/// does not refuse or rewrite it.
pub struct SecureTransport<T: PacketTransport> {
    transport: T,
    rtp: SessionPair,
    rtcp: SessionPair,
    external_auth: bool,
    handler: Option<PacketHandler>,
}

impl<T: PacketTransport> SecureTransport<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            rtp: SessionPair::new("rtp-send", "rtp-recv"),
            rtcp: SessionPair::new("rtcp-send", "rtcp-recv"),
            external_auth: false,
            handler: None,
        }
    }

    /// Configure both RTP directions. Fails without changing anything if
    /// either side is invalid or RTP was configured before.
    pub fn set_rtp_params(&mut self, send: &SrtpParams, recv: &SrtpParams) -> Result<()> {
        if let Err(e) = self.rtp.configure(send, recv) {
            warn!("Failed to configure SRTP for RTP: {}", e);
            return Err(e);
        }
        info!(
            "SRTP active for RTP: send suite {}, recv suite {}",
            send.suite, recv.suite
        );
        Ok(())
    }

    /// Configure a separate RTCP key pair. Without one, RTCP is protected
    /// with the RTP sessions.
    pub fn set_rtcp_params(&mut self, send: &SrtpParams, recv: &SrtpParams) -> Result<()> {
        if let Err(e) = self.rtcp.configure(send, recv) {
            warn!("Failed to configure SRTP for RTCP: {}", e);
            return Err(e);
        }
        info!(
            "SRTP active for RTCP: send suite {}, recv suite {}",
            send.suite, recv.suite
        );
        Ok(())
    }

    pub fn set_rtp_send_params(&mut self, params: &SrtpParams) -> Result<()> {
        self.rtp.send.configure(params)
    }

    pub fn set_rtp_recv_params(&mut self, params: &SrtpParams) -> Result<()> {
        self.rtp.recv.configure(params)
    }

    pub fn state(&self) -> TransportState {
        match (self.rtp.send.is_configured(), self.rtp.recv.is_configured()) {
            (true, true) => TransportState::Active,
            (true, false) => TransportState::SendConfigured,
            (false, true) => TransportState::ReceiveConfigured,
            (false, false) => TransportState::Uninitialized,
        }
    }

    pub fn is_active(&self) -> bool {
        self.rtp.is_active()
    }

    pub fn is_rtcp_active(&self) -> bool {
        self.rtcp.is_active() || self.rtp.is_active()
    }

    /// Leave RTP tag computation to the raw transport. Only takes effect
    /// for non-AEAD suites.
    pub fn enable_external_auth(&mut self) {
        self.external_auth = true;
        self.rtp.send.set_external_auth(true);
        debug!("External authentication requested");
    }

    pub fn is_external_auth_active(&self) -> bool {
        self.external_auth && self.rtp.send.is_external_auth_active()
    }

    pub fn set_packet_handler<F>(&mut self, handler: F)
    where
        F: FnMut(PacketKind, Bytes) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Classify `packet` as RTP or RTCP and send it protected
    pub fn send_packet(
        &mut self,
        packet: &mut BytesMut,
        options: &PacketOptions,
        flags: PacketFlags,
    ) -> Result<()> {
        match PacketKind::classify(packet) {
            Some(PacketKind::Rtp) => self.send_rtp_packet(packet, options, flags),
            Some(PacketKind::Rtcp) => self.send_rtcp_packet(packet, options, flags),
            None => {
                warn!("Refusing to send unclassifiable packet of {} bytes", packet.len());
                Err(SrtpError::Unclassifiable)
            }
        }
    }

    /// Protect an RTP packet in place and send it.
    ///
    /// `packet` needs spare capacity of at least [`Self::srtp_overhead`].
    /// With external authentication active the packet goes out without a
    /// tag and `options.srtp_auth` tells the raw transport how to add it.
    pub fn send_rtp_packet(
        &mut self,
        packet: &mut BytesMut,
        options: &PacketOptions,
        flags: PacketFlags,
    ) -> Result<()> {
        if !self.is_active() {
            warn!("Failed to send RTP packet: SRTP not active");
            return Err(SrtpError::NotActive);
        }

        let index = self
            .rtp
            .send
            .protect_rtp(packet)
            .inspect_err(|e| Self::log_protect_failure(PacketKind::Rtp, e))?;

        let mut options = options.clone();
        if self.is_external_auth_active() {
            let params = self.rtp.send.auth_params()?;
            options.srtp_auth = Some(SrtpPacketAuth {
                auth_key: params.auth_key.to_vec(),
                tag_len: params.tag_len,
                packet_index: index,
            });
        }

        self.transmit(PacketKind::Rtp, packet, &options, flags)
    }

    /// Protect an RTCP packet in place and send it. `packet` needs spare
    /// capacity of at least [`Self::rtcp_overhead`].
    pub fn send_rtcp_packet(
        &mut self,
        packet: &mut BytesMut,
        options: &PacketOptions,
        flags: PacketFlags,
    ) -> Result<()> {
        if !self.is_rtcp_active() {
            warn!("Failed to send RTCP packet: SRTP not active");
            return Err(SrtpError::NotActive);
        }

        let session = if self.rtcp.send.is_configured() {
            &mut self.rtcp.send
        } else {
            &mut self.rtp.send
        };
        session
            .protect_rtcp(packet)
            .inspect_err(|e| Self::log_protect_failure(PacketKind::Rtcp, e))?;

        self.transmit(PacketKind::Rtcp, packet, options, flags)
    }

    fn log_protect_failure(kind: PacketKind, err: &SrtpError) {
        warn!("Failed to protect {} packet: {}", kind, err);
        metrics::record_packet_dropped(Some(kind), err);
    }

    fn transmit(
        &mut self,
        kind: PacketKind,
        packet: &[u8],
        options: &PacketOptions,
        flags: PacketFlags,
    ) -> Result<()> {
        metrics::record_packet_protected(kind);

        match self
            .transport
            .send_packet(packet, options, flags | PacketFlags::SRTP_BYPASS)
        {
            Ok(sent) => {
                trace!("Sent {} bytes of S{}", sent, kind.as_str().to_uppercase());
                Ok(())
            }
            Err(e) => {
                warn!("Raw transport failed to send {} packet: {}", kind, e);
                metrics::record_send_failure(kind);
                Err(e.into())
            }
        }
    }

    /// Inbound path for datagrams read from the raw transport.
    ///
    /// Authenticated packets are decrypted and handed to the packet
    /// handler. Anything else is dropped and the reason returned; nothing
    /// from a failed packet ever reaches the handler.
    pub fn on_raw_packet_received(&mut self, data: &[u8]) -> Result<()> {
        let Some(kind) = PacketKind::classify(data) else {
            return Err(Self::drop_packet(None, data.len(), SrtpError::Unclassifiable));
        };

        let active = match kind {
            PacketKind::Rtp => self.is_active(),
            PacketKind::Rtcp => self.is_rtcp_active(),
        };
        if !active {
            return Err(Self::drop_packet(Some(kind), data.len(), SrtpError::NotActive));
        }

        let session = match kind {
            PacketKind::Rtcp if self.rtcp.recv.is_configured() => &mut self.rtcp.recv,
            _ => &mut self.rtp.recv,
        };
        let mut packet = BytesMut::from(data);
        if let Err(e) = session.unprotect(&mut packet, kind) {
            return Err(Self::drop_packet(Some(kind), data.len(), e));
        }
        metrics::record_packet_unprotected(kind);

        match self.handler.as_mut() {
            Some(handler) => handler(kind, packet.freeze()),
            None => debug!("No packet handler registered, discarding {} packet", kind),
        }
        Ok(())
    }

    fn drop_packet(kind: Option<PacketKind>, len: usize, err: SrtpError) -> SrtpError {
        warn!(
            "Dropping received {} packet ({} bytes): {}",
            kind.map_or("unclassified", |k| k.as_str()),
            len,
            err
        );
        metrics::record_packet_dropped(kind, &err);
        err
    }

    /// Bytes `send_rtp_packet` appends
    pub fn srtp_overhead(&self) -> usize {
        self.rtp.send.rtp_overhead()
    }

    /// Bytes `send_rtcp_packet` appends
    pub fn rtcp_overhead(&self) -> usize {
        if self.rtcp.send.is_configured() {
            self.rtcp.send.rtcp_overhead()
        } else {
            self.rtp.send.rtcp_overhead()
        }
    }

    /// Authentication key and tag length of the RTP send session
    pub fn rtp_auth_params(&self) -> Result<AuthParams<'_>> {
        self.rtp.send.auth_params()
    }

    pub fn packet_transport(&self) -> &T {
        &self.transport
    }

    pub fn packet_transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: PacketTransport + std::fmt::Debug> std::fmt::Debug for SecureTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureTransport")
            .field("transport", &self.transport)
            .field("rtp", &self.rtp)
            .field("rtcp", &self.rtcp)
            .field("external_auth", &self.external_auth)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}
