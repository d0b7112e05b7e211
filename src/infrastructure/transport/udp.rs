//! UDP transport on a tokio socket

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::net::UdpSocket;
use tracing::{info, trace};

use super::PacketTransport;
use crate::domain::packet::{PacketFlags, PacketOptions};
use crate::infrastructure::media::srtp::complete_external_auth;

/// Sends datagrams to one fixed remote address.
///
/// Sending uses `try_send_to` and never waits; a full socket buffer
/// surfaces as `WouldBlock`. Receiving is left to whoever owns the socket
/// handle returned by [`UdpTransport::socket`].
///
/// Packets whose options carry `srtp_auth` get their SRTP tag appended
/// here, standing in for an offloading NIC or kernel path.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
}

impl UdpTransport {
    pub async fn bind(local: SocketAddr, remote: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        info!("UDP transport bound to {}, remote {}", socket.local_addr()?, remote);
        Ok(Self::new(Arc::new(socket), remote))
    }

    pub fn new(socket: Arc<UdpSocket>, remote: SocketAddr) -> Self {
        Self { socket, remote }
    }

    pub fn socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}

impl PacketTransport for UdpTransport {
    fn send_packet(
        &mut self,
        data: &[u8],
        options: &PacketOptions,
        _flags: PacketFlags,
    ) -> io::Result<usize> {
        let sent = match &options.srtp_auth {
            Some(auth) => {
                let mut packet = BytesMut::with_capacity(data.len() + auth.tag_len);
                packet.extend_from_slice(data);
                complete_external_auth(&mut packet, auth)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                self.socket.try_send_to(&packet, self.remote)?
            }
            None => self.socket.try_send_to(data, self.remote)?,
        };
        trace!(
            "UDP sent {} bytes to {} (packet_id={:?})",
            sent,
            self.remote,
            options.packet_id
        );
        Ok(sent)
    }
}
