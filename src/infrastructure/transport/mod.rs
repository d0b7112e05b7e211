//! Raw packet transports
//!
//! The secure transport hands fully protected datagrams to a
//! [`PacketTransport`]; inbound datagrams are pushed back up through
//! `SecureTransport::on_raw_packet_received`.

pub mod loopback;
pub mod udp;

use std::io;

use crate::domain::packet::{PacketFlags, PacketOptions};

pub use loopback::{LoopbackTransport, SentPacket};
pub use udp::UdpTransport;

/// Outbound half of a datagram transport
#[cfg_attr(test, mockall::automock)]
pub trait PacketTransport {
    /// Send one datagram without blocking. Returns the number of bytes
    /// written.
    fn send_packet(
        &mut self,
        data: &[u8],
        options: &PacketOptions,
        flags: PacketFlags,
    ) -> io::Result<usize>;
}
