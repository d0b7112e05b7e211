//! In-memory transport pair

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use super::PacketTransport;
use crate::domain::packet::{PacketFlags, PacketOptions};

type Queue = Arc<Mutex<VecDeque<Bytes>>>;

/// A datagram as it was handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub data: Bytes,
    pub options: PacketOptions,
    pub flags: PacketFlags,
}

/// One end of a connected in-memory datagram pipe.
///
/// Everything sent on one end queues up on the other end until taken.
/// The last packet sent is kept for inspection of the wire bytes.
#[derive(Debug)]
pub struct LoopbackTransport {
    outbound: Queue,
    inbound: Queue,
    last_sent: Option<SentPacket>,
    packets_sent: usize,
    writable: bool,
}

impl LoopbackTransport {
    /// Two connected ends
    pub fn pair() -> (Self, Self) {
        let a_to_b: Queue = Arc::default();
        let b_to_a: Queue = Arc::default();
        (
            Self::new(a_to_b.clone(), b_to_a.clone()),
            Self::new(b_to_a, a_to_b),
        )
    }

    fn new(outbound: Queue, inbound: Queue) -> Self {
        Self {
            outbound,
            inbound,
            last_sent: None,
            packets_sent: 0,
            writable: true,
        }
    }

    pub fn last_sent_packet(&self) -> Option<&SentPacket> {
        self.last_sent.as_ref()
    }

    pub fn packets_sent(&self) -> usize {
        self.packets_sent
    }

    /// Next datagram sent by the other end, oldest first
    pub fn take_received(&self) -> Option<Bytes> {
        self.inbound.lock().pop_front()
    }

    pub fn drain_received(&self) -> Vec<Bytes> {
        self.inbound.lock().drain(..).collect()
    }

    /// Simulate a transport that refuses packets
    pub fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
    }
}

impl PacketTransport for LoopbackTransport {
    fn send_packet(
        &mut self,
        data: &[u8],
        options: &PacketOptions,
        flags: PacketFlags,
    ) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "loopback not writable"));
        }

        let data = Bytes::copy_from_slice(data);
        self.outbound.lock().push_back(data.clone());
        self.last_sent = Some(SentPacket {
            data: data.clone(),
            options: options.clone(),
            flags,
        });
        self.packets_sent += 1;

        trace!("Loopback sent {} bytes", data.len());
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_delivers_in_order() {
        let (mut a, b) = LoopbackTransport::pair();
        a.send_packet(b"one", &PacketOptions::default(), PacketFlags::NONE).unwrap();
        a.send_packet(b"two", &PacketOptions::default(), PacketFlags::SRTP_BYPASS).unwrap();

        assert_eq!(a.packets_sent(), 2);
        assert_eq!(a.last_sent_packet().unwrap().flags, PacketFlags::SRTP_BYPASS);
        assert_eq!(b.drain_received(), vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
        assert!(a.take_received().is_none());
    }

    #[test]
    fn test_not_writable() {
        let (mut a, b) = LoopbackTransport::pair();
        a.set_writable(false);
        let err = a
            .send_packet(b"x", &PacketOptions::default(), PacketFlags::NONE)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(b.take_received().is_none());
        assert!(a.last_sent_packet().is_none());
    }
}
