//! RTP sender-side stream state

use bytes::Bytes;
use rand::Rng;
use tracing::debug;

use super::packet::RtpPacket;
use super::rtcp::SenderReport;

/// RTP sending stream
///
/// Hands out strictly increasing sequence numbers so that every packet
/// protected under one SRTP key carries a fresh packet index. Protecting two
/// packets with the same sequence number under one key reuses keystream;
/// callers that build packets by hand own that obligation themselves.
#[derive(Debug)]
pub struct RtpSession {
    /// Synchronization source identifier
    ssrc: u32,
    /// Next sequence number to hand out
    sequence: u16,
    /// RTP timestamp of the next packet
    timestamp: u32,
    payload_type: u8,
    /// Clock rate (samples per second)
    clock_rate: u32,
    packets_sent: u32,
    octets_sent: u32,
}

impl RtpSession {
    /// Create a new RTP session with random SSRC, sequence and timestamp
    pub fn new(payload_type: u8, clock_rate: u32) -> Self {
        let mut rng = rand::thread_rng();
        let ssrc = loop {
            let ssrc: u32 = rng.gen();
            if ssrc != 0 {
                break ssrc;
            }
        };
        Self::with_initial_state(ssrc, rng.gen(), rng.gen(), payload_type, clock_rate)
    }

    /// Create with fixed SSRC, first sequence number and timestamp
    pub fn with_initial_state(
        ssrc: u32,
        sequence: u16,
        timestamp: u32,
        payload_type: u8,
        clock_rate: u32,
    ) -> Self {
        Self {
            ssrc,
            sequence,
            timestamp,
            payload_type,
            clock_rate,
            packets_sent: 0,
            octets_sent: 0,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Sequence number the next packet will carry
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    /// Build the next packet; `samples` advances the timestamp afterwards
    pub fn next_packet(&mut self, payload: Bytes, samples: u32) -> RtpPacket {
        let packet = RtpPacket::new(
            self.payload_type,
            self.sequence,
            self.timestamp,
            self.ssrc,
            payload,
        );

        self.packets_sent = self.packets_sent.wrapping_add(1);
        self.octets_sent = self.octets_sent.wrapping_add(packet.payload.len() as u32);

        debug!(
            "Created RTP packet: seq={}, ts={}, ssrc={:08x}, size={}",
            self.sequence,
            self.timestamp,
            self.ssrc,
            packet.payload.len()
        );

        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(samples);

        packet
    }

    /// Sender report describing what has been sent so far
    pub fn sender_report(&self) -> SenderReport {
        SenderReport::new(self.ssrc, self.timestamp, self.packets_sent, self.octets_sent)
    }

    pub fn packets_sent(&self) -> u32 {
        self.packets_sent
    }

    pub fn octets_sent(&self) -> u32 {
        self.octets_sent
    }
}
