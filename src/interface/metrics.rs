//! Prometheus metrics for the secure transport

use std::net::SocketAddr;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::domain::packet::PacketKind;
use crate::domain::shared::SrtpError;

pub const PACKETS_PROTECTED: &str = "srtp_packets_protected_total";
pub const PACKETS_UNPROTECTED: &str = "srtp_packets_unprotected_total";
pub const PACKETS_DROPPED: &str = "srtp_packets_dropped_total";
pub const SEND_FAILURES: &str = "srtp_send_failures_total";

/// Install the Prometheus exporter with an HTTP listener on `listen`.
///
/// Must be called from inside a tokio runtime.
pub fn init_metrics(listen: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()?;

    describe_metrics();
    Ok(())
}

/// Register descriptions with whatever recorder is installed
pub fn describe_metrics() {
    describe_counter!(
        PACKETS_PROTECTED,
        "Total number of RTP/RTCP packets protected and handed to the transport"
    );
    describe_counter!(
        PACKETS_UNPROTECTED,
        "Total number of received packets that passed authentication"
    );
    describe_counter!(
        PACKETS_DROPPED,
        "Total number of packets dropped, labelled by reason"
    );
    describe_counter!(
        SEND_FAILURES,
        "Total number of protected packets the raw transport failed to send"
    );
}

/// Label value for a dropped packet
pub fn drop_reason(err: &SrtpError) -> &'static str {
    match err {
        SrtpError::AuthenticationFailed => "authentication",
        SrtpError::ReplayDetected { .. } => "replay",
        SrtpError::BufferTooSmall { .. } => "buffer_too_small",
        SrtpError::KeyExpired => "key_expired",
        SrtpError::PacketTooShort(_) | SrtpError::MalformedPacket(_) => "malformed",
        other => other.kind().as_str(),
    }
}

pub fn record_packet_protected(kind: PacketKind) {
    counter!(PACKETS_PROTECTED, "kind" => kind.as_str()).increment(1);
}

pub fn record_packet_unprotected(kind: PacketKind) {
    counter!(PACKETS_UNPROTECTED, "kind" => kind.as_str()).increment(1);
}

/// `kind` is `None` when the packet could not be classified
pub fn record_packet_dropped(kind: Option<PacketKind>, err: &SrtpError) {
    let kind = kind.map_or("unknown", |k| k.as_str());
    counter!(PACKETS_DROPPED, "kind" => kind, "reason" => drop_reason(err)).increment(1);
}

pub fn record_send_failure(kind: PacketKind) {
    counter!(SEND_FAILURES, "kind" => kind.as_str()).increment(1);
}
