//! Secure transport over real UDP sockets on localhost

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use srtp_transport::domain::{CryptoSuite, PacketFlags, PacketKind, PacketOptions, SrtpParams};
use srtp_transport::infrastructure::media::rtp::RtpSession;
use srtp_transport::infrastructure::transport::UdpTransport;
use srtp_transport::SecureTransport;
use tokio::net::UdpSocket;

const KEY_1: &[u8] = b"123456789012345678901234567890";
const KEY_2: &[u8] = b"987654321098765432109876543210";

async fn udp_pair() -> (UdpTransport, UdpTransport) {
    let socket1 = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let socket2 = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let addr1 = socket1.local_addr().unwrap();
    let addr2 = socket2.local_addr().unwrap();
    (UdpTransport::new(socket1, addr2), UdpTransport::new(socket2, addr1))
}

async fn recv_datagram(socket: &UdpSocket) -> Vec<u8> {
    let mut buf = vec![0u8; 1500];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
    buf.truncate(len);
    buf
}

async fn exchange_rtp(suite: CryptoSuite, external_auth: bool) {
    let (udp1, udp2) = udp_pair().await;
    let socket2 = udp2.socket();

    let mut sender = SecureTransport::new(udp1);
    let mut receiver = SecureTransport::new(udp2);
    if external_auth {
        sender.enable_external_auth();
    }
    sender
        .set_rtp_params(&SrtpParams::new(suite, KEY_1), &SrtpParams::new(suite, KEY_2))
        .unwrap();
    receiver
        .set_rtp_params(&SrtpParams::new(suite, KEY_2), &SrtpParams::new(suite, KEY_1))
        .unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    receiver.set_packet_handler(move |kind, packet| sink.lock().push((kind, packet)));

    let mut session = RtpSession::new(0, 8000);
    let rtp = session.next_packet(Bytes::from_static(&[0xFF; 160]), 160);
    let original = rtp.serialize();
    let mut packet = rtp.serialize_with_reserve(sender.srtp_overhead());
    sender
        .send_rtp_packet(&mut packet, &PacketOptions::default(), PacketFlags::NONE)
        .unwrap();

    let datagram = recv_datagram(&socket2).await;
    // Tagged on the wire either way: by the session or by the UDP transport
    assert_eq!(datagram.len(), original.len() + suite.rtp_auth_tag_len());
    assert_ne!(datagram[12..original.len()], original[12..]);

    receiver.on_raw_packet_received(&datagram).unwrap();
    assert_eq!(received.lock().as_slice(), &[(PacketKind::Rtp, original)]);
}

#[tokio::test]
async fn test_udp_round_trip() {
    exchange_rtp(CryptoSuite::AesCm128HmacSha1_80, false).await;
    exchange_rtp(CryptoSuite::AeadAes256Gcm, false).await;
}

#[tokio::test]
async fn test_udp_transport_completes_external_auth() {
    exchange_rtp(CryptoSuite::AesCm128HmacSha1_80, true).await;
    exchange_rtp(CryptoSuite::AesCm128HmacSha1_32, true).await;
}

#[tokio::test]
async fn test_udp_rtcp_sender_report() {
    let (udp1, udp2) = udp_pair().await;
    let socket2 = udp2.socket();
    let suite = CryptoSuite::AeadAes128Gcm;
    let key1 = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ12";
    let key2 = b"21ZYXWVUTSRQPONMLKJIHGFEDCBA";

    let mut sender = SecureTransport::new(udp1);
    let mut receiver = SecureTransport::new(udp2);
    sender
        .set_rtp_params(&SrtpParams::new(suite, &key1[..]), &SrtpParams::new(suite, &key2[..]))
        .unwrap();
    receiver
        .set_rtp_params(&SrtpParams::new(suite, &key2[..]), &SrtpParams::new(suite, &key1[..]))
        .unwrap();

    let received = Arc::new(Mutex::new(None));
    let sink = received.clone();
    receiver.set_packet_handler(move |kind, packet| *sink.lock() = Some((kind, packet)));

    let session = RtpSession::new(0, 8000);
    let report = session.sender_report();
    let original = report.serialize();
    let mut packet = report.serialize_with_reserve(sender.rtcp_overhead());
    sender
        .send_packet(&mut packet, &PacketOptions::default(), PacketFlags::NONE)
        .unwrap();

    let datagram = recv_datagram(&socket2).await;
    assert_eq!(datagram.len(), original.len() + 4 + 16);
    receiver.on_raw_packet_received(&datagram).unwrap();
    assert_eq!(*received.lock(), Some((PacketKind::Rtcp, original)));
}
