use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use srtp_transport::config::Config;
use srtp_transport::infrastructure::media::rtp::Goodbye;
use srtp_transport::infrastructure::media::{RtcpHeader, RtpPacket, RtpSession};
use srtp_transport::infrastructure::transport::UdpTransport;
use srtp_transport::interface::metrics::init_metrics;
use srtp_transport::{CryptoSuite, PacketFlags, PacketKind, PacketOptions, SecureTransport};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// 20 ms of PCMU silence at 8 kHz
const PCMU_SILENCE: [u8; 160] = [0xFF; 160];
const PCMU_PAYLOAD_TYPE: u8 = 0;
const PCMU_CLOCK_RATE: u32 = 8000;
const SENDER_REPORT_INTERVAL: Duration = Duration::from_secs(5);

const USAGE: &str = "\
Usage: srtp-peer [CONFIG]
       srtp-peer --generate-key [SUITE]
       srtp-peer --print-config [CONFIG]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = |i: usize| args.get(i).map(PathBuf::from);

    match args.first().map(String::as_str) {
        Some("--generate-key") => {
            let suite = match args.get(1) {
                Some(name) => name.parse()?,
                None => CryptoSuite::default(),
            };
            println!("{}", STANDARD.encode(suite.generate_master_key()));
            Ok(())
        }
        Some("--print-config") => {
            let config = Config::load(config_path(1).as_deref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Some("-h" | "--help") => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => run(Config::load(config_path(0).as_deref())?).await,
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting srtp-peer");

    if let Some(listen) = config.metrics.listen {
        init_metrics(listen)?;
        info!("Prometheus metrics on http://{}/metrics", listen);
    }

    let (send, recv) = config.srtp.rtp_params()?;
    let udp = UdpTransport::bind(config.network.bind, config.network.remote).await?;
    let socket = udp.socket();
    let remote = udp.remote_addr();
    let mut transport = SecureTransport::new(udp);

    if config.srtp.external_auth {
        transport.enable_external_auth();
    }
    transport.set_rtp_params(&send, &recv)?;
    if let Some(rtcp) = &config.srtp.rtcp {
        let (send, recv) = rtcp.to_params()?;
        transport.set_rtcp_params(&send, &recv)?;
    }
    info!(
        "SRTP configured: state={:?}, external auth active={}",
        transport.state(),
        transport.is_external_auth_active()
    );

    transport.set_packet_handler(|kind, packet| match kind {
        PacketKind::Rtp => match RtpPacket::parse(&packet) {
            Ok(rtp) => info!("Received {}", rtp),
            Err(e) => warn!("Received undecodable RTP: {}", e),
        },
        PacketKind::Rtcp => match RtcpHeader::parse(&packet) {
            Ok(header) => info!(
                "Received RTCP type={} ssrc={:08x} len={}",
                header.packet_type,
                header.ssrc,
                packet.len()
            ),
            Err(e) => warn!("Received undecodable RTCP: {}", e),
        },
    });

    let mut session = RtpSession::new(PCMU_PAYLOAD_TYPE, PCMU_CLOCK_RATE);
    let samples = PCMU_CLOCK_RATE / 1000 * config.network.packet_interval_ms as u32;
    info!("Sending PCMU as SSRC {:08x}", session.ssrc());

    let mut media_tick =
        tokio::time::interval(Duration::from_millis(config.network.packet_interval_ms.max(1)));
    let mut report_tick = tokio::time::interval(SENDER_REPORT_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut buf = vec![0u8; 1500];
    loop {
        tokio::select! {
            _ = media_tick.tick() => {
                let rtp = session.next_packet(Bytes::from_static(&PCMU_SILENCE), samples);
                let mut packet = rtp.serialize_with_reserve(transport.srtp_overhead());
                if let Err(e) = transport.send_rtp_packet(&mut packet, &PacketOptions::default(), PacketFlags::NONE) {
                    warn!("Failed to send RTP seq={}: {}", rtp.sequence, e);
                }
            }
            _ = report_tick.tick() => {
                let mut packet = session.sender_report().serialize_with_reserve(transport.rtcp_overhead());
                if let Err(e) = transport.send_rtcp_packet(&mut packet, &PacketOptions::default(), PacketFlags::NONE) {
                    warn!("Failed to send sender report: {}", e);
                }
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, from)) => {
                    if from != remote {
                        debug!("Ignoring {} bytes from unexpected peer {}", len, from);
                    } else if let Err(e) = transport.on_raw_packet_received(&buf[..len]) {
                        debug!("Dropped packet from {}: {}", from, e);
                    }
                }
                Err(e) => warn!("UDP receive failed: {}", e),
            },
            _ = &mut shutdown => {
                info!("Shutting down, sent {} RTP packets", session.packets_sent());
                let mut packet = Goodbye::new(session.ssrc()).serialize_with_reserve(transport.rtcp_overhead());
                if let Err(e) = transport.send_rtcp_packet(&mut packet, &PacketOptions::default(), PacketFlags::NONE) {
                    warn!("Failed to send BYE: {}", e);
                }
                break;
            }
        }
    }

    Ok(())
}
