use embassy_net::{
    IpEndpoint, Stack,
    dns::{self, DnsQueryType},
    udp::{self, PacketMetadata, UdpSocket},
};
use embassy_time::{Duration, WithTimeout};
use log::{info, warn};
use scribe_core::clock::sntp::{self, SntpError};

const LOCAL_PORT: u16 = 50_123;
const REPLY_TIMEOUT_SECS: u64 = 5;

#[derive(Debug)]
pub enum SntpQueryError {
    Dns(dns::Error),
    NoAddress,
    Bind(udp::BindError),
    Send(udp::SendError),
    Recv(udp::RecvError),
    Timeout,
    Reply(SntpError),
}

/// One SNTP round trip against `server`; returns Unix epoch seconds.
pub async fn query(stack: Stack<'_>, server: &str) -> Result<u64, SntpQueryError> {
    let addresses = stack
        .dns_query(server, DnsQueryType::A)
        .await
        .map_err(SntpQueryError::Dns)?;
    let address = *addresses.first().ok_or(SntpQueryError::NoAddress)?;

    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0u8; 128];
    let mut tx_buffer = [0u8; 128];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(LOCAL_PORT).map_err(SntpQueryError::Bind)?;

    let endpoint = IpEndpoint::new(address, sntp::PORT);
    socket
        .send_to(&sntp::request(), endpoint)
        .await
        .map_err(SntpQueryError::Send)?;

    let mut reply = [0u8; sntp::PACKET_LEN];
    let (len, _) = socket
        .recv_from(&mut reply)
        .with_timeout(Duration::from_secs(REPLY_TIMEOUT_SECS))
        .await
        .map_err(|_| SntpQueryError::Timeout)?
        .map_err(SntpQueryError::Recv)?;

    let epoch_secs = sntp::parse_reply(&reply[..len]).map_err(SntpQueryError::Reply)?;
    info!("sntp: server={} epoch_secs={}", server, epoch_secs);
    Ok(epoch_secs)
}

/// Tries each server in turn.
pub async fn query_any(stack: Stack<'_>, servers: &[&str]) -> Option<u64> {
    for server in servers {
        match query(stack, server).await {
            Ok(epoch_secs) => return Some(epoch_secs),
            Err(err) => warn!("sntp: server={} failed err={:?}", server, err),
        }
    }
    None
}
