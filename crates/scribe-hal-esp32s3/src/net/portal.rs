use alloc::{string::String, vec::Vec};

use embassy_futures::select::{Either, select};
use embassy_net::{
    IpAddress, IpEndpoint, Stack,
    tcp::TcpSocket,
    udp::{PacketMetadata, UdpSocket},
};
use embassy_time::Duration;
use esp_radio::wifi::{
    AccessPointConfig, AuthMethod, ClientConfig, ModeConfig, ScanConfig, WifiController,
    WifiError,
};
use log::{debug, info, warn};
use scribe_core::{
    connectivity::{PortalReply, ProvisioningPortal, Submission},
    dhcp::{self, DhcpConfig, DhcpServer},
    http::{PortalRoute, Response, portal_reply_response, portal_route, visible_networks},
};

use super::{
    SharedRadio,
    serve::{self, HTTP_PORT, REQUEST_BYTES, SOCKET_TIMEOUT_SECS, ServeError},
};

const DHCP_PACKET_BYTES: usize = 1_024;

/// Open access point with a setup form on port 80 and a small DHCP server.
///
/// The AP stack is configured statically with the DHCP server address
/// (192.168.4.1/24). Nearby networks are scanned once per start and served
/// from `/api/scan`.
pub struct SetupPortal<'a> {
    radio: &'a SharedRadio,
    stack: Stack<'a>,
    ssid: &'a str,
    dhcp: DhcpConfig,
    networks: Vec<String>,
}

impl<'a> SetupPortal<'a> {
    pub fn new(radio: &'a SharedRadio, stack: Stack<'a>, ssid: &'a str) -> Self {
        Self {
            radio,
            stack,
            ssid,
            dhcp: DhcpConfig::default(),
            networks: Vec::new(),
        }
    }
}

impl ProvisioningPortal for SetupPortal<'_> {
    type Error = WifiError;

    async fn start(&mut self) -> Result<(), Self::Error> {
        let mut controller = self.radio.lock().await;
        if controller.is_started().unwrap_or(false) {
            controller.stop_async().await?;
        }
        self.networks = match scan(&mut controller, self.ssid).await {
            Ok(networks) => networks,
            Err(err) => {
                warn!("portal: network scan failed err={:?}", err);
                Vec::new()
            }
        };
        info!("portal: {} networks visible", self.networks.len());

        let mode = ModeConfig::AccessPoint(
            AccessPointConfig::default()
                .with_ssid(self.ssid.into())
                .with_auth_method(AuthMethod::None),
        );
        controller.set_config(&mode)?;
        controller.start_async().await?;
        info!("portal: access point up ssid={}", self.ssid);
        Ok(())
    }

    /// Never yields `None`: nothing on this board asks the portal to stop.
    async fn next_submission<F>(&mut self, mut review: F) -> Option<Submission>
    where
        F: FnMut(&Submission) -> PortalReply,
    {
        let form = serve_form(self.stack, &self.networks, &mut review);
        match select(form, serve_dhcp(self.stack, self.dhcp)).await {
            Either::First(submission) => Some(submission),
            Either::Second(()) => {
                warn!("portal: continuing without dhcp");
                Some(serve_form(self.stack, &self.networks, &mut review).await)
            }
        }
    }

    async fn stop(&mut self) {
        let mut controller = self.radio.lock().await;
        if let Err(err) = controller.stop_async().await {
            warn!("portal: access point stop failed err={:?}", err);
        }
        info!("portal: access point down");
    }
}

/// Scanning needs station mode; the controller is left stopped.
async fn scan(
    controller: &mut WifiController<'static>,
    own_ssid: &str,
) -> Result<Vec<String>, WifiError> {
    controller.set_config(&ModeConfig::Client(ClientConfig::default()))?;
    controller.start_async().await?;
    let scanned = controller.scan_with_config_async(ScanConfig::default()).await;
    controller.stop_async().await?;

    let found = scanned?;
    debug!("portal: scan returned {} entries", found.len());
    Ok(visible_networks(found.iter().map(|ap| ap.ssid.as_str()), own_ssid))
}

async fn serve_form<F>(stack: Stack<'_>, networks: &[String], review: &mut F) -> Submission
where
    F: FnMut(&Submission) -> PortalReply,
{
    let mut rx = [0u8; 1_536];
    let mut tx = [0u8; 2_048];
    let mut buf = [0u8; REQUEST_BYTES];

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx, &mut tx);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));
        if let Err(err) = socket.accept(HTTP_PORT).await {
            warn!("portal: accept failed err={:?}", err);
            continue;
        }

        let (response, accepted) = match serve::read_request(&mut socket, &mut buf).await {
            Ok(request) => match portal_route(
                request.method,
                &request.path,
                request.form(),
                networks,
            ) {
                PortalRoute::Submit(submission) => {
                    let reply = review(&submission);
                    let accepted = (reply == PortalReply::Accepted).then_some(submission);
                    (portal_reply_response(reply), accepted)
                }
                PortalRoute::Respond(response) => (response, None),
            },
            Err(ServeError::Http(err)) => (Response::from(err), None),
            Err(err) => {
                debug!("portal: request dropped err={:?}", err);
                serve::close(&mut socket).await;
                continue;
            }
        };

        serve::respond(&mut socket, &response).await;
        serve::close(&mut socket).await;
        if let Some(submission) = accepted {
            return submission;
        }
    }
}

/// Returns only if the DHCP port cannot be bound.
async fn serve_dhcp(stack: Stack<'_>, config: DhcpConfig) {
    let mut server = DhcpServer::new(config);
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0u8; DHCP_PACKET_BYTES];
    let mut tx_buffer = [0u8; DHCP_PACKET_BYTES];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    if let Err(err) = socket.bind(dhcp::SERVER_PORT) {
        warn!("portal: dhcp bind failed err={:?}", err);
        return;
    }

    let broadcast = IpEndpoint::new(IpAddress::v4(255, 255, 255, 255), dhcp::CLIENT_PORT);
    let mut packet = [0u8; DHCP_PACKET_BYTES];
    let mut reply = [0u8; dhcp::MAX_REPLY_BYTES];
    loop {
        let len = match socket.recv_from(&mut packet).await {
            Ok((len, _)) => len,
            Err(err) => {
                debug!("portal: dhcp recv failed err={:?}", err);
                continue;
            }
        };
        match server.handle(&packet[..len], &mut reply) {
            Ok(Some(reply_len)) => {
                if let Err(err) = socket.send_to(&reply[..reply_len], broadcast).await {
                    warn!("portal: dhcp send failed err={:?}", err);
                }
            }
            Ok(None) => {}
            Err(err) => debug!("portal: dhcp packet ignored err={}", err),
        }
    }
}
