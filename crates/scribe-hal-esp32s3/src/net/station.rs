use embassy_net::Stack;
use embassy_time::{Duration, WithTimeout};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiError};
use log::{info, warn};
use scribe_core::{connectivity::WifiStation, settings::Credentials};

use super::SharedRadio;

const DHCP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug)]
pub enum StationError {
    Radio(WifiError),
    DhcpTimeout,
}

impl From<WifiError> for StationError {
    fn from(err: WifiError) -> Self {
        Self::Radio(err)
    }
}

/// Station-mode attachment over the shared controller and the DHCP stack.
pub struct EspStation<'a> {
    radio: &'a SharedRadio,
    stack: Stack<'a>,
}

impl<'a> EspStation<'a> {
    pub fn new(radio: &'a SharedRadio, stack: Stack<'a>) -> Self {
        Self { radio, stack }
    }

    /// IPv4 address leased by DHCP, once attached.
    pub fn address(&self) -> Option<embassy_net::Ipv4Address> {
        self.stack.config_v4().map(|config| config.address.address())
    }
}

impl WifiStation for EspStation<'_> {
    type Error = StationError;

    async fn attach(&mut self, credentials: &Credentials) -> Result<(), Self::Error> {
        {
            let mut controller = self.radio.lock().await;
            let mode = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(credentials.ssid().into())
                    .with_password(credentials.password().into()),
            );
            controller.set_config(&mode)?;

            if !controller.is_started().unwrap_or(false) {
                controller.start_async().await?;
            }
            controller.connect_async().await?;
        }
        info!("wifi: associated ssid={}", credentials.ssid());

        self.stack
            .wait_config_up()
            .with_timeout(Duration::from_secs(DHCP_TIMEOUT_SECS))
            .await
            .map_err(|_| StationError::DhcpTimeout)?;

        if let Some(config) = self.stack.config_v4() {
            info!("wifi: dhcp ready ip={}", config.address.address());
        }
        Ok(())
    }

    async fn detach(&mut self) {
        let mut controller = self.radio.lock().await;
        if let Err(err) = controller.disconnect_async().await {
            warn!("wifi: disconnect failed err={:?}", err);
        }
    }

    fn is_attached(&mut self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }
}
