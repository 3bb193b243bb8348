//! Wi-Fi, sockets and protocol glue for the ESP32-S3 radio.

use embassy_sync::{blocking_mutex::raw::NoopRawMutex, mutex::Mutex};
use esp_radio::wifi::WifiController;

pub mod https;
pub mod portal;
pub mod probe;
pub mod serve;
pub mod sntp;
pub mod station;

/// The one radio controller, shared by the station and the setup portal.
/// Both run on the main task and never hold the lock across each other.
pub type SharedRadio = Mutex<NoopRawMutex, WifiController<'static>>;
