#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

extern crate alloc;

use core::net::Ipv4Addr;

use embassy_executor::Spawner;
use embassy_net::{Ipv4Cidr, StackResources, StaticConfigV4};
use embassy_time::{Delay, Timer};
use escpos_thermal::{Config as PrinterConfig, ThermalPrinter};
use esp_hal::{
    clock::CpuClock,
    rng::Rng,
    timer::timg::TimerGroup,
    uart::{Config as UartConfig, Uart},
};
use log::{LevelFilter, info, warn};
use scribe_core::{
    clock::TimeZone,
    pipeline::{DEFAULT_PROBE_HOST, DEFAULT_SOURCE_URL, PipelineConfig},
};
use scribe_hal_esp32s3::{
    net::{
        SharedRadio,
        https::{HttpsSocketState, HttpsTransport, TLS_READ_BUF_SIZE, TLS_WRITE_BUF_SIZE},
        portal::SetupPortal,
        probe::DnsProbe,
        station::EspStation,
    },
    printer::SerialReceiptPrinter,
};
use static_cell::{ConstStaticCell, StaticCell};

use app::Board;
use operator_server::{OperatorReplies, OperatorRequests};
use storage::BoardStore;

#[path = "main/app.rs"]
mod app;
#[path = "main/logging.rs"]
mod logging;
#[path = "main/operator_server.rs"]
mod operator_server;
#[path = "main/storage.rs"]
mod storage;

const PRINTER_BAUD: u32 = 9_600;
const AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
const AP_PREFIX_LEN: u8 = 24;
const NTP_SERVERS: [&str; 2] = ["pool.ntp.org", "time.google.com"];
const TIME_ZONE: TimeZone = TimeZone::CentralEuropean;

const AP_SSID: &str = match option_env!("SCRIBE_AP_SSID") {
    Some(ssid) => ssid,
    None => "Scribe-WiFi-Setup",
};
const SOURCE_URL: &str = match option_env!("SCRIBE_SOURCE_URL") {
    Some(url) => url,
    None => DEFAULT_SOURCE_URL,
};

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static STA_RESOURCES: StaticCell<StackResources<6>> = StaticCell::new();
static AP_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static HTTPS_SOCKETS: StaticCell<HttpsSocketState> = StaticCell::new();
static TLS_READ: ConstStaticCell<[u8; TLS_READ_BUF_SIZE]> =
    ConstStaticCell::new([0; TLS_READ_BUF_SIZE]);
static TLS_WRITE: ConstStaticCell<[u8; TLS_WRITE_BUF_SIZE]> =
    ConstStaticCell::new([0; TLS_WRITE_BUF_SIZE]);

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

async fn halt(what: &str) -> ! {
    warn!("boot: {} unavailable; halting", what);
    loop {
        Timer::after_secs(1).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    logging::init(LevelFilter::Info);
    esp_println::println!("boot: scribe starting");

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // esp-radio and the TLS client both allocate.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Printer RX on GPIO17; the printer never talks back.
    let uart = match Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(PRINTER_BAUD),
    ) {
        Ok(uart) => uart.with_tx(peripherals.GPIO17).into_async(),
        Err(err) => {
            warn!("boot: printer uart config failed err={:?}", err);
            halt("printer").await
        }
    };
    let mut thermal = ThermalPrinter::new(uart, Delay, PrinterConfig::default());
    if let Err(err) = thermal.initialize().await {
        warn!("boot: printer init failed err={:?}", err);
    }
    let printer = SerialReceiptPrinter::new(thermal);

    let store = BoardStore::open();

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());

    let radio = match esp_radio::init() {
        Ok(radio) => RADIO.init(radio),
        Err(err) => {
            warn!("boot: esp-radio init failed err={:?}", err);
            halt("radio").await
        }
    };
    let (wifi_controller, interfaces) =
        match esp_radio::wifi::new(radio, peripherals.WIFI, esp_radio::wifi::Config::default()) {
            Ok(parts) => parts,
            Err(err) => {
                warn!("boot: wifi peripheral init failed err={:?}", err);
                halt("wifi").await
            }
        };
    let shared_radio = SharedRadio::new(wifi_controller);

    let (sta_stack, mut sta_runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STA_RESOURCES.init(StackResources::new()),
        seed,
    );
    let (ap_stack, mut ap_runner) = embassy_net::new(
        interfaces.ap,
        embassy_net::Config::ipv4_static(StaticConfigV4 {
            address: Ipv4Cidr::new(AP_ADDRESS, AP_PREFIX_LEN),
            gateway: Some(AP_ADDRESS),
            dns_servers: Default::default(),
        }),
        AP_RESOURCES.init(StackResources::new()),
        seed.rotate_left(17),
    );

    let transport = HttpsTransport::new(
        sta_stack,
        HTTPS_SOCKETS.init(HttpsSocketState::new()),
        TLS_READ.take(),
        TLS_WRITE.take(),
        seed.rotate_left(31),
    );

    let board = Board {
        store,
        station: EspStation::new(&shared_radio, sta_stack),
        portal: SetupPortal::new(&shared_radio, ap_stack, AP_SSID),
        probe: DnsProbe::new(sta_stack, DEFAULT_PROBE_HOST),
        transport,
        printer,
        delay: Delay,
        stack: sta_stack,
        ntp_servers: &NTP_SERVERS,
    };
    let pipeline_config = PipelineConfig {
        source_url: SOURCE_URL,
        time_zone: TIME_ZONE,
        ..PipelineConfig::default()
    };

    info!(
        "boot: ready printer_baud={} ap_ssid={} source={}",
        PRINTER_BAUD, AP_SSID, SOURCE_URL
    );

    let requests = OperatorRequests::new();
    let replies = OperatorReplies::new();

    let sta_future = sta_runner.run();
    let ap_future = ap_runner.run();
    let server_future = operator_server::run(sta_stack, &requests, &replies);
    let app_future = app::run(board, pipeline_config, &requests, &replies);

    let _ = embassy_futures::join::join4(sta_future, ap_future, server_future, app_future).await;
    unreachable!()
}
