//! Top-level control flow: connectivity first, then the tick loop.

use alloc::string::ToString;

use embassy_net::Stack;
use embassy_time::{Delay, Instant, Timer};
use embedded_io_async::Write;
use log::{info, warn};
use scribe_core::{
    clock::SyncedClock,
    connectivity::{ConnectivityConfig, ConnectivityIo, ConnectivityManager, RestartReason},
    context::AppContext,
    operator::{self, OperatorReply},
    pipeline::{AcquisitionPipeline, PipelineConfig, PipelineIo, TickOutcome},
    render::{DEFAULT_LINE_WIDTH, print_ready_banner},
};
use scribe_hal_esp32s3::{
    net::{
        https::HttpsTransport, portal::SetupPortal, probe::DnsProbe, sntp, station::EspStation,
    },
    printer::SerialReceiptPrinter,
};

use crate::{
    operator_server::{OperatorReplies, OperatorRequests},
    storage::BoardStore,
};

const TICK_INTERVAL_MS: u64 = 100;
const CLOCK_RETRY_MS: u64 = 30_000;
const CLOCK_RESYNC_MS: u64 = 6 * 60 * 60 * 1_000;
const RESTART_GRACE_MS: u64 = 1_000;

/// Everything the main loop drives, owned in one place.
pub struct Board<'a, W: Write> {
    pub store: BoardStore,
    pub station: EspStation<'a>,
    pub portal: SetupPortal<'a>,
    pub probe: DnsProbe<'a>,
    pub transport: HttpsTransport<'a>,
    pub printer: SerialReceiptPrinter<W, Delay>,
    pub delay: Delay,
    pub stack: Stack<'a>,
    pub ntp_servers: &'a [&'a str],
}

pub async fn run<W: Write>(
    mut board: Board<'_, W>,
    pipeline_config: PipelineConfig,
    requests: &OperatorRequests,
    replies: &OperatorReplies,
) -> ! {
    let mut ctx = AppContext::load(&mut board.store);
    info!(
        "app: schedule daily={} last={:?}",
        ctx.schedule.daily_fire_time, ctx.schedule.last_fire_date
    );

    let mut manager = ConnectivityManager::new(ConnectivityConfig::default());
    let established = {
        let mut io = ConnectivityIo {
            store: &mut board.store,
            station: &mut board.station,
            portal: &mut board.portal,
            probe: &mut board.probe,
            delay: &mut board.delay,
        };
        manager.establish(&mut ctx, &mut io).await
    };
    if let Err(reason) = established {
        restart(reason).await;
    }
    ctx.address = board.station.address().map(|address| address.to_string());
    info!(
        "app: online ssid={:?} ip={:?}",
        ctx.ssid.as_deref(),
        ctx.address.as_deref()
    );

    let mut clock = SyncedClock::new();
    let mut next_clock_sync_ms = 0u64;
    sync_clock(&mut clock, &mut next_clock_sync_ms, board.stack, board.ntp_servers).await;

    let address = ctx.address.as_deref().unwrap_or("0.0.0.0");
    if let Err(err) =
        print_ready_banner(&mut board.printer, address, &ctx.schedule, DEFAULT_LINE_WIDTH).await
    {
        warn!("app: ready banner failed err={:?}", err);
    }

    let mut pipeline = AcquisitionPipeline::new(pipeline_config);
    loop {
        if let Err(reason) = manager.check_link(&mut ctx, &mut board.station) {
            restart(reason).await;
        }

        while let Ok(command) = requests.try_receive() {
            let reply = operator::apply(&mut ctx, &mut board.store, command);
            let restart_reason = match reply {
                OperatorReply::Restart(reason) => Some(reason),
                _ => None,
            };
            replies.send(reply).await;
            if let Some(reason) = restart_reason {
                restart(reason).await;
            }
        }

        sync_clock(&mut clock, &mut next_clock_sync_ms, board.stack, board.ntp_servers).await;

        let mut io = PipelineIo {
            store: &mut board.store,
            transport: &mut board.transport,
            probe: &mut board.probe,
            printer: &mut board.printer,
            delay: &mut board.delay,
        };
        let outcome = pipeline
            .tick(&mut ctx, &mut io, &clock, Instant::now().as_millis())
            .await;
        match outcome {
            TickOutcome::Offline | TickOutcome::WaitingForClock | TickOutcome::Idle => {}
            rendered => info!("app: tick outcome={:?}", rendered),
        }

        Timer::after_millis(TICK_INTERVAL_MS).await;
    }
}

async fn sync_clock(
    clock: &mut SyncedClock,
    next_sync_ms: &mut u64,
    stack: Stack<'_>,
    servers: &[&str],
) {
    let now_ms = Instant::now().as_millis();
    if now_ms < *next_sync_ms {
        return;
    }

    match sntp::query_any(stack, servers).await {
        Some(epoch_secs) => {
            let now_ms = Instant::now().as_millis();
            clock.sync(epoch_secs, now_ms);
            *next_sync_ms = now_ms + CLOCK_RESYNC_MS;
        }
        None => {
            warn!("app: clock sync failed; retrying in {}ms", CLOCK_RETRY_MS);
            *next_sync_ms = now_ms + CLOCK_RETRY_MS;
        }
    }
}

async fn restart(reason: RestartReason) -> ! {
    warn!("app: restarting reason={}", reason);
    Timer::after_millis(RESTART_GRACE_MS).await;
    esp_hal::system::software_reset()
}
