use super::*;
use crate::{
    cache::CACHE_BLOB,
    clock::SyncedClock,
    connectivity::ConnectivityState,
    job::ReceiptJob,
    settings::load_schedule,
    storage::BlobStore,
    testing::{
        FlakyStore, RecordingDelay, RecordingPrinter, ScriptedProbe, ScriptedTransport,
        TransportStep,
    },
};
use alloc::{string::String, vec, vec::Vec};
use embassy_futures::block_on;

const HEADER: &str = "  Fr, 16 Oktober 2026  ";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

/// UTC seconds for `today()`; local time is one hour ahead.
fn utc_epoch(hour: u32, minute: u32, second: u32) -> u64 {
    today()
        .and_hms_opt(hour, minute, second)
        .unwrap()
        .and_utc()
        .timestamp() as u64
}

fn page(inner: &str) -> Vec<u8> {
    alloc::format!("<html><div id=\"witzdestages\">{}</div></html>", inner).into_bytes()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy::new(3, 5),
        ..PipelineConfig::default()
    }
}

struct Rig {
    store: FlakyStore,
    transport: ScriptedTransport,
    probe: ScriptedProbe,
    printer: RecordingPrinter,
    delay: RecordingDelay,
    clock: SyncedClock,
    ctx: AppContext,
    pipeline: AcquisitionPipeline,
}

impl Rig {
    /// Online, clock synced so that `now_ms == 0` is `utc_epoch(h, m, s)`.
    fn new(
        steps: impl IntoIterator<Item = TransportStep>,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Self {
        let mut clock = SyncedClock::new();
        clock.sync(utc_epoch(hour, minute, second), 0);
        Self {
            store: FlakyStore::default(),
            transport: ScriptedTransport::new(steps),
            probe: ScriptedProbe::always(true),
            printer: RecordingPrinter::default(),
            delay: RecordingDelay::default(),
            clock,
            ctx: AppContext {
                connectivity: ConnectivityState::AttachedOnline,
                ..AppContext::default()
            },
            pipeline: AcquisitionPipeline::new(config()),
        }
    }

    fn tick(&mut self, now_ms: u64) -> TickOutcome {
        let mut io = PipelineIo {
            store: &mut self.store,
            transport: &mut self.transport,
            probe: &mut self.probe,
            printer: &mut self.printer,
            delay: &mut self.delay,
        };
        block_on(self.pipeline.tick(&mut self.ctx, &mut io, &self.clock, now_ms))
    }

    fn seed_cache(&mut self, date: NaiveDate, text: &str) {
        let entry = CacheEntry {
            date,
            text: text.into(),
            fetched_at_epoch: 1,
            source: DEFAULT_SOURCE_URL.into(),
        };
        store_cache(&mut self.store, &entry).unwrap();
    }
}

#[test]
fn nothing_happens_while_offline() {
    let mut rig = Rig::new([], 8, 30, 0);
    rig.ctx.connectivity = ConnectivityState::AttachedUnverified;
    rig.ctx.jobs.request(JobOrigin::Manual);

    assert_eq!(rig.tick(0), TickOutcome::Offline);
    assert_eq!(rig.transport.calls(), 0);
    assert!(rig.printer.ops.is_empty());
    assert!(rig.ctx.jobs.wants_render());
}

#[test]
fn nothing_happens_before_the_clock_is_set() {
    let mut rig = Rig::new([], 8, 30, 0);
    rig.clock = SyncedClock::new();
    rig.ctx.jobs.request(JobOrigin::Manual);

    assert_eq!(rig.tick(0), TickOutcome::WaitingForClock);
    assert_eq!(rig.transport.calls(), 0);
    assert!(rig.ctx.jobs.wants_render());
}

#[test]
fn scheduled_fire_fetches_prints_and_records_the_date() {
    let mut rig = Rig::new([TransportStep::Ok(page("Hallo Welt"))], 8, 30, 0);

    assert_eq!(
        rig.tick(0),
        TickOutcome::Rendered {
            scheduled: true,
            fetched: true
        }
    );
    assert_eq!(rig.transport.urls, vec![String::from(DEFAULT_SOURCE_URL)]);
    assert_eq!(rig.printer.lines(), vec![HEADER, "Hallo Welt"]);
    assert_eq!(rig.ctx.schedule.last_fire_date, Some(today()));
    assert_eq!(load_schedule(&mut rig.store).last_fire_date, Some(today()));
    assert!(!rig.ctx.jobs.wants_render());

    let cached = load_cache(&mut rig.store).unwrap().unwrap();
    assert_eq!(cached.date, today());
    assert_eq!(cached.text, "Hallo Welt");
    assert_eq!(cached.fetched_at_epoch, utc_epoch(8, 30, 0));
}

#[test]
fn fires_at_most_once_per_day() {
    let mut rig = Rig::new([TransportStep::Ok(page("Hallo"))], 8, 30, 0);
    rig.tick(0);
    let printed = rig.printer.ops.len();

    assert_eq!(rig.tick(61_000), TickOutcome::Idle);
    assert_eq!(rig.tick(3_600_000), TickOutcome::Idle);
    assert_eq!(rig.printer.ops.len(), printed);
    assert_eq!(rig.transport.calls(), 1);
}

#[test]
fn does_not_fire_before_the_configured_time() {
    let mut rig = Rig::new([], 7, 59, 0);
    assert_eq!(rig.tick(0), TickOutcome::Idle);
    assert!(!rig.ctx.jobs.wants_render());
    assert_eq!(rig.transport.calls(), 0);
}

#[test]
fn schedule_evaluation_is_throttled() {
    // 08:59:50 local at now_ms == 0.
    let mut rig = Rig::new([TransportStep::Ok(page("Hallo"))], 7, 59, 50);

    assert_eq!(rig.tick(0), TickOutcome::Idle);
    assert_eq!(rig.tick(30_000), TickOutcome::Idle);
    assert!(!rig.ctx.jobs.wants_render());
    assert_eq!(
        rig.tick(60_000),
        TickOutcome::Rendered {
            scheduled: true,
            fetched: true
        }
    );
}

#[test]
fn manual_print_reuses_todays_cache() {
    let mut rig = Rig::new([], 7, 0, 0);
    rig.seed_cache(today(), "Schon da");
    rig.ctx.jobs.request(JobOrigin::Manual);

    assert_eq!(
        rig.tick(0),
        TickOutcome::Rendered {
            scheduled: false,
            fetched: false
        }
    );
    assert_eq!(rig.transport.calls(), 0);
    assert_eq!(rig.printer.lines(), vec![HEADER, "Schon da"]);
    assert_eq!(rig.ctx.schedule.last_fire_date, None);
    assert_eq!(load_schedule(&mut rig.store).last_fire_date, None);
}

#[test]
fn yesterdays_cache_is_refetched() {
    let mut rig = Rig::new([TransportStep::Ok(page("Neu"))], 7, 0, 0);
    rig.seed_cache(today().pred_opt().unwrap(), "Alt");
    rig.ctx.jobs.request(JobOrigin::Manual);

    assert_eq!(
        rig.tick(0),
        TickOutcome::Rendered {
            scheduled: false,
            fetched: true
        }
    );
    assert_eq!(rig.printer.lines(), vec![HEADER, "Neu"]);
}

#[test]
fn manual_request_raised_first_leaves_the_schedule_pending() {
    let mut rig = Rig::new([TransportStep::Ok(page("Hallo"))], 8, 30, 0);
    rig.ctx.jobs.request(JobOrigin::Manual);

    assert_eq!(
        rig.tick(0),
        TickOutcome::Rendered {
            scheduled: false,
            fetched: true
        }
    );
    assert_eq!(rig.ctx.schedule.last_fire_date, None);

    assert_eq!(
        rig.tick(60_000),
        TickOutcome::Rendered {
            scheduled: true,
            fetched: false
        }
    );
    assert_eq!(rig.ctx.schedule.last_fire_date, Some(today()));
}

#[test]
fn transient_failures_are_retried_with_backoff_and_probe() {
    let mut rig = Rig::new(
        [
            TransportStep::Status(503),
            TransportStep::Fail("tls handshake"),
            TransportStep::Ok(page("Endlich")),
        ],
        8,
        30,
        0,
    );

    assert_eq!(
        rig.tick(0),
        TickOutcome::Rendered {
            scheduled: true,
            fetched: true
        }
    );
    assert_eq!(rig.transport.calls(), 3);
    assert_eq!(rig.probe.calls, 2);
    assert_eq!(rig.delay.sleeps_ms, vec![5, 5]);
    assert_eq!(rig.printer.lines(), vec![HEADER, "Endlich"]);
}

#[test]
fn stalled_fetch_times_out_and_is_retried() {
    let mut rig = Rig::new(
        [TransportStep::Hang, TransportStep::Ok(page("Doch noch"))],
        8,
        30,
        0,
    );

    assert_eq!(
        rig.tick(0),
        TickOutcome::Rendered {
            scheduled: true,
            fetched: true
        }
    );
    assert_eq!(rig.transport.calls(), 2);
    assert_eq!(rig.delay.sleeps_ms, vec![10_000, 5]);
    assert_eq!(rig.printer.lines(), vec![HEADER, "Doch noch"]);
}

#[test]
fn fetches_that_never_answer_end_in_a_connection_diagnostic() {
    let mut rig = Rig::new(
        [TransportStep::Hang, TransportStep::Hang, TransportStep::Hang],
        8,
        30,
        0,
    );

    assert_eq!(rig.tick(0), TickOutcome::RenderedDiagnostic { attempts: 3 });
    assert_eq!(rig.delay.sleeps_ms, vec![10_000, 5, 10_000, 5, 10_000]);
    let lines = rig.printer.lines();
    assert!(lines.iter().any(|line| line == "CONNECTION_FAILED"));
    assert!(!rig.ctx.jobs.wants_render());
}

#[test]
fn exhaustion_prints_a_diagnostic_and_keeps_the_schedule_open() {
    let mut rig = Rig::new(
        [
            TransportStep::Status(404),
            TransportStep::Status(404),
            TransportStep::Status(404),
        ],
        8,
        30,
        0,
    );

    assert_eq!(rig.tick(0), TickOutcome::RenderedDiagnostic { attempts: 3 });
    let lines = rig.printer.lines();
    assert_eq!(lines[0], HEADER);
    assert!(lines.iter().any(|line| line == "=== JOKE FETCH ERROR ==="));
    assert!(lines.iter().any(|line| line == "Failed after 3 attempts"));
    assert!(lines.iter().any(|line| line == "HTTP Code: 404 (Not Found)"));
    assert!(lines.iter().any(|line| line == "HTTP_ERROR"));
    assert!(lines.iter().any(|line| line == "Joke source not found (404)"));
    assert!(!lines.iter().any(|line| line.starts_with("WARNING")));

    assert!(!rig.ctx.jobs.wants_render());
    assert_eq!(rig.ctx.schedule.last_fire_date, None);
    assert_eq!(load_cache(&mut rig.store).unwrap(), None);
}

#[test]
fn unreachable_upstream_is_called_out() {
    let mut rig = Rig::new(
        [
            TransportStep::Fail("dns"),
            TransportStep::Fail("dns"),
            TransportStep::Fail("dns"),
        ],
        8,
        30,
        0,
    );
    rig.probe = ScriptedProbe::always(false);

    assert_eq!(rig.tick(0), TickOutcome::RenderedDiagnostic { attempts: 3 });
    let lines = rig.printer.lines();
    assert!(lines.iter().any(|line| line == "WARNING: No internet"));
    assert!(lines.iter().any(|line| line == "(google.com unreachable)"));
    assert!(lines.iter().any(|line| line == "CONNECTION_FAILED"));
}

#[test]
fn missing_marker_is_a_processing_failure() {
    let mut rig = Rig::new(
        [
            TransportStep::Ok(b"<html>umgebaut</html>".to_vec()),
            TransportStep::Ok(b"<html>umgebaut</html>".to_vec()),
            TransportStep::Ok(b"<html>umgebaut</html>".to_vec()),
        ],
        8,
        30,
        0,
    );

    assert_eq!(rig.tick(0), TickOutcome::RenderedDiagnostic { attempts: 3 });
    let lines = rig.printer.lines();
    assert!(lines.iter().any(|line| line == "PROCESSING_FAILED"));
    assert!(lines.iter().any(|line| line == "Error: Could not find"));
}

#[test]
fn failing_cache_writes_are_file_errors() {
    let mut rig = Rig::new(
        [
            TransportStep::Ok(page("Hallo")),
            TransportStep::Ok(page("Hallo")),
            TransportStep::Ok(page("Hallo")),
        ],
        8,
        30,
        0,
    );
    rig.store.fail_writes = true;

    assert_eq!(rig.tick(0), TickOutcome::RenderedDiagnostic { attempts: 3 });
    assert!(rig.printer.lines().iter().any(|line| line == "FILE_IO_ERROR"));
    assert!(!rig.store.inner.exists(CACHE_BLOB).unwrap());
}

#[test]
fn queued_receipt_prints_after_the_job_with_its_own_date() {
    let mut rig = Rig::new([], 7, 0, 0);
    rig.ctx.receipt = Some(ReceiptJob {
        custom_date: NaiveDate::from_ymd_opt(2026, 12, 24),
        message: "Milch kaufen".into(),
    });

    assert_eq!(rig.tick(0), TickOutcome::Idle);
    assert_eq!(
        rig.printer.lines(),
        vec!["Do, 24 Dezember 2026", "Milch kaufen"]
    );
    assert_eq!(rig.ctx.receipt, None);
}

#[test]
fn receipt_waits_for_connectivity() {
    let mut rig = Rig::new([], 7, 0, 0);
    rig.ctx.connectivity = ConnectivityState::Provisioning;
    rig.ctx.receipt = Some(ReceiptJob {
        custom_date: None,
        message: "Spaeter".into(),
    });

    assert_eq!(rig.tick(0), TickOutcome::Offline);
    assert!(rig.ctx.receipt.is_some());

    rig.ctx.connectivity = ConnectivityState::AttachedOnline;
    rig.tick(1_000);
    assert_eq!(rig.printer.lines(), vec!["Fr, 16 Oktober 2026", "Spaeter"]);
}

#[test]
fn manual_request_while_scheduled_renders_once_as_scheduled() {
    let mut rig = Rig::new([TransportStep::Ok(page("Hallo"))], 7, 0, 0);
    rig.ctx.jobs.request(JobOrigin::Scheduled);
    let reply = crate::operator::apply(
        &mut rig.ctx,
        &mut rig.store,
        crate::operator::OperatorCommand::PrintNow,
    );
    assert_eq!(reply, crate::operator::OperatorReply::PrintQueued);

    assert_eq!(
        rig.tick(0),
        TickOutcome::Rendered {
            scheduled: true,
            fetched: true
        }
    );
    assert_eq!(rig.tick(60_000), TickOutcome::Idle);
    assert_eq!(rig.printer.lines(), vec![HEADER, "Hallo"]);
    assert_eq!(rig.ctx.schedule.last_fire_date, Some(today()));
}

#[test]
fn tenth_attempt_success_uses_the_full_backoff_ladder() {
    let mut steps: Vec<TransportStep> = (0..9).map(|_| TransportStep::Status(500)).collect();
    steps.push(TransportStep::Ok(page("Zehn")));
    let mut rig = Rig::new(steps, 8, 30, 0);
    rig.pipeline = AcquisitionPipeline::new(PipelineConfig::default());

    assert_eq!(
        rig.tick(0),
        TickOutcome::Rendered {
            scheduled: true,
            fetched: true
        }
    );
    assert_eq!(rig.transport.calls(), 10);
    assert_eq!(rig.delay.sleeps_ms, vec![10_000; 9]);
    assert_eq!(
        load_cache(&mut rig.store).unwrap().map(|entry| entry.date),
        Some(today())
    );
}

#[test]
fn ten_failures_leave_the_cache_untouched() {
    let mut rig = Rig::new([], 8, 30, 0);
    rig.pipeline = AcquisitionPipeline::new(PipelineConfig::default());
    rig.seed_cache(today().pred_opt().unwrap(), "Gestern");

    assert_eq!(rig.tick(0), TickOutcome::RenderedDiagnostic { attempts: 10 });
    assert_eq!(rig.transport.calls(), 10);
    assert!(rig.printer.lines().iter().any(|line| line == "Failed after 10 attempts"));
    let cached = load_cache(&mut rig.store).unwrap().unwrap();
    assert_eq!(cached.text, "Gestern");
}
