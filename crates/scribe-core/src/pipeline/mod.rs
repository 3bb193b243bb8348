//! Scheduled acquisition pipeline.
//!
//! One [`AcquisitionPipeline::tick`] runs, in order: schedule evaluation
//! (throttled), the cache-readiness gate (fetch/extract/persist with
//! bounded retries), the render step, and finally any queued receipt.
//! Nothing happens while offline or before the wall clock has been set.

use chrono::{NaiveDate, NaiveDateTime};
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

use crate::{
    cache::{CacheEntry, load_cache, store_cache},
    clock::{TimeZone, WallClock, format_header_date},
    context::AppContext,
    error::{FetchAttemptError, FetchFailure, HttpStatus},
    extract::extract_content,
    job::JobOrigin,
    render::{
        CACHE_FALLBACK_TEXT, DEFAULT_LINE_WIDTH, ReceiptPrinter, format_diagnostic, print_dated,
        print_receipt,
    },
    retry::{RetryOutcome, RetryPolicy, retry, with_deadline},
    settings::save_last_fire_date,
    storage::BlobStore,
    transport::{ContentTransport, PayloadBuffer, ReachabilityProbe},
};

pub const DEFAULT_SOURCE_URL: &str = "https://www.hahaha.de/witze/witzdestages.txt";
pub const DEFAULT_PROBE_HOST: &str = "google.com";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PipelineConfig {
    pub source_url: &'static str,
    pub retry: RetryPolicy,
    pub payload_cap_bytes: usize,
    /// Ceiling on one GET including the body read.
    pub fetch_timeout_ms: u32,
    pub schedule_check_interval_ms: u64,
    pub line_width: usize,
    pub time_zone: TimeZone,
    /// Host named in the diagnostic when the probe fails.
    pub probe_host: &'static str,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL,
            retry: RetryPolicy::default(),
            payload_cap_bytes: 5_000,
            fetch_timeout_ms: 10_000,
            schedule_check_interval_ms: 60_000,
            line_width: DEFAULT_LINE_WIDTH,
            time_zone: TimeZone::default(),
            probe_host: DEFAULT_PROBE_HOST,
        }
    }
}

/// Borrowed collaborators for one tick.
pub struct PipelineIo<'a, S, T, Q, P, D> {
    pub store: &'a mut S,
    pub transport: &'a mut T,
    pub probe: &'a mut Q,
    pub printer: &'a mut P,
    pub delay: &'a mut D,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    Offline,
    WaitingForClock,
    Idle,
    Rendered { scheduled: bool, fetched: bool },
    RenderedFallback,
    RenderedDiagnostic { attempts: u8 },
}

pub struct AcquisitionPipeline {
    config: PipelineConfig,
    last_schedule_check_ms: Option<u64>,
}

impl AcquisitionPipeline {
    pub const fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            last_schedule_check_ms: None,
        }
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn tick<S, T, Q, P, D, C>(
        &mut self,
        ctx: &mut AppContext,
        io: &mut PipelineIo<'_, S, T, Q, P, D>,
        clock: &C,
        now_ms: u64,
    ) -> TickOutcome
    where
        S: BlobStore,
        T: ContentTransport,
        Q: ReachabilityProbe,
        P: ReceiptPrinter,
        D: DelayNs,
        C: WallClock,
    {
        if !ctx.is_online() {
            return TickOutcome::Offline;
        }
        let Some(epoch_secs) = clock.epoch_secs(now_ms) else {
            return TickOutcome::WaitingForClock;
        };
        let Some(local) = self.config.time_zone.local(epoch_secs) else {
            return TickOutcome::WaitingForClock;
        };
        let today = local.date();

        self.evaluate_schedule(ctx, now_ms, local);

        let outcome = if ctx.jobs.wants_render() {
            self.run_job(ctx, io, today, epoch_secs).await
        } else {
            TickOutcome::Idle
        };

        if let Some(receipt) = ctx.receipt.take() {
            let header = format_header_date(receipt.custom_date.unwrap_or(today));
            info!("pipeline: printing receipt header={}", header);
            if let Err(err) =
                print_receipt(io.printer, &header, &receipt.message, self.config.line_width).await
            {
                warn!("pipeline: receipt print failed err={:?}", err);
            }
        }

        outcome
    }

    fn evaluate_schedule(&mut self, ctx: &mut AppContext, now_ms: u64, local: NaiveDateTime) {
        if let Some(last) = self.last_schedule_check_ms
            && now_ms.saturating_sub(last) < self.config.schedule_check_interval_ms
        {
            return;
        }
        self.last_schedule_check_ms = Some(now_ms);

        let schedule = ctx.schedule;
        if schedule.fired_on(local.date()) {
            return;
        }
        if schedule.daily_fire_time.is_reached_by(local.time())
            && ctx.jobs.request(JobOrigin::Scheduled)
        {
            info!(
                "pipeline: scheduled print due fire_time={} now={}",
                schedule.daily_fire_time,
                local.time()
            );
        }
    }

    async fn run_job<S, T, Q, P, D>(
        &mut self,
        ctx: &mut AppContext,
        io: &mut PipelineIo<'_, S, T, Q, P, D>,
        today: NaiveDate,
        epoch_secs: u64,
    ) -> TickOutcome
    where
        S: BlobStore,
        T: ContentTransport,
        Q: ReachabilityProbe,
        P: ReceiptPrinter,
        D: DelayNs,
    {
        let scheduled = ctx.jobs.is_scheduled();
        let header = format_header_date(today);
        let width = self.config.line_width;

        let fetched = match self.ensure_cache(io, today, epoch_secs).await {
            Ok(fetched) => fetched,
            Err((error, attempts)) => {
                warn!(
                    "pipeline: all {} attempts failed, printing diagnostic {}",
                    attempts, error
                );
                let diagnostic = format_diagnostic(&error, attempts, self.config.probe_host);
                if let Err(err) = print_dated(io.printer, &header, &diagnostic, width).await {
                    warn!("pipeline: diagnostic print failed err={:?}", err);
                }
                ctx.jobs.clear();
                return TickOutcome::RenderedDiagnostic { attempts };
            }
        };

        let cached = match load_cache(io.store) {
            Ok(entry) => entry.filter(|entry| entry.is_valid_for(today) && !entry.text.is_empty()),
            Err(err) => {
                warn!("pipeline: cache read failed err={}", err);
                None
            }
        };

        let outcome = match cached {
            Some(entry) => {
                info!(
                    "pipeline: printing content scheduled={} chars={}",
                    scheduled,
                    entry.text.chars().count()
                );
                if let Err(err) = print_dated(io.printer, &header, &entry.text, width).await {
                    warn!("pipeline: content print failed err={:?}", err);
                }
                if scheduled {
                    ctx.schedule.last_fire_date = Some(today);
                    if let Err(err) = save_last_fire_date(io.store, today) {
                        warn!("pipeline: saving last print date failed err={}", err);
                    }
                }
                TickOutcome::Rendered { scheduled, fetched }
            }
            None => {
                warn!("pipeline: cached content missing after readiness gate");
                if let Err(err) = print_dated(io.printer, &header, CACHE_FALLBACK_TEXT, width).await
                {
                    warn!("pipeline: fallback print failed err={:?}", err);
                }
                TickOutcome::RenderedFallback
            }
        };

        ctx.jobs.clear();
        outcome
    }

    /// Returns whether a fetch was needed, or the last error and attempt
    /// count once every attempt failed.
    async fn ensure_cache<S, T, Q, P, D>(
        &self,
        io: &mut PipelineIo<'_, S, T, Q, P, D>,
        today: NaiveDate,
        epoch_secs: u64,
    ) -> Result<bool, (FetchAttemptError, u8)>
    where
        S: BlobStore,
        T: ContentTransport,
        Q: ReachabilityProbe,
        D: DelayNs,
    {
        match load_cache(io.store) {
            Ok(Some(entry)) if entry.is_valid_for(today) => return Ok(false),
            Ok(_) => {}
            Err(err) => warn!("pipeline: cache read failed, refetching err={}", err),
        }
        info!("pipeline: cache not dated today, fetching {}", self.config.source_url);

        let config = &self.config;
        let store = &mut *io.store;
        let transport = &mut *io.transport;
        let probe = &mut *io.probe;
        let max_attempts = config.retry.max_attempts.max(1);

        let outcome = retry(config.retry, &mut *io.delay, async |attempt: u8, delay: &mut D| {
            let upstream_reachable = if attempt > 1 {
                let reachable = probe.probe().await;
                if !reachable {
                    warn!("pipeline: upstream probe failed before attempt {}", attempt);
                }
                reachable
            } else {
                true
            };

            info!("pipeline: fetch attempt {}/{}", attempt, max_attempts);
            fetch_once(config, store, transport, delay, today, epoch_secs)
                .await
                .map_err(|(status, failure)| {
                    let error = FetchAttemptError {
                        status,
                        upstream_reachable,
                        failure,
                        attempt,
                    };
                    warn!("pipeline: {}", error);
                    error
                })
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                info!(
                    "pipeline: cached content date={} attempts={} chars={}",
                    value.date,
                    attempts,
                    value.text.chars().count()
                );
                Ok(true)
            }
            RetryOutcome::Exhausted {
                last_error,
                attempts,
            } => Err((last_error, attempts)),
        }
    }
}

/// One GET → extract → persist attempt. The payload buffer never outlives
/// this call. A GET still pending after `fetch_timeout_ms` is a transport
/// failure.
async fn fetch_once<S: BlobStore, T: ContentTransport, D: DelayNs>(
    config: &PipelineConfig,
    store: &mut S,
    transport: &mut T,
    delay: &mut D,
    today: NaiveDate,
    epoch_secs: u64,
) -> Result<CacheEntry, (HttpStatus, FetchFailure)> {
    let extracted = {
        let mut payload = PayloadBuffer::new(config.payload_cap_bytes);
        let response = with_deadline(
            delay,
            config.fetch_timeout_ms,
            transport.get(config.source_url, &mut payload),
        )
        .await;
        let status = match response {
            Some(Ok(status)) => status,
            Some(Err(err)) => return Err(transport_failure(alloc::format!("{:?}", err))),
            None => {
                let detail = alloc::format!("timed out after {}ms", config.fetch_timeout_ms);
                return Err(transport_failure(detail));
            }
        };
        if status != 200 {
            return Err((
                HttpStatus::Code(status),
                FetchFailure::ProtocolError { status },
            ));
        }
        info!(
            "pipeline: payload received bytes={} capped={} truncated={}",
            payload.len(),
            payload.is_capped(),
            payload.is_truncated()
        );
        extract_content(payload.as_bytes())
    };

    let text = extracted
        .map_err(|err| (HttpStatus::Code(200), FetchFailure::ExtractionFailure(err)))?;
    let entry = CacheEntry {
        date: today,
        text,
        fetched_at_epoch: epoch_secs,
        source: alloc::string::String::from(config.source_url),
    };
    store_cache(store, &entry)
        .map_err(|err| (HttpStatus::Code(200), FetchFailure::StorageFailure(err)))?;
    Ok(entry)
}

fn transport_failure(detail: alloc::string::String) -> (HttpStatus, FetchFailure) {
    (
        HttpStatus::TransportFailed,
        FetchFailure::TransportFailure { detail },
    )
}

#[cfg(test)]
mod tests;
