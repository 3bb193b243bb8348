//! Wall-clock anchoring, local time and the date strings printed on paper.

pub mod sntp;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, TimeDelta};
use core::fmt::Write;
use heapless::String;

const DAY_NAMES: [&str; 7] = ["So", "Mo", "Di", "Mi", "Do", "Fr", "Sa"];
const MONTH_NAMES: [&str; 12] = [
    "Januar",
    "Februar",
    "Maerz",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

pub const ISO_DATE_BYTES: usize = 10;
pub const HEADER_DATE_BYTES: usize = 24;

/// Source of "current epoch time", if known.
pub trait WallClock {
    /// Seconds since the Unix epoch at monotonic instant `now_ms`, or `None`
    /// before the first synchronization.
    fn epoch_secs(&self, now_ms: u64) -> Option<u64>;
}

/// Wall clock anchored to one network time sample and advanced by the
/// monotonic timer in between.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SyncedClock {
    anchor: Option<ClockAnchor>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct ClockAnchor {
    epoch_secs: u64,
    at_ms: u64,
}

impl SyncedClock {
    pub const fn new() -> Self {
        Self { anchor: None }
    }

    pub fn sync(&mut self, epoch_secs: u64, now_ms: u64) {
        self.anchor = Some(ClockAnchor {
            epoch_secs,
            at_ms: now_ms,
        });
    }

    pub const fn is_synced(&self) -> bool {
        self.anchor.is_some()
    }

    /// Monotonic instant of the last sync.
    pub fn synced_at_ms(&self) -> Option<u64> {
        self.anchor.map(|anchor| anchor.at_ms)
    }
}

impl WallClock for SyncedClock {
    fn epoch_secs(&self, now_ms: u64) -> Option<u64> {
        let anchor = self.anchor?;
        let elapsed_secs = now_ms.saturating_sub(anchor.at_ms) / 1_000;
        Some(anchor.epoch_secs.saturating_add(elapsed_secs))
    }
}

/// Local time policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeZone {
    Fixed { offset_secs: i32 },
    /// CET with the EU daylight saving switch (last Sunday of March and
    /// October, 01:00 UTC).
    CentralEuropean,
}

impl Default for TimeZone {
    fn default() -> Self {
        Self::Fixed { offset_secs: 3_600 }
    }
}

impl TimeZone {
    pub fn offset_secs(self, utc: NaiveDateTime) -> i32 {
        match self {
            Self::Fixed { offset_secs } => offset_secs,
            Self::CentralEuropean => {
                let year = utc.year();
                match (last_sunday_one_utc(year, 3), last_sunday_one_utc(year, 10)) {
                    (Some(start), Some(end)) if utc >= start && utc < end => 7_200,
                    _ => 3_600,
                }
            }
        }
    }

    pub fn local(self, epoch_secs: u64) -> Option<NaiveDateTime> {
        let secs = i64::try_from(epoch_secs).ok()?;
        let utc = DateTime::from_timestamp(secs, 0)?.naive_utc();
        let offset = TimeDelta::try_seconds(i64::from(self.offset_secs(utc)))?;
        utc.checked_add_signed(offset)
    }
}

fn last_sunday_one_utc(year: i32, month: u32) -> Option<NaiveDateTime> {
    let last = NaiveDate::from_ymd_opt(year, month, 31)?;
    let back = last.weekday().num_days_from_sunday();
    last.checked_sub_days(Days::new(u64::from(back)))?
        .and_hms_opt(1, 0, 0)
}

/// `YYYY-MM-DD`, the form persisted in the durable records.
pub fn format_iso_date(date: NaiveDate) -> String<ISO_DATE_BYTES> {
    let mut out = String::new();
    let _ = write!(
        out,
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month(),
        date.day()
    );
    out
}

pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.trim().splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Accepts `YYYY-MM-DD` or `DD/MM/YYYY`.
pub fn parse_custom_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.contains('-') {
        return parse_iso_date(text);
    }

    let mut parts = text.splitn(3, '/');
    let day = parts.next()?.parse::<u32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let year = parts.next()?.parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Receipt header date, e.g. `Fr, 16 Oktober 2026`.
pub fn format_header_date(date: NaiveDate) -> String<HEADER_DATE_BYTES> {
    let day_name = DAY_NAMES[date.weekday().num_days_from_sunday() as usize];
    let month_name = MONTH_NAMES[date.month0() as usize];
    let mut out = String::new();
    let _ = write!(
        out,
        "{}, {:02} {} {}",
        day_name,
        date.day(),
        month_name,
        date.year()
    );
    out
}
