//! Serial logger that also keeps the recent lines for the operator `/logs`
//! page.

use alloc::string::String;
use core::{cell::RefCell, fmt::Write};

use critical_section::Mutex;
use log::{LevelFilter, Log, Metadata, Record};
use scribe_core::log_ring::{LOG_LINE_BYTES, LogRing};

static LOG_RING: Mutex<RefCell<LogRing>> = Mutex::new(RefCell::new(LogRing::new()));
static LOGGER: RingLogger = RingLogger;

struct RingLogger;

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let uptime_ms = embassy_time::Instant::now().as_millis();
        esp_println::println!("[{}] {} - {}", uptime_ms, record.level(), record.args());

        // Overlong lines keep whatever fit.
        let mut line = heapless::String::<LOG_LINE_BYTES>::new();
        let _ = write!(line, "[{}] {} {}", uptime_ms, record.level(), record.args());
        critical_section::with(|cs| LOG_RING.borrow_ref_mut(cs).push(&line));
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Oldest first, one line per entry.
pub fn recent() -> String {
    critical_section::with(|cs| LOG_RING.borrow_ref(cs).render())
}
