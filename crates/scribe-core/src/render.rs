//! Paper layouts on top of the printer's line primitives.

use alloc::{format, string::String, vec::Vec};
use core::fmt::{self, Write};

use crate::{
    clock::format_iso_date,
    error::{FetchAttemptError, HttpStatus},
    settings::ScheduleConfig,
};

pub const DEFAULT_LINE_WIDTH: usize = 32;
pub const CACHE_FALLBACK_TEXT: &str = "Error: Cache corrupted or empty";

/// Output sink. Implementations own character-set conversion.
#[allow(async_fn_in_trait)]
pub trait ReceiptPrinter {
    type Error: fmt::Debug;

    async fn print_line(&mut self, line: &str) -> Result<(), Self::Error>;
    async fn set_inverse(&mut self, enabled: bool) -> Result<(), Self::Error>;
    async fn advance_paper(&mut self, lines: u8) -> Result<(), Self::Error>;
}

/// Splits `text` into printable lines of at most `width` chars.
///
/// Each `\n` starts a new paragraph. Within a paragraph the break goes at
/// the last whitespace at or before column `width`; a word longer than the
/// line is hard-broken.
pub fn wrap_lines(text: &str, width: usize) -> Vec<&str> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut rest = paragraph.trim();
        if rest.is_empty() {
            lines.push("");
            continue;
        }

        while !rest.is_empty() {
            let Some((limit, at_limit)) = rest.char_indices().nth(width) else {
                lines.push(rest);
                break;
            };
            let window = &rest[..limit + at_limit.len_utf8()];
            let split = window
                .char_indices()
                .filter(|(_, ch)| ch.is_whitespace())
                .map(|(index, _)| index)
                .next_back()
                .filter(|index| *index > 0);

            let (line, tail) = match split {
                Some(index) => rest.split_at(index),
                None => rest.split_at(limit),
            };
            lines.push(line.trim_end());
            rest = tail.trim_start();
        }
    }

    lines
}

pub async fn print_wrapped<P: ReceiptPrinter>(
    printer: &mut P,
    text: &str,
    width: usize,
) -> Result<(), P::Error> {
    for line in wrap_lines(text, width) {
        printer.print_line(line).await?;
    }
    Ok(())
}

/// Daily layout: blank lead-in, inverse date banner, body, blank tail.
pub async fn print_dated<P: ReceiptPrinter>(
    printer: &mut P,
    header_date: &str,
    body: &str,
    width: usize,
) -> Result<(), P::Error> {
    printer.advance_paper(2).await?;
    printer.set_inverse(true).await?;
    printer.print_line(&format!("  {}  ", header_date)).await?;
    printer.set_inverse(false).await?;
    print_wrapped(printer, body, width).await?;
    printer.advance_paper(2).await
}

pub async fn print_receipt<P: ReceiptPrinter>(
    printer: &mut P,
    header_date: &str,
    message: &str,
    width: usize,
) -> Result<(), P::Error> {
    printer.set_inverse(true).await?;
    printer.print_line(header_date).await?;
    printer.set_inverse(false).await?;
    print_wrapped(printer, message, width).await?;
    printer.advance_paper(2).await
}

/// Startup banner with the operator address and schedule.
pub async fn print_ready_banner<P: ReceiptPrinter>(
    printer: &mut P,
    address: &str,
    schedule: &ScheduleConfig,
    width: usize,
) -> Result<(), P::Error> {
    printer.print_line("PRINTER SERVER READY").await?;
    print_wrapped(printer, &format!("Server started at {}", address), width).await?;
    print_wrapped(
        printer,
        &format!("Daily print: {}", schedule.daily_fire_time),
        width,
    )
    .await?;
    let last_printed = match schedule.last_fire_date {
        Some(date) => format!("Last printed: {}", format_iso_date(date)),
        None => String::from("Last printed: Never"),
    };
    print_wrapped(printer, &last_printed, width).await?;
    printer.advance_paper(3).await
}

/// Text printed in place of content once every attempt failed.
pub fn format_diagnostic(error: &FetchAttemptError, attempts: u8, probe_host: &str) -> String {
    let mut out = String::new();
    let _ = write!(out, "=== JOKE FETCH ERROR ===\n\nFailed after {} attempts\n\n", attempts);

    match error.status {
        HttpStatus::Code(code) => {
            let _ = write!(out, "HTTP Code: {}", code);
            if let Some(label) = error.status.label() {
                let _ = write!(out, " ({})", label);
            }
            out.push_str("\n\n");
        }
        HttpStatus::TransportFailed => out.push_str("Connection failed\n\n"),
    }

    if !error.upstream_reachable {
        let _ = write!(
            out,
            "WARNING: No internet\nconnection detected\n({} unreachable)\n\n",
            probe_host
        );
    }

    let _ = write!(out, "Error Type:\n{}\n\n{}", error.kind().as_str(), error.failure);
    out
}
