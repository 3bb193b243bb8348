#![cfg_attr(not(test), no_std)]

//! Serial thermal receipt printer (ESC/POS subset) driver primitives.

pub mod charset;
pub mod protocol;

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::Write;
use log::debug;

pub use protocol::HeatConfig;

const LINE_CHUNK_BYTES: usize = 64;

/// Driver configuration. The settle delays give the printer time to act on
/// a command before the next one arrives; its UART input buffer is small.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    pub heat: HeatConfig,
    /// Wait after power-up for the supply capacitor to charge.
    pub power_up_ms: u32,
    pub reset_settle_ms: u32,
    pub config_settle_ms: u32,
    pub mode_settle_ms: u32,
    pub line_settle_ms: u32,
    pub feed_settle_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heat: HeatConfig::default(),
            power_up_ms: 3_000,
            reset_settle_ms: 500,
            config_settle_ms: 200,
            mode_settle_ms: 100,
            line_settle_ms: 50,
            feed_settle_ms: 100,
        }
    }
}

/// Driver errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Error<E> {
    /// Serial write failed.
    Write(E),
    /// Configuration values are outside supported bounds.
    InvalidConfig,
}

/// Thermal printer on a write-only serial link.
#[derive(Debug)]
pub struct ThermalPrinter<W, D> {
    port: W,
    delay: D,
    config: Config,
}

impl<W, D> ThermalPrinter<W, D>
where
    W: Write,
    D: DelayNs,
{
    pub fn new(port: W, delay: D, config: Config) -> Self {
        Self {
            port,
            delay,
            config,
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Releases the serial port and delay.
    pub fn release(self) -> (W, D) {
        (self.port, self.delay)
    }

    /// Power-up wait, reset and heat configuration.
    pub async fn initialize(&mut self) -> Result<(), Error<W::Error>> {
        let heat = protocol::heat_config(self.config.heat).ok_or(Error::InvalidConfig)?;

        debug!("printer: waiting {}ms for power-up", self.config.power_up_ms);
        self.delay.delay_ms(self.config.power_up_ms).await;

        self.send(&protocol::RESET).await?;
        self.delay.delay_ms(self.config.reset_settle_ms).await;

        self.send(&heat).await?;
        self.delay.delay_ms(self.config.config_settle_ms).await;
        debug!("printer: ready heat={:?}", self.config.heat);
        Ok(())
    }

    pub async fn set_inverse(&mut self, enabled: bool) -> Result<(), Error<W::Error>> {
        self.send(&protocol::inverse(enabled)).await?;
        self.delay.delay_ms(self.config.mode_settle_ms).await;
        Ok(())
    }

    /// Prints `text` followed by a line feed. Text is transliterated to the
    /// printer's ASCII code page.
    pub async fn print_line(&mut self, text: &str) -> Result<(), Error<W::Error>> {
        let mut chunk = [0u8; LINE_CHUNK_BYTES];
        let mut len = 0;
        for byte in charset::printable_bytes(text) {
            chunk[len] = byte;
            len += 1;
            if len == chunk.len() {
                self.send(&chunk).await?;
                len = 0;
            }
        }
        chunk[len] = protocol::LF;
        self.send(&chunk[..=len]).await?;
        self.delay.delay_ms(self.config.line_settle_ms).await;
        Ok(())
    }

    pub async fn feed(&mut self, lines: u8) -> Result<(), Error<W::Error>> {
        for _ in 0..lines {
            self.send(&[protocol::LF]).await?;
            self.delay.delay_ms(self.config.feed_settle_ms).await;
        }
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), Error<W::Error>> {
        self.port.write_all(bytes).await.map_err(Error::Write)?;
        self.port.flush().await.map_err(Error::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embedded_io_async::ErrorType;

    #[derive(Default)]
    struct Wire {
        bytes: Vec<u8>,
    }

    impl ErrorType for Wire {
        type Error = Infallible;
    }

    impl Write for Wire {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    #[derive(Default)]
    struct Waits {
        total_ms: u64,
    }

    impl DelayNs for Waits {
        async fn delay_ns(&mut self, ns: u32) {
            self.total_ms += u64::from(ns) / 1_000_000;
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.total_ms += u64::from(ms);
        }
    }

    fn printer() -> ThermalPrinter<Wire, Waits> {
        ThermalPrinter::new(Wire::default(), Waits::default(), Config::default())
    }

    #[test]
    fn initialize_resets_then_configures_heat() {
        let mut printer = printer();
        block_on(printer.initialize()).unwrap();
        let (wire, waits) = printer.release();
        assert_eq!(wire.bytes, [0x1B, b'@', 0x1B, b'7', 15, 150, 250]);
        assert_eq!(waits.total_ms, 3_700);
    }

    #[test]
    fn rejects_out_of_range_heat_dots() {
        let config = Config {
            heat: HeatConfig {
                max_dots: 20,
                ..HeatConfig::default()
            },
            ..Config::default()
        };
        let mut printer = ThermalPrinter::new(Wire::default(), Waits::default(), config);
        assert_eq!(block_on(printer.initialize()), Err(Error::InvalidConfig));
        assert!(printer.release().0.bytes.is_empty());
    }

    #[test]
    fn line_is_transliterated_and_terminated() {
        let mut printer = printer();
        block_on(printer.set_inverse(true)).unwrap();
        block_on(printer.print_line("Fr, 16 Maerz – Grüße")).unwrap();
        block_on(printer.feed(2)).unwrap();
        let (wire, _) = printer.release();
        let mut expected = vec![0x1D, b'B', 1];
        expected.extend_from_slice(b"Fr, 16 Maerz - Gruesse\n\n\n");
        assert_eq!(wire.bytes, expected);
    }

    #[test]
    fn long_lines_are_sent_in_chunks() {
        let mut printer = printer();
        let text = "x".repeat(150);
        block_on(printer.print_line(&text)).unwrap();
        let (wire, _) = printer.release();
        assert_eq!(wire.bytes.len(), 151);
        assert_eq!(wire.bytes.last(), Some(&b'\n'));
    }
}
