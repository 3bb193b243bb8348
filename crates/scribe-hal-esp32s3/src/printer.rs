use embedded_hal_async::delay::DelayNs;
use embedded_io_async::Write;
use escpos_thermal::{Error, ThermalPrinter};
use scribe_core::render::ReceiptPrinter;

/// Board adapter exposing the thermal printer as the receipt output.
#[derive(Debug)]
pub struct SerialReceiptPrinter<W, D> {
    inner: ThermalPrinter<W, D>,
}

impl<W, D> SerialReceiptPrinter<W, D>
where
    W: Write,
    D: DelayNs,
{
    /// Wraps an already initialized printer.
    pub fn new(inner: ThermalPrinter<W, D>) -> Self {
        Self { inner }
    }
}

impl<W, D> ReceiptPrinter for SerialReceiptPrinter<W, D>
where
    W: Write,
    D: DelayNs,
{
    type Error = Error<W::Error>;

    async fn print_line(&mut self, line: &str) -> Result<(), Self::Error> {
        self.inner.print_line(line).await
    }

    async fn set_inverse(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.inner.set_inverse(enabled).await
    }

    async fn advance_paper(&mut self, lines: u8) -> Result<(), Self::Error> {
        self.inner.feed(lines).await
    }
}
