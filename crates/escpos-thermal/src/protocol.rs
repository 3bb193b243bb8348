//! Command bytes for ESC/POS-compatible serial thermal printers.

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;
pub const LF: u8 = 0x0A;

/// `ESC @`: clears the buffer and resets modes to power-on defaults.
pub const RESET: [u8; 2] = [ESC, b'@'];

/// Print head heating parameters (`ESC 7`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeatConfig {
    /// Simultaneously heated dots, in units of 8 dots minus one (0..=15).
    pub max_dots: u8,
    /// Heating time in 10 µs units.
    pub time: u8,
    /// Interval between heats in 10 µs units.
    pub interval: u8,
}

impl Default for HeatConfig {
    /// Darker than the factory setting; reliable on 5 V supplies.
    fn default() -> Self {
        Self {
            max_dots: 15,
            time: 150,
            interval: 250,
        }
    }
}

/// Returns `None` when `max_dots` is out of range.
pub fn heat_config(config: HeatConfig) -> Option<[u8; 5]> {
    if config.max_dots > 15 {
        return None;
    }
    Some([ESC, b'7', config.max_dots, config.time, config.interval])
}

/// `GS B n`: white-on-black printing.
pub const fn inverse(enabled: bool) -> [u8; 3] {
    [GS, b'B', enabled as u8]
}
