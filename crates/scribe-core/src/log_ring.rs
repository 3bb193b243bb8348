//! Most recent log lines, kept for the operator `/logs` page.

use alloc::string::String;
use heapless::Deque;

pub const LOG_RING_LINES: usize = 50;
pub const LOG_LINE_BYTES: usize = 160;

/// Fixed-capacity FIFO of lines. Pushing into a full ring drops the oldest
/// line; lines longer than `BYTES` are cut at a char boundary.
pub struct LogRing<const LINES: usize = LOG_RING_LINES, const BYTES: usize = LOG_LINE_BYTES> {
    lines: Deque<heapless::String<BYTES>, LINES>,
}

impl<const LINES: usize, const BYTES: usize> LogRing<LINES, BYTES> {
    pub const fn new() -> Self {
        Self {
            lines: Deque::new(),
        }
    }

    pub fn push(&mut self, line: &str) {
        let mut cut = line.len().min(BYTES);
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }

        let mut owned = heapless::String::new();
        // Cannot fail: `cut <= BYTES`.
        let _ = owned.push_str(&line[..cut]);

        if self.lines.is_full() {
            self.lines.pop_front();
        }
        let _ = self.lines.push_back(owned);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.as_str())
    }

    /// One line per entry, each terminated by `\n`.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.lines.len() * 48);
        for line in self.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl<const LINES: usize, const BYTES: usize> Default for LogRing<LINES, BYTES> {
    fn default() -> Self {
        Self::new()
    }
}
