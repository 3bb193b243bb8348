//! Text to printer bytes.
//!
//! The default code page only covers printable ASCII reliably, so German
//! letters are spelled out and everything else becomes `?`.

/// Bytes standing in for one `char`.
#[derive(Clone, Debug)]
pub struct Transliterated {
    bytes: [u8; 3],
    len: u8,
    at: u8,
}

impl Transliterated {
    pub fn new(ch: char) -> Self {
        let spelled: &[u8] = match ch {
            ' '..='~' => return Self::single(ch as u8),
            '\t' => b" ",
            'ä' => b"ae",
            'ö' => b"oe",
            'ü' => b"ue",
            'Ä' => b"Ae",
            'Ö' => b"Oe",
            'Ü' => b"Ue",
            'ß' => b"ss",
            'é' | 'è' | 'ê' => b"e",
            'á' | 'à' | 'â' => b"a",
            '€' => b"EUR",
            '„' | '“' | '”' | '«' | '»' => b"\"",
            '‚' | '‘' | '’' => b"'",
            '–' | '—' => b"-",
            '…' => b"...",
            '\u{a0}' => b" ",
            _ => b"?",
        };
        let mut bytes = [0u8; 3];
        bytes[..spelled.len()].copy_from_slice(spelled);
        Self {
            bytes,
            len: spelled.len() as u8,
            at: 0,
        }
    }

    const fn single(byte: u8) -> Self {
        Self {
            bytes: [byte, 0, 0],
            len: 1,
            at: 0,
        }
    }
}

impl Iterator for Transliterated {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.at >= self.len {
            return None;
        }
        let byte = self.bytes[usize::from(self.at)];
        self.at += 1;
        Some(byte)
    }
}

/// Printable bytes for `text`. Control characters other than tab are
/// replaced, so a line can never smuggle in a command sequence.
pub fn printable_bytes(text: &str) -> impl Iterator<Item = u8> + '_ {
    text.chars().flat_map(Transliterated::new)
}
