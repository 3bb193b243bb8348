//! Pulls the daily text out of the fetched page.

mod entities;

use alloc::string::String;
use core::fmt;

use entities::{decode_named_entity, decode_numeric_entity};

const CONTENT_OPEN: [&str; 2] = ["<div id=\"witzdestages\">", "<div id='witzdestages'>"];
const CONTENT_CLOSE: &str = "</div>";
const FOOTER_OPEN: [&str; 2] = [
    "<span id=\"witzdestageslink\">",
    "<span id='witzdestageslink'>",
];
const ENTITY_MAX_BYTES: usize = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExtractError {
    MarkerMissing,
    MarkerUnclosed,
    Empty,
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkerMissing => f.write_str("Could not find witzdestages div"),
            Self::MarkerUnclosed => f.write_str("Could not find closing div tag"),
            Self::Empty => f.write_str("Joke extraction resulted in empty text"),
        }
    }
}

/// Extracts, decodes and normalizes the content block of `payload`.
///
/// The payload may be cut off at the download cap; invalid UTF-8 is replaced
/// rather than rejected.
pub fn extract_content(payload: &[u8]) -> Result<String, ExtractError> {
    let page = String::from_utf8_lossy(payload);
    let region = content_region(&page)?;
    let text = sanitize(region);
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}

fn content_region(page: &str) -> Result<&str, ExtractError> {
    let (start, marker_len) = CONTENT_OPEN
        .iter()
        .find_map(|marker| page.find(marker).map(|index| (index, marker.len())))
        .ok_or(ExtractError::MarkerMissing)?;
    let body = &page[start + marker_len..];
    let end = body
        .find(CONTENT_CLOSE)
        .ok_or(ExtractError::MarkerUnclosed)?;
    let region = &body[..end];

    match FOOTER_OPEN.iter().find_map(|footer| region.find(footer)) {
        Some(footer) => Ok(&region[..footer]),
        None => Ok(region),
    }
}

/// Entities decode first, so escaped markup is stripped like real markup.
/// Tags are then dropped (`<br>` variants become a space) and whitespace
/// runs collapse to one space.
fn sanitize(region: &str) -> String {
    strip_tags(&decode_entities(region))
}

fn decode_entities(region: &str) -> String {
    let mut out = String::with_capacity(region.len());
    let mut rest = region;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_entity(rest) {
            Some((consumed, Decoded::Text(text))) => {
                out.push_str(text);
                rest = &rest[consumed..];
            }
            Some((consumed, Decoded::Char(ch))) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        push_text(&mut out, &rest[..open], &mut last_was_space);
        rest = &rest[open..];
        let Some(close) = rest.find('>') else {
            rest = "";
            break;
        };
        if is_line_break(&rest[1..close]) {
            push_text(&mut out, " ", &mut last_was_space);
        }
        rest = &rest[close + 1..];
    }
    push_text(&mut out, rest, &mut last_was_space);

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out
}

fn push_text(out: &mut String, text: &str, last_was_space: &mut bool) {
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !*last_was_space {
                out.push(' ');
                *last_was_space = true;
            }
        } else {
            out.push(ch);
            *last_was_space = false;
        }
    }
}

fn is_line_break(tag: &str) -> bool {
    tag.trim_end_matches('/').trim().eq_ignore_ascii_case("br")
}

enum Decoded {
    Text(&'static str),
    Char(char),
}

/// `rest` starts with `&`. Returns the consumed byte count and replacement.
fn decode_entity(rest: &str) -> Option<(usize, Decoded)> {
    let window = &rest.as_bytes()[1..rest.len().min(ENTITY_MAX_BYTES + 2)];
    let semi = window.iter().position(|b| *b == b';')?;
    let name = &window[..semi];
    let decoded = match decode_named_entity(name) {
        Some(text) => Decoded::Text(text),
        None => Decoded::Char(decode_numeric_entity(name)?),
    };
    Some((semi + 2, decoded))
}

#[cfg(test)]
mod tests;
