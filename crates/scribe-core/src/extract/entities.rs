/// Named entities the source is known to emit. Case-sensitive: `Auml` and
/// `auml` differ.
const NAMED_ENTITIES: &[(&[u8], &str)] = &[
    (b"amp", "&"),
    (b"lt", "<"),
    (b"gt", ">"),
    (b"quot", "\""),
    (b"apos", "'"),
    (b"nbsp", " "),
    (b"auml", "ä"),
    (b"ouml", "ö"),
    (b"uuml", "ü"),
    (b"Auml", "Ä"),
    (b"Ouml", "Ö"),
    (b"Uuml", "Ü"),
    (b"szlig", "ß"),
    (b"eacute", "é"),
    (b"egrave", "è"),
    (b"agrave", "à"),
    (b"ccedil", "ç"),
    (b"lsquo", "'"),
    (b"rsquo", "'"),
    (b"sbquo", "'"),
    (b"ldquo", "\""),
    (b"rdquo", "\""),
    (b"bdquo", "\""),
    (b"laquo", "\""),
    (b"raquo", "\""),
    (b"ndash", "-"),
    (b"mdash", "-"),
    (b"hellip", "..."),
    (b"euro", "EUR"),
];

pub(super) fn decode_named_entity(name: &[u8]) -> Option<&'static str> {
    NAMED_ENTITIES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, text)| *text)
}

pub(super) fn decode_numeric_entity(entity: &[u8]) -> Option<char> {
    let first = entity.first().copied()?;
    if first != b'#' {
        return None;
    }

    let (digits, radix) = match entity.get(1).copied() {
        Some(b'x' | b'X') => (&entity[2..], 16),
        _ => (&entity[1..], 10),
    };
    if digits.is_empty() {
        return None;
    }

    let mut value = 0u32;
    for &digit in digits {
        let step = match digit {
            b'0'..=b'9' => (digit - b'0') as u32,
            b'a'..=b'f' if radix == 16 => (digit - b'a' + 10) as u32,
            b'A'..=b'F' if radix == 16 => (digit - b'A' + 10) as u32,
            _ => return None,
        };
        value = value.saturating_mul(radix).saturating_add(step);
    }

    core::char::from_u32(value)
}
