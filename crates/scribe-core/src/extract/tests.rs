use super::*;

fn page(inner: &str) -> alloc::vec::Vec<u8> {
    format!(
        "<html><body><h1>Witz des Tages</h1><div id=\"witzdestages\">{}</div><p>more</p></body></html>",
        inner
    )
    .into_bytes()
}

#[test]
fn decodes_entities_and_line_breaks() {
    let payload = page("Hallo &amp; Tsch&uuml;ss<br>Ende");
    assert_eq!(extract_content(&payload).unwrap(), "Hallo & Tschüss Ende");
}

#[test]
fn missing_marker_is_an_error() {
    assert_eq!(
        extract_content(b"<html><body>nothing here</body></html>"),
        Err(ExtractError::MarkerMissing)
    );
}

#[test]
fn unclosed_marker_is_an_error() {
    assert_eq!(
        extract_content(b"<div id=\"witzdestages\">Der Anfang ohne Ende"),
        Err(ExtractError::MarkerUnclosed)
    );
}

#[test]
fn single_quoted_marker_is_accepted() {
    let payload = b"<div id='witzdestages'>Kurz und gut.</div>";
    assert_eq!(extract_content(payload).unwrap(), "Kurz und gut.");
}

#[test]
fn footer_link_is_cut() {
    let payload = page(
        "Treffen sich zwei.<br/><span id=\"witzdestageslink\"><a href=\"/x\">Mehr Witze</a></span>",
    );
    assert_eq!(extract_content(&payload).unwrap(), "Treffen sich zwei.");
}

#[test]
fn whitespace_and_markup_collapse() {
    let payload = page("\r\n  Erste&nbsp;&nbsp;Zeile<br />\n<b>zweite</b>   Zeile <BR>  ");
    assert_eq!(extract_content(&payload).unwrap(), "Erste Zeile zweite Zeile");
}

#[test]
fn only_markup_is_empty() {
    let payload = page("<br><br/> &nbsp; <i></i>");
    assert_eq!(extract_content(&payload), Err(ExtractError::Empty));
}

#[test]
fn unknown_and_bare_ampersands_survive() {
    let payload = page("Fish &chips; &amp; M&M &#252;ber &#x263A;");
    assert_eq!(
        extract_content(&payload).unwrap(),
        "Fish &chips; & M&M über \u{263A}"
    );
}

#[test]
fn escaped_markup_is_stripped_after_decoding() {
    let payload = page("Witz &lt;b&gt;fett&lt;/b&gt; Ende");
    assert_eq!(extract_content(&payload).unwrap(), "Witz fett Ende");
}

#[test]
fn escaped_line_break_becomes_a_space() {
    let payload = page("eins&lt;br /&gt;zwei");
    assert_eq!(extract_content(&payload).unwrap(), "eins zwei");
}

#[test]
fn trailing_partial_utf8_is_tolerated() {
    let mut payload = page("Gr\u{00FC}\u{00DF}e");
    payload.extend_from_slice(&[0xC3]);
    assert_eq!(extract_content(&payload).unwrap(), "Grüße");
}
