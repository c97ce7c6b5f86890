//! Heuristic repair of byte strings of unknown or mis-tagged text encoding.
//!
//! Classification is deterministic: valid UTF-8 is always kept as is, obviously
//! binary payloads are returned untouched, and anything else is decoded with the first
//! legacy encoding that yields plausible text.

use crate::constants::encoding::{BINARY_RATIO, MAX_CONTROL_RATIO, REPLACEMENT};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TextEncoding {
    #[serde(rename = "UTF-8")]
    Utf8,
    #[serde(rename = "Windows-1252")]
    Windows1252,
    #[serde(rename = "KOI8-R")]
    Koi8R,
    #[serde(rename = "ISO-8859-1")]
    Iso8859_1,
    #[serde(rename = "ISO-8859-2")]
    Iso8859_2,
    #[serde(rename = "US-ASCII")]
    Ascii,
}

pub const CANDIDATES: &[TextEncoding] = &[
    TextEncoding::Windows1252,
    TextEncoding::Koi8R,
    TextEncoding::Iso8859_1,
    TextEncoding::Iso8859_2,
    TextEncoding::Ascii,
];

const BINARY_SIGNATURES: &[&[u8]] = &[
    b"\xFF\xD8\xFF",
    b"\x89PNG\r\n\x1A\n",
    b"GIF87a",
    b"GIF89a",
    b"PK\x03\x04",
    b"\x1F\x8B",
    b"%PDF-",
];

const ASCII_LABELS: &[&str] = &[
    "us-ascii",
    "ascii",
    "ansi_x3.4-1968",
    "cp367",
    "csascii",
    "ibm367",
    "iso-ir-6",
    "iso646-us",
    "iso_646.irv:1991",
    "us",
];

const LATIN1_LABELS: &[&str] = &[
    "iso-8859-1",
    "iso8859-1",
    "iso88591",
    "iso_8859-1",
    "iso_8859-1:1987",
    "latin1",
    "l1",
    "cp819",
    "ibm819",
    "iso-ir-100",
    "csisolatin1",
];

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Windows1252 => "Windows-1252",
            TextEncoding::Koi8R => "KOI8-R",
            TextEncoding::Iso8859_1 => "ISO-8859-1",
            TextEncoding::Iso8859_2 => "ISO-8859-2",
            TextEncoding::Ascii => "US-ASCII",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches('"');
        let encoding = encoding_rs::Encoding::for_label(label.as_bytes())?;
        if encoding == encoding_rs::UTF_8 {
            Some(TextEncoding::Utf8)
        } else if encoding == encoding_rs::KOI8_R {
            Some(TextEncoding::Koi8R)
        } else if encoding == encoding_rs::ISO_8859_2 {
            Some(TextEncoding::Iso8859_2)
        } else if encoding == encoding_rs::WINDOWS_1252 {
            // WHATWG folds ASCII and Latin-1 labels into windows-1252.
            let label = label.to_ascii_lowercase();
            if ASCII_LABELS.contains(&label.as_str()) {
                Some(TextEncoding::Ascii)
            } else if LATIN1_LABELS.contains(&label.as_str()) {
                Some(TextEncoding::Iso8859_1)
            } else {
                Some(TextEncoding::Windows1252)
            }
        } else {
            None
        }
    }

    fn decode_chars(self, bytes: &[u8]) -> Vec<Option<char>> {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes)
                .chars()
                .map(|ch| (ch != REPLACEMENT).then_some(ch))
                .collect(),
            TextEncoding::Ascii => bytes
                .iter()
                .map(|b| b.is_ascii().then_some(*b as char))
                .collect(),
            TextEncoding::Iso8859_1 => bytes.iter().map(|b| defined(*b as char)).collect(),
            TextEncoding::Windows1252 => decode_single_byte(encoding_rs::WINDOWS_1252, bytes),
            TextEncoding::Koi8R => decode_single_byte(encoding_rs::KOI8_R, bytes),
            TextEncoding::Iso8859_2 => decode_single_byte(encoding_rs::ISO_8859_2, bytes),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn decode_single_byte(encoding: &'static encoding_rs::Encoding, bytes: &[u8]) -> Vec<Option<char>> {
    // Single-byte decoders emit exactly one char per input byte.
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.chars()
        .map(|ch| if ch == REPLACEMENT { None } else { defined(ch) })
        .collect()
}

// C1 controls stand in for unassigned code points in the legacy tables.
fn defined(ch: char) -> Option<char> {
    if ('\u{80}'..='\u{9F}').contains(&ch) {
        None
    } else {
        Some(ch)
    }
}

fn is_suspicious_control(ch: char) -> bool {
    ch.is_ascii_control() && !matches!(ch, '\t' | '\n' | '\r' | '\x0C' | '\x1B')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Text { text: String, source: TextEncoding },
    Binary(Vec<u8>),
}

impl Normalized {
    pub fn is_binary(&self) -> bool {
        matches!(self, Normalized::Binary(_))
    }

    pub fn encoding(&self) -> Option<TextEncoding> {
        match self {
            Normalized::Text { source, .. } => Some(*source),
            Normalized::Binary(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Normalized::Text { text, .. } => Some(text),
            Normalized::Binary(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Normalized::Text { text, .. } => text.into_bytes(),
            Normalized::Binary(bytes) => bytes,
        }
    }
}

#[derive(Debug)]
struct Candidate {
    encoding: TextEncoding,
    chars: Vec<Option<char>>,
    undefined: usize,
    controls: usize,
}

impl Candidate {
    fn evaluate(encoding: TextEncoding, bytes: &[u8]) -> Self {
        let chars = encoding.decode_chars(bytes);
        let undefined = chars.iter().filter(|ch| ch.is_none()).count();
        let controls = chars
            .iter()
            .filter(|ch| ch.map(is_suspicious_control).unwrap_or(false))
            .count();
        Self {
            encoding,
            chars,
            undefined,
            controls,
        }
    }

    fn is_clean(&self) -> bool {
        self.undefined == 0 && ratio(self.controls, self.chars.len()) <= MAX_CONTROL_RATIO
    }

    fn into_text(self) -> Normalized {
        Normalized::Text {
            text: self.chars.into_iter().map(|ch| ch.unwrap_or(REPLACEMENT)).collect(),
            source: self.encoding,
        }
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64
}

pub fn looks_binary(bytes: &[u8]) -> bool {
    if BINARY_SIGNATURES.iter().any(|sig| bytes.starts_with(sig)) {
        return true;
    }
    if bytes.contains(&0) {
        return true;
    }
    let controls = bytes
        .iter()
        .filter(|b| is_suspicious_control(**b as char))
        .count();
    ratio(controls, bytes.len()) > BINARY_RATIO
}

pub fn normalize(bytes: &[u8]) -> Normalized {
    normalize_with_hint(bytes, None)
}

/// Like [`normalize`], trying a declared charset before the fixed candidates.
pub fn normalize_with_hint(bytes: &[u8], declared: Option<TextEncoding>) -> Normalized {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Normalized::Text {
            text: text.to_string(),
            source: TextEncoding::Utf8,
        };
    }
    if looks_binary(bytes) {
        return Normalized::Binary(bytes.to_vec());
    }

    if let Some(declared) = declared.filter(|enc| *enc != TextEncoding::Utf8) {
        let candidate = Candidate::evaluate(declared, bytes);
        if candidate.is_clean() {
            return candidate.into_text();
        }
    }

    let mut best: Option<Candidate> = None;
    for encoding in CANDIDATES {
        let candidate = Candidate::evaluate(*encoding, bytes);
        if candidate.is_clean() {
            return candidate.into_text();
        }
        let better = best
            .as_ref()
            .map(|current| candidate.undefined < current.undefined)
            .unwrap_or(true);
        if better {
            best = Some(candidate);
        }
    }

    match best {
        Some(candidate)
            if ratio(candidate.undefined + candidate.controls, candidate.chars.len())
                <= BINARY_RATIO =>
        {
            candidate.into_text()
        }
        _ => Normalized::Binary(bytes.to_vec()),
    }
}

pub fn decode_lossy(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        other => other
            .decode_chars(bytes)
            .into_iter()
            .map(|ch| ch.unwrap_or(REPLACEMENT))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_utf8_is_untouched() {
        let input = "héllo wörld ✓".as_bytes();
        let out = normalize(input);
        assert_eq!(out.encoding(), Some(TextEncoding::Utf8));
        assert_eq!(out.into_bytes(), input.to_vec());
    }

    #[test]
    fn jpeg_header_is_binary() {
        let input: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00\x01\x01\x00\x00\x01";
        let out = normalize(input);
        assert!(out.is_binary());
        assert_eq!(out.encoding(), None);
        assert_eq!(out.into_bytes(), input.to_vec());
    }

    #[test]
    fn ascii_tagged_bytes_become_utf8() {
        let out = normalize_with_hint(b"abc", Some(TextEncoding::Ascii));
        assert_eq!(out.as_text(), Some("abc"));
        assert_eq!(out.encoding(), Some(TextEncoding::Utf8));
    }

    #[test]
    fn latin_text_is_read_as_windows_1252() {
        let out = normalize(b"caf\xE9 cr\xE8me \x93quoted\x94");
        assert_eq!(out.encoding(), Some(TextEncoding::Windows1252));
        assert_eq!(out.as_text(), Some("café crème \u{201C}quoted\u{201D}"));
    }

    #[test]
    fn windows_1252_holes_fall_through_to_koi8_r() {
        let out = normalize(b"\xF0\xD2\xC9\xD7\xC5\xD4 9\x9D");
        assert_eq!(out.encoding(), Some(TextEncoding::Koi8R));
        assert_eq!(out.as_text(), Some("Привет 9²"));
    }

    #[test]
    fn declared_charset_wins_when_clean() {
        let out = normalize_with_hint(b"\xB1\xE6", Some(TextEncoding::Iso8859_2));
        assert_eq!(out.encoding(), Some(TextEncoding::Iso8859_2));
        assert_eq!(out.as_text(), Some("ąć"));
    }

    #[test]
    fn noisy_text_falls_back_to_best_candidate() {
        let out = normalize(b"ab\x01cd\x01ef\x81ghijklmn");
        assert_eq!(out.encoding(), Some(TextEncoding::Koi8R));
        assert!(out.as_text().unwrap_or_default().starts_with("ab\u{1}cd"));
    }

    #[test]
    fn control_heavy_bytes_are_binary() {
        let input: &[u8] = b"\x01\x02\x03\x04ab\x05\x06\xFF";
        assert!(normalize(input).is_binary());
    }

    #[test]
    fn lossy_decode_substitutes_placeholder() {
        assert_eq!(decode_lossy(b"a\xE9b", TextEncoding::Ascii), "a\u{FFFD}b");
    }

    #[test]
    fn classification_is_deterministic() {
        let input: &[u8] = b"r\xE9sum\xE9 \x81";
        assert_eq!(normalize(input), normalize(input));
    }

    #[test]
    fn labels_resolve() {
        assert_eq!(TextEncoding::from_label("Latin1"), Some(TextEncoding::Iso8859_1));
        assert_eq!(TextEncoding::from_label("\"KOI8-R\""), Some(TextEncoding::Koi8R));
        assert_eq!(TextEncoding::from_label("ebcdic"), None);
        assert_eq!(TextEncoding::from_label("csISOLatin2"), Some(TextEncoding::Iso8859_2));
        assert_eq!(TextEncoding::from_label("ANSI_X3.4-1968"), Some(TextEncoding::Ascii));
        assert_eq!(TextEncoding::from_label("cp1252"), Some(TextEncoding::Windows1252));
        assert_eq!(TextEncoding::from_label("utf8"), Some(TextEncoding::Utf8));
        assert_eq!(TextEncoding::from_label("windows-1251"), None);
    }
}
