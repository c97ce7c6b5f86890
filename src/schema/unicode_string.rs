use crate::encoding::{decode_lossy, TextEncoding};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Text that is valid UTF-8 from construction on.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnicodeString(String);

impl UnicodeString {
    /// Re-encodes `bytes` from `source` (UTF-8 when unknown) into UTF-8.
    pub fn from_bytes(bytes: &[u8], source: Option<TextEncoding>) -> Self {
        Self(decode_lossy(bytes, source.unwrap_or(TextEncoding::Utf8)))
    }

    pub fn encoding(&self) -> TextEncoding {
        TextEncoding::Utf8
    }

    pub fn is_binary(&self) -> bool {
        false
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for UnicodeString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<String> for UnicodeString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for UnicodeString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for UnicodeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_bytes_report_utf8() {
        let text = UnicodeString::from_bytes(b"abc", Some(TextEncoding::Ascii));
        assert_eq!(text.as_str(), "abc");
        assert_eq!(text.encoding(), TextEncoding::Utf8);
        assert!(!text.is_binary());
    }

    #[test]
    fn legacy_bytes_are_reencoded() {
        let text = UnicodeString::from_bytes(b"na\xEFve", Some(TextEncoding::Iso8859_1));
        assert_eq!(text.as_str(), "naïve");
    }

    #[test]
    fn arbitrary_bytes_never_report_binary() {
        let text = UnicodeString::from_bytes(b"\xFF\xD8\xFF\xE0\x00", None);
        assert!(!text.is_binary());
        assert!(std::str::from_utf8(text.as_bytes()).is_ok());
        assert!(text.contains('\u{FFFD}'));
    }
}
