use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::HashSet;

const DEFAULT_REDACTION: &str = "[REDACTED]";
const INLINE_REDACTION: &str = "***REDACTED***";

static SENSITIVE_HEADER_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "authorization",
        "proxy-authorization",
        "cookie",
        "set-cookie",
        "x-api-key",
        "x-auth-token",
        "x-access-token",
    ]
    .into_iter()
    .collect()
});

static INLINE_REDACTION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\beyJ[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\b")
                .expect("inline redaction regex"),
            INLINE_REDACTION,
        ),
        (
            Regex::new(r"\b(Bearer)\s+([A-Za-z0-9._~+/=-]{6,})").expect("inline redaction regex"),
            "$1 ***REDACTED***",
        ),
        (
            Regex::new(r#""(access_token|refresh_token|id_token|client_secret|password)"\s*:\s*"[^"]*""#)
                .expect("inline redaction regex"),
            r#""$1":"***REDACTED***""#,
        ),
        (
            Regex::new(r"\b(access_token|refresh_token|client_secret|password|api[_-]?key)=([^&\s]+)")
                .expect("inline redaction regex"),
            "$1=***REDACTED***",
        ),
    ]
});

pub fn is_sensitive_header(name: &str) -> bool {
    let normalized = name.trim().to_lowercase();
    SENSITIVE_HEADER_KEYS.contains(normalized.as_str())
        || normalized.contains("secret")
        || normalized.contains("token")
}

pub fn truncate_utf8(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

pub fn redact_text(value: &str, max_bytes: usize, extra_secrets: Option<&[String]>) -> String {
    let mut out = value.to_string();
    for (re, replacement) in INLINE_REDACTION_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).into_owned();
        }
    }
    for secret in extra_secrets.unwrap_or_default() {
        let needle = secret.trim();
        if needle.len() >= 6 {
            out = out.replace(needle, INLINE_REDACTION);
        }
    }
    if out.len() <= max_bytes {
        return out;
    }
    format!("{}...", truncate_utf8(&out, max_bytes))
}

pub fn redact_headers(headers: &HeaderMap) -> Value {
    let mut out = serde_json::Map::new();
    for (name, value) in headers.iter() {
        let rendered = if is_sensitive_header(name.as_str()) {
            DEFAULT_REDACTION.to_string()
        } else {
            redact_text(value.to_str().unwrap_or("<binary>"), 256, None)
        };
        out.insert(name.as_str().to_string(), Value::String(rendered));
    }
    Value::Object(out)
}
