use crate::constants::limits::ERROR_BODY_PREVIEW_BYTES;
use crate::encoding::{normalize_with_hint, Normalized, TextEncoding};
use crate::errors::EngineError;
use crate::http::request::ResponseFormat;
use crate::utils::redact::redact_text;
use base64::Engine;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
    format: ResponseFormat,
    normalized: OnceCell<Normalized>,
    decoded: OnceCell<Value>,
}

impl Response {
    pub fn new(raw: RawResponse, format: ResponseFormat) -> Self {
        Self {
            status: raw.status,
            headers: raw.headers,
            body: raw.body,
            format,
            normalized: OnceCell::new(),
            decoded: OnceCell::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    fn declared_charset(&self) -> Option<TextEncoding> {
        let content_type = self.header(CONTENT_TYPE.as_str())?;
        content_type.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("charset") {
                TextEncoding::from_label(value)
            } else {
                None
            }
        })
    }

    fn normalized(&self) -> &Normalized {
        self.normalized
            .get_or_init(|| normalize_with_hint(&self.body, self.declared_charset()))
    }

    pub fn encoding(&self) -> Option<TextEncoding> {
        self.normalized().encoding()
    }

    pub fn is_binary(&self) -> bool {
        self.normalized().is_binary()
    }

    pub fn text(&self) -> Option<&str> {
        self.normalized().as_text()
    }

    pub fn body(&self) -> Result<&Value, EngineError> {
        self.decoded.get_or_try_init(|| self.decode())
    }

    pub fn into_value(self) -> Result<Value, EngineError> {
        self.body().cloned()
    }

    fn decode(&self) -> Result<Value, EngineError> {
        match self.format {
            ResponseFormat::Raw => Ok(match self.normalized() {
                Normalized::Text { text, .. } => Value::String(text.clone()),
                Normalized::Binary(bytes) => {
                    Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
                }
            }),
            ResponseFormat::Json => {
                let text = self.text_or_fail("JSON")?;
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_str(text).map_err(|err| {
                    EngineError::runtime(format!("Response is not valid JSON: {}", err))
                        .with_details(self.summary())
                })
            }
            ResponseFormat::Form => {
                let text = self.text_or_fail("form")?;
                let pairs: Vec<(String, String)> = serde_urlencoded::from_str(text.trim())
                    .map_err(|err| {
                        EngineError::runtime(format!("Response is not url-encoded: {}", err))
                            .with_details(self.summary())
                    })?;
                Ok(Value::Object(collect_pairs(pairs)))
            }
        }
    }

    fn text_or_fail(&self, expected: &str) -> Result<&str, EngineError> {
        match self.text() {
            Some(text) => Ok(text),
            None => Err(EngineError::runtime(format!(
                "Expected a {} response but the body is binary",
                expected
            ))
            .with_details(self.summary())),
        }
    }

    pub fn summary(&self) -> Value {
        let preview = match self.text() {
            Some(text) => Value::String(redact_text(text, ERROR_BODY_PREVIEW_BYTES, None)),
            None => Value::String(format!("<{} bytes of binary data>", self.body.len())),
        };
        serde_json::json!({
            "status": self.status,
            "body": preview,
        })
    }
}

fn collect_pairs(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }
    map
}
