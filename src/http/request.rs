use crate::constants::{network, protocols::ALLOWED_HTTP};
use crate::engine::Step;
use crate::errors::{EngineError, Frame};
use crate::http::multipart::{self, MultipartPart};
use crate::http::response::Response;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestFormat {
    Json,
    Raw,
    Form,
    Multipart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Json,
    Raw,
    Form,
}

pub type ContinuationFn = Arc<dyn Fn(Response) -> Result<Step, EngineError> + Send + Sync>;

#[derive(Clone)]
pub struct Continuation {
    callback: ContinuationFn,
    frame: Frame,
}

impl Continuation {
    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub(crate) fn call(&self, response: Response) -> Result<Step, EngineError> {
        (self.callback)(response)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Continuation({})", self.frame)
    }
}

#[derive(Clone, Debug)]
pub struct ErrorContinuation {
    statuses: Vec<u16>,
    continuation: Continuation,
}

impl ErrorContinuation {
    pub fn matches(&self, status: u16) -> bool {
        status >= 400 && (self.statuses.is_empty() || self.statuses.contains(&status))
    }

    pub fn continuation(&self) -> &Continuation {
        &self.continuation
    }
}

#[derive(Clone, Debug)]
#[must_use]
pub struct RequestBuilder {
    method: Method,
    url: String,
    base: Option<Url>,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    payload: Option<Value>,
    raw_body: Option<Bytes>,
    parts: Vec<MultipartPart>,
    request_format: RequestFormat,
    response_format: ResponseFormat,
    boundary: Option<String>,
    continuation: Option<Continuation>,
    error_continuation: Option<ErrorContinuation>,
    error: Option<EngineError>,
}

impl RequestBuilder {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            base: None,
            headers: HeaderMap::new(),
            query: Vec::new(),
            payload: None,
            raw_body: None,
            parts: Vec::new(),
            request_format: RequestFormat::Json,
            response_format: ResponseFormat::Json,
            boundary: None,
            continuation: None,
            error_continuation: None,
            error: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    fn fail(&mut self, err: EngineError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub fn base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    pub(crate) fn default_base(mut self, base: Option<&Url>) -> Self {
        if self.base.is_none() {
            self.base = base.cloned();
        }
        self
    }

    #[track_caller]
    pub fn header(mut self, name: &str, value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.fail(EngineError::invalid_request(format!(
                "Invalid header: {}",
                name
            ))),
        }
        self
    }

    #[track_caller]
    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self = self.header(name.as_ref(), value);
        }
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds every entry of a JSON object as query parameters; arrays repeat the key.
    #[track_caller]
    pub fn query(mut self, params: Value) -> Self {
        match params {
            Value::Object(map) => {
                for (key, value) in map {
                    match value {
                        Value::Array(items) => {
                            for item in items {
                                self.query.push((key.clone(), render_scalar(&item)));
                            }
                        }
                        Value::Null => {}
                        other => self.query.push((key, render_scalar(&other))),
                    }
                }
            }
            Value::Null => {}
            _ => self.fail(EngineError::invalid_request("query must be an object")),
        }
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.raw_body = Some(body.into());
        self.request_format = RequestFormat::Raw;
        self
    }

    pub fn part(mut self, part: MultipartPart) -> Self {
        self.parts.push(part);
        self.request_format = RequestFormat::Multipart;
        self
    }

    pub fn multipart(self, parts: impl IntoIterator<Item = MultipartPart>) -> Self {
        parts.into_iter().fold(self, |builder, part| builder.part(part))
    }

    pub fn multipart_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    pub fn request_format_json(mut self) -> Self {
        self.request_format = RequestFormat::Json;
        self
    }

    pub fn request_format_raw(mut self) -> Self {
        self.request_format = RequestFormat::Raw;
        self
    }

    pub fn request_format_www_form_urlencoded(mut self) -> Self {
        self.request_format = RequestFormat::Form;
        self
    }

    pub fn request_format_multipart_form(mut self) -> Self {
        self.request_format = RequestFormat::Multipart;
        self
    }

    pub fn response_format_json(mut self) -> Self {
        self.response_format = ResponseFormat::Json;
        self
    }

    pub fn response_format_raw(mut self) -> Self {
        self.response_format = ResponseFormat::Raw;
        self
    }

    pub fn response_format_form(mut self) -> Self {
        self.response_format = ResponseFormat::Form;
        self
    }

    #[track_caller]
    pub fn after_response<F>(mut self, callback: F) -> Self
    where
        F: Fn(Response) -> Result<Step, EngineError> + Send + Sync + 'static,
    {
        self.continuation = Some(Continuation {
            callback: Arc::new(callback),
            frame: Frame::from_location(Location::caller()),
        });
        self
    }

    /// Registers a callback for error statuses; an empty list matches any status >= 400.
    #[track_caller]
    pub fn after_error_response<F>(mut self, statuses: impl IntoIterator<Item = u16>, callback: F) -> Self
    where
        F: Fn(Response) -> Result<Step, EngineError> + Send + Sync + 'static,
    {
        self.error_continuation = Some(ErrorContinuation {
            statuses: statuses.into_iter().collect(),
            continuation: Continuation {
                callback: Arc::new(callback),
                frame: Frame::from_location(Location::caller()),
            },
        });
        self
    }

    #[track_caller]
    pub fn build(self) -> Result<Request, EngineError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let url = match Url::parse(&self.url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base {
                Some(base) => match base.join(&self.url) {
                    Ok(url) => url,
                    Err(_) => {
                        return Err(EngineError::invalid_request(format!(
                            "Invalid path: {}",
                            self.url
                        )))
                    }
                },
                None => {
                    return Err(EngineError::invalid_request(format!(
                        "Relative url without base_uri: {}",
                        self.url
                    )))
                }
            },
            Err(_) => {
                return Err(EngineError::invalid_request(format!(
                    "Invalid url: {}",
                    self.url
                )))
            }
        };
        if !scheme_allowed(url.scheme()) {
            return Err(EngineError::invalid_request(
                "Only http/https URLs are supported",
            ));
        }
        Ok(Request {
            method: self.method,
            url,
            headers: self.headers,
            query: self.query,
            payload: self.payload,
            raw_body: self.raw_body,
            parts: self.parts,
            request_format: self.request_format,
            response_format: self.response_format,
            boundary: self.boundary,
            continuation: self.continuation,
            error_continuation: self.error_continuation,
            retried: false,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    payload: Option<Value>,
    raw_body: Option<Bytes>,
    parts: Vec<MultipartPart>,
    request_format: RequestFormat,
    response_format: ResponseFormat,
    boundary: Option<String>,
    continuation: Option<Continuation>,
    error_continuation: Option<ErrorContinuation>,
    retried: bool,
}

#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PreparedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn request_format(&self) -> RequestFormat {
        self.request_format
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.response_format
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn continuation(&self) -> Option<&Continuation> {
        self.continuation.as_ref()
    }

    pub fn error_continuation(&self) -> Option<&ErrorContinuation> {
        self.error_continuation.as_ref()
    }

    pub fn with_headers(&self, headers: HeaderMap) -> Request {
        let mut next = self.clone();
        for (name, value) in headers.iter() {
            next.headers.insert(name.clone(), value.clone());
        }
        next
    }

    pub fn into_retried(self) -> Request {
        Request {
            retried: true,
            ..self
        }
    }

    /// Encodes headers, query and body into the form sent on the wire.
    pub fn prepare(&self) -> Result<PreparedRequest, EngineError> {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(network::USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(network::DEFAULT_ACCEPT));

        let (body, content_type) = self.encode_body()?;
        if let Some(content_type) = content_type {
            let value = HeaderValue::from_str(&content_type)
                .map_err(|_| EngineError::invalid_request("Invalid content type"))?;
            headers.insert(CONTENT_TYPE, value);
        }
        for (name, value) in self.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        Ok(PreparedRequest {
            method: self.method.clone(),
            url,
            headers,
            body,
        })
    }

    fn encode_body(&self) -> Result<(Bytes, Option<String>), EngineError> {
        match self.request_format {
            RequestFormat::Raw => {
                if let Some(raw) = &self.raw_body {
                    return Ok((raw.clone(), None));
                }
                let text = match &self.payload {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => other.to_string(),
                };
                Ok((Bytes::from(text), None))
            }
            RequestFormat::Json => match &self.payload {
                None => Ok((Bytes::new(), None)),
                Some(payload) => {
                    let text = serde_json::to_vec(payload).map_err(|err| {
                        EngineError::invalid_request(format!("payload is not serializable: {}", err))
                    })?;
                    Ok((Bytes::from(text), Some("application/json".to_string())))
                }
            },
            RequestFormat::Form => {
                let pairs = payload_pairs(self.payload.as_ref())?;
                let encoded = serde_urlencoded::to_string(pairs).map_err(|_| {
                    EngineError::invalid_request("form payload must be a simple object")
                })?;
                Ok((
                    Bytes::from(encoded),
                    Some("application/x-www-form-urlencoded".to_string()),
                ))
            }
            RequestFormat::Multipart => {
                let mut parts: Vec<MultipartPart> = payload_pairs(self.payload.as_ref())?
                    .into_iter()
                    .map(|(name, value)| MultipartPart::field(name, value))
                    .collect();
                parts.extend(self.parts.iter().cloned());
                let boundary = self
                    .boundary
                    .clone()
                    .unwrap_or_else(multipart::generate_boundary);
                Ok((
                    Bytes::from(multipart::encode(&parts, &boundary)),
                    Some(format!("multipart/form-data; boundary={}", boundary)),
                ))
            }
        }
    }
}

fn payload_pairs(payload: Option<&Value>) -> Result<Vec<(String, String)>, EngineError> {
    match payload {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => {
            let mut pairs = Vec::new();
            for (key, value) in map {
                match value {
                    Value::Array(items) => {
                        for item in items {
                            pairs.push((key.clone(), render_scalar(item)));
                        }
                    }
                    Value::Null => {}
                    other => pairs.push((key.clone(), render_scalar(other))),
                }
            }
            Ok(pairs)
        }
        Some(_) => Err(EngineError::invalid_request(
            "form and multipart payloads must be objects",
        )),
    }
}

fn render_scalar(value: &Value) -> String {
    value
        .as_str()
        .map(|s| s.to_string())
        .unwrap_or_else(|| value.to_string())
}

fn scheme_allowed(scheme: &str) -> bool {
    let normalized = scheme.trim_end_matches(':');
    ALLOWED_HTTP
        .iter()
        .any(|allowed| allowed.trim_end_matches(':') == normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn headers_are_case_insensitive_last_write_wins() {
        let request = RequestBuilder::get("https://api.example.com/items")
            .header("X-Token", "one")
            .header("x-token", "two")
            .build()
            .expect("request");
        let prepared = request.prepare().expect("prepared");
        assert_eq!(prepared.header("X-TOKEN"), Some("two"));
        assert_eq!(prepared.headers.get_all("x-token").iter().count(), 1);
    }

    #[test]
    fn relative_urls_join_the_base() {
        let base = Url::parse("https://api.example.com/v2/").expect("base");
        let request = RequestBuilder::get("items")
            .base(base)
            .query(json!({"page": 2, "tag": ["a", "b"], "skip": null}))
            .build()
            .expect("request");
        let prepared = request.prepare().expect("prepared");
        assert_eq!(
            prepared.url.as_str(),
            "https://api.example.com/v2/items?page=2&tag=a&tag=b"
        );
    }

    #[test]
    fn invalid_header_surfaces_at_build() {
        let err = RequestBuilder::get("https://api.example.com")
            .header("bad header", "x")
            .build()
            .expect_err("invalid header");
        assert_eq!(err.code, "INVALID_REQUEST");
        assert_eq!(err.trace[0].file, file!());
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(RequestBuilder::get("ftp://example.com/file").build().is_err());
        assert!(RequestBuilder::get("/relative").build().is_err());
    }

    #[test]
    fn json_payload_sets_content_type() {
        let prepared = RequestBuilder::post("https://api.example.com/items")
            .payload(json!({"name": "widget"}))
            .build()
            .and_then(|r| r.prepare())
            .expect("prepared");
        assert_eq!(prepared.header("content-type"), Some("application/json"));
        assert_eq!(prepared.body_text(), r#"{"name":"widget"}"#);
        assert_eq!(prepared.header("user-agent"), Some(network::USER_AGENT));
    }

    #[test]
    fn form_payload_is_url_encoded() {
        let prepared = RequestBuilder::post("https://api.example.com/token")
            .payload(json!({"grant_type": "refresh_token", "scope": "a b"}))
            .request_format_www_form_urlencoded()
            .build()
            .and_then(|r| r.prepare())
            .expect("prepared");
        assert_eq!(
            prepared.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(prepared.body_text(), "grant_type=refresh_token&scope=a+b");
    }

    #[test]
    fn multipart_mixes_payload_fields_and_files() {
        let prepared = RequestBuilder::post("https://api.example.com/upload")
            .payload(json!({"folder": "docs"}))
            .part(MultipartPart::file("file", "lorem", "text/plain").with_filename("lorem.txt"))
            .multipart_boundary("b0undary")
            .build()
            .and_then(|r| r.prepare())
            .expect("prepared");
        assert_eq!(
            prepared.header("content-type"),
            Some("multipart/form-data; boundary=b0undary")
        );
        let body = prepared.body_text();
        assert!(body.starts_with("--b0undary\r\nContent-Disposition: form-data; name=\"folder\""));
        assert!(body.contains("filename=\"lorem.txt\""));
    }

    #[test]
    fn explicit_content_type_overrides_the_format_default() {
        let prepared = RequestBuilder::post("https://api.example.com/raw")
            .raw_body("<a/>")
            .header("Content-Type", "application/xml")
            .build()
            .and_then(|r| r.prepare())
            .expect("prepared");
        assert_eq!(prepared.header("content-type"), Some("application/xml"));
        assert_eq!(prepared.body_text(), "<a/>");
    }

    #[test]
    fn retry_copy_is_marked() {
        let request = RequestBuilder::get("https://api.example.com")
            .build()
            .expect("request");
        assert!(!request.is_retried());
        assert!(request.into_retried().is_retried());
    }
}
