use crate::http::response::Response;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::panic::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    User,
    AuthRefresh,
    Transport,
    Runtime,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl Frame {
    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<Frame>,
    #[serde(skip)]
    pub response: Option<Box<Response>>,
}

impl EngineError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
            trace: Vec::new(),
            response: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User, "USER_ERROR", message)
    }

    pub fn auth_refresh(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthRefresh, "AUTH_REFRESH_FAILED", message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, "TRANSPORT", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, "TIMEOUT", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, "NOT_FOUND", message)
    }

    /// Runtime fault; records the caller as the raising frame.
    #[track_caller]
    pub fn runtime(message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::Runtime, "RUNTIME", message);
        err.trace.push(Frame::from_location(Location::caller()));
        err
    }

    #[track_caller]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::Runtime, "INVALID_REQUEST", message);
        err.trace.push(Frame::from_location(Location::caller()));
        err
    }

    pub fn with_boundaries(mut self, boundaries: &[Frame]) -> Self {
        if boundaries.is_empty() {
            return self;
        }
        let mut trace = boundaries.to_vec();
        trace.append(&mut self.trace);
        self.trace = trace;
        self
    }

    pub fn retain_frames_in(&mut self, file: &str) {
        self.trace.retain(|frame| frame.file == file);
    }

    pub fn is_user(&self) -> bool {
        self.kind == ErrorKind::User
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_records_raising_frame() {
        let err = EngineError::runtime("boom");
        assert_eq!(err.trace.len(), 1);
        assert_eq!(err.trace[0].file, file!());
    }

    #[test]
    fn boundaries_precede_origin() {
        let outer = Frame {
            file: "connector.rs",
            line: 1,
            column: 1,
        };
        let err = EngineError::runtime("boom").with_boundaries(&[outer]);
        assert_eq!(err.trace[0], outer);
        assert_eq!(err.trace.len(), 2);
    }

    #[test]
    fn user_errors_carry_no_trace() {
        let err = EngineError::user("custom test error");
        assert!(err.is_user());
        assert!(err.trace.is_empty());
        assert_eq!(err.to_string(), "custom test error");
    }
}
