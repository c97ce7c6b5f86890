use crate::constants::limits::LOG_BODY_PREVIEW_BYTES;
use crate::errors::{EngineError, ErrorKind};
use crate::services::logger::Logger;
use crate::utils::redact::redact_text;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct ErrorReporter {
    source_file: &'static str,
    logger: Logger,
}

impl ErrorReporter {
    pub fn new(source_file: &'static str, logger: Logger) -> Self {
        Self {
            source_file,
            logger,
        }
    }

    pub fn source_file(&self) -> &'static str {
        self.source_file
    }

    /// Keeps only frames from the connector's own file, in order, and hands the error back.
    pub fn report(&self, action: &str, mut err: EngineError) -> EngineError {
        err.retain_frames_in(self.source_file);
        let meta = json!({
            "action": action,
            "kind": err.kind,
            "code": err.code,
            "trace": err.trace.iter().map(|frame| frame.to_string()).collect::<Vec<_>>(),
        });
        let message = redact_text(&err.message, LOG_BODY_PREVIEW_BYTES, None);
        match err.kind {
            ErrorKind::User | ErrorKind::NotFound => self.logger.warn(&message, Some(&meta)),
            _ => self.logger.error(&message, Some(&meta)),
        }
        err
    }

    pub fn render(err: &EngineError) -> String {
        let mut out = err.message.clone();
        if let Some(hint) = &err.hint {
            out.push_str(&format!("\n{}", hint));
        }
        for frame in &err.trace {
            out.push_str(&format!("\n    at {}", frame));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Frame;
    use crate::services::logger::LogLevel;

    fn frame(file: &'static str, line: u32) -> Frame {
        Frame {
            file,
            line,
            column: 1,
        }
    }

    #[test]
    fn trace_is_trimmed_to_connector_file_in_order() {
        let logger = Logger::capturing("reporter", LogLevel::Debug);
        let reporter = ErrorReporter::new("connectors/demo.rs", logger.clone());
        let mut err = EngineError::user("boom");
        err.trace = vec![
            frame("connectors/demo.rs", 10),
            frame("src/engine/chain.rs", 40),
            frame("connectors/demo.rs", 20),
        ];
        let err = reporter.report("list", err);
        let lines: Vec<u32> = err.trace.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![10, 20]);
        assert_eq!(
            ErrorReporter::render(&err),
            "boom\n    at connectors/demo.rs:10:1\n    at connectors/demo.rs:20:1"
        );
        let captured = logger.captured_lines();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].contains("WARN"));
    }

    #[test]
    fn runtime_faults_are_logged_as_errors() {
        let logger = Logger::capturing("reporter", LogLevel::Error);
        let reporter = ErrorReporter::new("connectors/demo.rs", logger.clone());
        let err = reporter.report("list", EngineError::runtime("bad"));
        assert!(err.trace.is_empty());
        assert_eq!(logger.captured_lines().len(), 1);
    }
}
