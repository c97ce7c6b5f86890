//! Request execution: authentication, transport, token refresh and continuation chains.

mod chain;
pub mod reporter;
pub mod runner;

pub use reporter::ErrorReporter;
pub use runner::Runner;

use crate::auth::{AuthContext, Authorization};
use crate::constants::limits::LOG_BODY_PREVIEW_BYTES;
use crate::errors::EngineError;
use crate::http::request::{PreparedRequest, Request, RequestBuilder, ResponseFormat};
use crate::http::response::Response;
use crate::http::transport::Transport;
use crate::services::logger::Logger;
use crate::utils::redact::{redact_headers, redact_text};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug)]
pub enum Step {
    Done(Value),
    Request(RequestBuilder),
}

impl Step {
    pub fn done(value: impl Into<Value>) -> Self {
        Step::Done(value.into())
    }
}

impl From<Value> for Step {
    fn from(value: Value) -> Self {
        Step::Done(value)
    }
}

impl From<RequestBuilder> for Step {
    fn from(builder: RequestBuilder) -> Self {
        Step::Request(builder)
    }
}

#[derive(Clone)]
pub struct Engine {
    transport: Arc<dyn Transport>,
    authorization: Authorization,
    logger: Logger,
}

impl Engine {
    pub fn new(transport: Arc<dyn Transport>, authorization: Authorization) -> Self {
        Self {
            transport,
            authorization,
            logger: Logger::new("engine"),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Runs one request through authentication and the transport.
    ///
    /// When the strategy asks for a refresh, tokens are renewed and the request is
    /// sent once more marked retried; that second response is returned whatever
    /// its status.
    pub async fn dispatch(
        &self,
        auth: &mut AuthContext,
        request: Request,
    ) -> Result<Response, EngineError> {
        let mut request = request;
        loop {
            let headers = self.authorization.apply(auth)?;
            let prepared = request.with_headers(headers).prepare()?;
            let response = self.send(&prepared, request.response_format()).await?;
            if request.is_retried() || !self.authorization.should_refresh(response.status()) {
                return Ok(response);
            }
            self.refresh(auth, response.status()).await?;
            request = request.into_retried();
        }
    }

    async fn send(
        &self,
        prepared: &PreparedRequest,
        format: ResponseFormat,
    ) -> Result<Response, EngineError> {
        self.logger.debug(
            "request",
            Some(&json!({
                "method": prepared.method.as_str(),
                "url": redact_text(prepared.url.as_str(), LOG_BODY_PREVIEW_BYTES, None),
                "headers": redact_headers(&prepared.headers),
                "body_bytes": prepared.body.len(),
            })),
        );
        let raw = match self.transport.send(prepared).await {
            Ok(raw) => raw,
            Err(err) => {
                self.logger.warn(
                    "transport failed",
                    Some(&json!({
                        "url": redact_text(prepared.url.as_str(), LOG_BODY_PREVIEW_BYTES, None),
                        "code": err.code,
                    })),
                );
                return Err(err);
            }
        };
        self.logger.debug(
            "response",
            Some(&json!({
                "status": raw.status,
                "headers": redact_headers(&raw.headers),
                "body_bytes": raw.body.len(),
            })),
        );
        Ok(Response::new(raw, format))
    }

    async fn refresh(&self, auth: &mut AuthContext, trigger_status: u16) -> Result<(), EngineError> {
        let Authorization::OAuth2(oauth) = &self.authorization else {
            return Ok(());
        };
        let logger = self.logger.child("auth");
        logger.info("refreshing access token", Some(&json!({ "status": trigger_status })));

        let request = oauth
            .refresh_request(auth.settings(), auth.refresh_token())?
            .build()?;
        let prepared = request.prepare()?;
        let response = self
            .send(&prepared, request.response_format())
            .await
            .map_err(|err| {
                EngineError::auth_refresh(format!("Token refresh request failed: {}", err.message))
                    .with_details(json!({ "code": err.code, "message": err.message }))
            })?;
        let tokens = match oauth.extract_tokens(&response) {
            Ok(tokens) => tokens,
            Err(err) => {
                logger.error(
                    "token refresh failed",
                    Some(&json!({ "status": response.status(), "message": err.message })),
                );
                return Err(err);
            }
        };
        let rotated = tokens.refresh_token.is_some();
        auth.update_tokens(tokens.access_token, tokens.refresh_token);
        logger.info(
            "access token refreshed",
            Some(&json!({ "refresh_token_rotated": rotated, "refresh_count": auth.refresh_count() })),
        );
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("authorization", &self.authorization)
            .finish_non_exhaustive()
    }
}
