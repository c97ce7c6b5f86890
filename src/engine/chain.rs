use super::{Engine, Step};
use crate::auth::AuthContext;
use crate::errors::{EngineError, Frame};
use crate::http::request::{Continuation, Request};
use serde_json::{json, Value};
use url::Url;

impl Engine {
    /// Runs `first` and every request its continuations return, until one
    /// resolves to a value.
    ///
    /// A request without a continuation ends the chain with its decoded body.
    /// Failures carry the registration frame of each continuation entered, in
    /// call order, ahead of the frame that raised.
    pub async fn run_chain(
        &self,
        auth: &mut AuthContext,
        first: Request,
        base: Option<&Url>,
    ) -> Result<Value, EngineError> {
        let mut boundaries: Vec<Frame> = Vec::new();
        let mut request = first;
        let mut hop = 0usize;
        loop {
            hop += 1;
            let on_success = request.continuation().cloned();
            let on_error = request.error_continuation().cloned();

            let response = self
                .dispatch(auth, request)
                .await
                .map_err(|err| err.with_boundaries(&boundaries))?;

            let status = response.status();
            let continuation: Option<Continuation> = match on_error {
                Some(handler) if handler.matches(status) => Some(handler.continuation().clone()),
                _ => on_success,
            };
            let Some(continuation) = continuation else {
                self.logger
                    .debug("chain finished", Some(&json!({ "hops": hop, "status": status })));
                return response
                    .into_value()
                    .map_err(|err| err.with_boundaries(&boundaries));
            };

            boundaries.push(continuation.frame());
            match continuation.call(response) {
                Ok(Step::Done(value)) => {
                    self.logger
                        .debug("chain finished", Some(&json!({ "hops": hop, "status": status })));
                    return Ok(value);
                }
                Ok(Step::Request(builder)) => {
                    request = builder
                        .default_base(base)
                        .build()
                        .map_err(|err| err.with_boundaries(&boundaries))?;
                }
                Err(err) => return Err(err.with_boundaries(&boundaries)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Authorization, Settings};
    use crate::http::request::RequestBuilder;
    use crate::http::response::RawResponse;
    use crate::http::transport::Transport;
    use crate::http::PreparedRequest;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct Queue(Mutex<VecDeque<RawResponse>>);

    #[async_trait]
    impl Transport for Queue {
        async fn send(&self, _request: &PreparedRequest) -> Result<RawResponse, EngineError> {
            self.0
                .lock()
                .map_err(|_| EngineError::transport("poisoned"))?
                .pop_front()
                .ok_or_else(|| EngineError::transport("no response queued"))
        }
    }

    fn engine(responses: Vec<RawResponse>) -> Engine {
        Engine::new(
            Arc::new(Queue(Mutex::new(responses.into()))),
            Authorization::None,
        )
    }

    #[tokio::test]
    async fn request_without_continuation_returns_body() {
        let engine = engine(vec![RawResponse::json(200, &json!({"ok": true}))]);
        let mut auth = AuthContext::new(Settings::new());
        let request = RequestBuilder::get("https://api.example.com/a")
            .build()
            .expect("request");
        let value = engine
            .run_chain(&mut auth, request, None)
            .await
            .expect("chain");
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn error_continuation_takes_matching_statuses() {
        let engine = engine(vec![RawResponse::json(404, &json!({"error": "missing"}))]);
        let mut auth = AuthContext::new(Settings::new());
        let request = RequestBuilder::get("https://api.example.com/a")
            .after_response(|_| Ok(Step::done("success path")))
            .after_error_response([404], |response| {
                Ok(Step::done(json!({ "status": response.status() })))
            })
            .build()
            .expect("request");
        let value = engine
            .run_chain(&mut auth, request, None)
            .await
            .expect("chain");
        assert_eq!(value, json!({"status": 404}));
    }

    #[tokio::test]
    async fn relative_followups_resolve_against_base() {
        let engine = engine(vec![
            RawResponse::json(200, &json!("one")),
            RawResponse::json(200, &json!("two")),
        ]);
        let mut auth = AuthContext::new(Settings::new());
        let base = Url::parse("https://api.example.com/v1/").expect("base");
        let request = RequestBuilder::get("first")
            .base(base.clone())
            .after_response(|_| Ok(Step::Request(RequestBuilder::get("second"))))
            .build()
            .expect("request");
        let value = engine
            .run_chain(&mut auth, request, Some(&base))
            .await
            .expect("chain");
        assert_eq!(value, json!("two"));
    }
}
