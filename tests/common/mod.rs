#![allow(dead_code)]

use async_trait::async_trait;
use connector_kit::{EngineError, PreparedRequest, RawResponse, Settings, Transport};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

/// Replays queued responses in order and records every request it was handed.
#[derive(Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<RawResponse>>,
    sent: Mutex<Vec<PreparedRequest>>,
}

impl StubTransport {
    pub fn new(responses: impl IntoIterator<Item = RawResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<PreparedRequest> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("sent lock").len()
    }

    /// Requests whose URL path equals `path`.
    pub fn sent_to(&self, path: &str) -> Vec<PreparedRequest> {
        self.sent()
            .into_iter()
            .filter(|request| request.url.path() == path)
            .collect()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, EngineError> {
        self.sent.lock().expect("sent lock").push(request.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .ok_or_else(|| EngineError::transport(format!("no stub response for {}", request.url)))
    }
}

pub fn settings(value: Value) -> Settings {
    value.as_object().cloned().expect("settings object")
}
