use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::http::request::PreparedRequest;
use crate::http::response::RawResponse;
use async_trait::async_trait;
use reqwest::Client;

/// Sends one prepared request. Retries and timeouts belong to implementations.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, EngineError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut builder = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone());
        builder = if config.max_redirects == 0 {
            builder.redirect(reqwest::redirect::Policy::none())
        } else {
            builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        };
        if config.insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|err| EngineError::transport(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self { client })
    }

    pub fn from_env() -> Result<Self, EngineError> {
        Self::new(&EngineConfig::from_env())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, EngineError> {
        let mut req = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if !request.body.is_empty() {
            req = req.body(request.body.clone());
        }
        let response = req.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> EngineError {
    if err.is_timeout() {
        return EngineError::timeout("HTTP request timed out");
    }
    EngineError::transport(err.to_string())
}
