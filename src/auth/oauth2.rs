use crate::auth::context::Settings;
use crate::constants::auth::{ACCESS_TOKEN_KEY, REFRESH_ON_STATUS, REFRESH_TOKEN_KEY};
use crate::errors::EngineError;
use crate::http::request::RequestBuilder;
use crate::http::response::Response;
use crate::utils::data_path::lookup_str;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub type ApplyFn = Arc<dyn Fn(&Settings, &str, &mut HeaderMap) -> Result<(), EngineError> + Send + Sync>;
pub type RefreshOnFn = Arc<dyn Fn(u16) -> bool + Send + Sync>;
pub type RefreshFn =
    Arc<dyn Fn(&Settings, Option<&str>) -> Result<RequestBuilder, EngineError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct OAuth2 {
    apply: ApplyFn,
    refresh_on: RefreshOnFn,
    refresh: RefreshFn,
    access_token_path: String,
    refresh_token_path: String,
}

impl OAuth2 {
    pub fn new<F>(refresh: F) -> Self
    where
        F: Fn(&Settings, Option<&str>) -> Result<RequestBuilder, EngineError> + Send + Sync + 'static,
    {
        Self {
            apply: Arc::new(|_: &Settings, token: &str, headers: &mut HeaderMap| {
                headers.insert(AUTHORIZATION, bearer_value(token)?);
                Ok(())
            }),
            refresh_on: Arc::new(|status: u16| REFRESH_ON_STATUS.contains(&status)),
            refresh: Arc::new(refresh),
            access_token_path: ACCESS_TOKEN_KEY.to_string(),
            refresh_token_path: REFRESH_TOKEN_KEY.to_string(),
        }
    }

    /// Standard `grant_type=refresh_token` call against `token_url`, with client
    /// credentials taken from the `client_id` / `client_secret` settings.
    pub fn refresh_token_grant(token_url: impl Into<String>) -> Self {
        let token_url = token_url.into();
        Self::new(move |settings, refresh_token| {
            let refresh_token = refresh_token
                .ok_or_else(|| EngineError::auth_refresh("No refresh token available"))?;
            let mut payload = Map::new();
            payload.insert("grant_type".into(), Value::from("refresh_token"));
            payload.insert("refresh_token".into(), Value::from(refresh_token));
            for key in ["client_id", "client_secret", "scope"] {
                if let Some(value) = settings.get(key).filter(|v| !v.is_null()) {
                    payload.insert(key.into(), value.clone());
                }
            }
            Ok(RequestBuilder::post(token_url.clone())
                .payload(Value::Object(payload))
                .request_format_www_form_urlencoded())
        })
    }

    pub fn apply_with<F>(mut self, apply: F) -> Self
    where
        F: Fn(&Settings, &str, &mut HeaderMap) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.apply = Arc::new(apply);
        self
    }

    pub fn refresh_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.refresh_on = Arc::new(predicate);
        self
    }

    pub fn refresh_on_statuses(self, statuses: &[u16]) -> Self {
        let statuses = statuses.to_vec();
        self.refresh_on(move |status| statuses.contains(&status))
    }

    pub fn token_paths(mut self, access: impl Into<String>, refresh: impl Into<String>) -> Self {
        self.access_token_path = access.into();
        self.refresh_token_path = refresh.into();
        self
    }

    pub fn apply(
        &self,
        settings: &Settings,
        access_token: &str,
        headers: &mut HeaderMap,
    ) -> Result<(), EngineError> {
        (self.apply)(settings, access_token, headers)
    }

    pub fn should_refresh(&self, status: u16) -> bool {
        (self.refresh_on)(status)
    }

    pub fn refresh_request(
        &self,
        settings: &Settings,
        refresh_token: Option<&str>,
    ) -> Result<RequestBuilder, EngineError> {
        (self.refresh)(settings, refresh_token)
    }

    /// Reads tokens from a refresh response; anything short of a 2xx with an
    /// access token is an `AuthRefresh` failure carrying that response.
    pub fn extract_tokens(&self, response: &Response) -> Result<Tokens, EngineError> {
        if !response.is_success() {
            return Err(EngineError::auth_refresh(format!(
                "Token refresh failed ({})",
                response.status()
            ))
            .with_details(response.summary())
            .with_response(response.clone()));
        }
        let body = match response.body() {
            Ok(body) => body,
            Err(_) => {
                return Err(EngineError::auth_refresh("Token refresh response is not valid JSON")
                    .with_details(response.summary())
                    .with_response(response.clone()))
            }
        };
        let Some(access_token) = lookup_str(body, &self.access_token_path) else {
            return Err(EngineError::auth_refresh(format!(
                "Token refresh response has no {}",
                self.access_token_path
            ))
            .with_details(response.summary())
            .with_response(response.clone()));
        };
        Ok(Tokens {
            access_token: access_token.to_string(),
            refresh_token: lookup_str(body, &self.refresh_token_path).map(str::to_string),
        })
    }
}

impl fmt::Debug for OAuth2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2")
            .field("access_token_path", &self.access_token_path)
            .field("refresh_token_path", &self.refresh_token_path)
            .finish_non_exhaustive()
    }
}

pub(crate) fn bearer_value(token: &str) -> Result<HeaderValue, EngineError> {
    let value = if token.to_lowercase().starts_with("bearer ") {
        token.to_string()
    } else {
        format!("Bearer {}", token)
    };
    HeaderValue::from_str(&value).map_err(|_| EngineError::invalid_request("Invalid access token"))
}
