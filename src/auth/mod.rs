//! Authentication strategies applied to outgoing requests.

mod context;
mod oauth2;

pub use context::{AuthContext, Settings, TokenPersistence};
pub use oauth2::{OAuth2, Tokens};

use crate::errors::EngineError;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::fmt;
use std::sync::Arc;

pub type CustomApplyFn = Arc<dyn Fn(&Settings, &mut HeaderMap) -> Result<(), EngineError> + Send + Sync>;

#[derive(Clone, Default)]
pub enum Authorization {
    #[default]
    None,
    /// `Authorization: Basic` from the `username` / `password` settings.
    Basic,
    Custom(CustomApplyFn),
    OAuth2(OAuth2),
}

impl Authorization {
    pub fn custom<F>(apply: F) -> Self
    where
        F: Fn(&Settings, &mut HeaderMap) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        Authorization::Custom(Arc::new(apply))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Authorization::None => "none",
            Authorization::Basic => "basic_auth",
            Authorization::Custom(_) => "custom_auth",
            Authorization::OAuth2(_) => "oauth2",
        }
    }

    pub fn apply(&self, ctx: &AuthContext) -> Result<HeaderMap, EngineError> {
        let mut headers = HeaderMap::new();
        match self {
            Authorization::None => {}
            Authorization::Basic => {
                let setting = |key: &str| {
                    ctx.settings()
                        .get(key)
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string()
                };
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", setting("username"), setting("password")));
                let value = HeaderValue::from_str(&format!("Basic {}", encoded))
                    .map_err(|_| EngineError::invalid_request("Invalid basic credentials"))?;
                headers.insert(AUTHORIZATION, value);
            }
            Authorization::Custom(apply) => apply(ctx.settings(), &mut headers)?,
            Authorization::OAuth2(oauth) => {
                if let Some(token) = ctx.access_token() {
                    oauth.apply(ctx.settings(), token, &mut headers)?;
                }
            }
        }
        Ok(headers)
    }

    pub fn should_refresh(&self, status: u16) -> bool {
        match self {
            Authorization::OAuth2(oauth) => oauth.should_refresh(status),
            _ => false,
        }
    }
}

impl From<OAuth2> for Authorization {
    fn from(value: OAuth2) -> Self {
        Authorization::OAuth2(value)
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::OAuth2(oauth) => f.debug_tuple("OAuth2").field(oauth).finish(),
            other => f.write_str(other.kind()),
        }
    }
}
