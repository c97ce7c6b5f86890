use crate::constants::auth::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub type Settings = Map<String, Value>;

pub trait TokenPersistence: Send + Sync {
    fn on_tokens_updated(&self, settings: &Settings);
}

impl<F> TokenPersistence for F
where
    F: Fn(&Settings) + Send + Sync,
{
    fn on_tokens_updated(&self, settings: &Settings) {
        self(settings)
    }
}

pub struct AuthContext {
    settings: Settings,
    access_token: Option<String>,
    refresh_token: Option<String>,
    refresh_count: u32,
    persistence: Option<Arc<dyn TokenPersistence>>,
}

impl AuthContext {
    pub fn new(settings: Settings) -> Self {
        let access_token = token_from(&settings, ACCESS_TOKEN_KEY);
        let refresh_token = token_from(&settings, REFRESH_TOKEN_KEY);
        Self {
            settings,
            access_token,
            refresh_token,
            refresh_count: 0,
            persistence: None,
        }
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn TokenPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn refresh_count(&self) -> u32 {
        self.refresh_count
    }

    /// Stores new tokens and notifies persistence before returning.
    pub(crate) fn update_tokens(&mut self, access_token: String, refresh_token: Option<String>) {
        self.settings.insert(
            ACCESS_TOKEN_KEY.to_string(),
            Value::String(access_token.clone()),
        );
        self.access_token = Some(access_token);
        if let Some(refresh_token) = refresh_token {
            self.settings.insert(
                REFRESH_TOKEN_KEY.to_string(),
                Value::String(refresh_token.clone()),
            );
            self.refresh_token = Some(refresh_token);
        }
        self.refresh_count += 1;
        if let Some(persistence) = &self.persistence {
            persistence.on_tokens_updated(&self.settings);
        }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("settings", &self.settings.keys().collect::<Vec<_>>())
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("refresh_count", &self.refresh_count)
            .finish()
    }
}

fn token_from(settings: &Settings, key: &str) -> Option<String> {
    settings
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
