use crate::constants::{env as env_keys, network};
use crate::utils::feature_flags::is_truthy_env;
use std::time::Duration;

/// Transport settings resolved from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub timeout_ms: u64,
    pub max_redirects: usize,
    pub insecure_tls: bool,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: network::TIMEOUT_REQUEST_MS,
            max_redirects: network::MAX_REDIRECTS,
            insecure_tls: false,
            user_agent: network::USER_AGENT.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout_ms: read_positive_env(env_keys::HTTP_TIMEOUT_MS).unwrap_or(defaults.timeout_ms),
            max_redirects: std::env::var(env_keys::MAX_REDIRECTS)
                .ok()
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .unwrap_or(defaults.max_redirects),
            insecure_tls: is_truthy_env(env_keys::INSECURE_TLS),
            user_agent: defaults.user_agent,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn read_positive_env(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}
