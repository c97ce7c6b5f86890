pub mod network {
    pub const TIMEOUT_REQUEST_MS: u64 = 30_000;
    pub const MAX_REDIRECTS: usize = 10;
    pub const USER_AGENT: &str = concat!("connector-kit/", env!("CARGO_PKG_VERSION"));
    pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";
}

pub mod env {
    pub const HTTP_TIMEOUT_MS: &str = "CONNECTOR_HTTP_TIMEOUT_MS";
    pub const MAX_REDIRECTS: &str = "CONNECTOR_MAX_REDIRECTS";
    pub const INSECURE_TLS: &str = "CONNECTOR_INSECURE_TLS";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

pub mod auth {
    pub const REFRESH_ON_STATUS: &[u16] = &[401];
    pub const ACCESS_TOKEN_KEY: &str = "access_token";
    pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
}

pub mod encoding {
    /// Share of control characters a decoded candidate may contain.
    pub const MAX_CONTROL_RATIO: f64 = 0.05;
    /// Share of unusable bytes above which input is treated as binary.
    pub const BINARY_RATIO: f64 = 0.30;
    pub const REPLACEMENT: char = '\u{FFFD}';
}

pub mod multipart {
    pub const BOUNDARY_PREFIX: &str = "----connector-kit-";
    pub const DEFAULT_FILE_TYPE: &str = "application/octet-stream";
}

pub mod limits {
    pub const LOG_BODY_PREVIEW_BYTES: usize = 2 * 1024;
    pub const ERROR_BODY_PREVIEW_BYTES: usize = 16 * 1024;
    pub const MAX_SUGGESTIONS: usize = 5;
}

pub mod protocols {
    pub const ALLOWED_HTTP: &[&str] = &["http:", "https:"];
}
