use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

/// Board configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the board listens on
    /// Env: PORT (default: 3000)
    pub port: u16,

    /// Address the board binds to
    /// Env: BIND_ADDRESS (default: "127.0.0.1")
    pub bind_address: String,

    /// Base URL of the status API (serves /players and /players/count)
    /// Env: STATUS_API_URL (default: "http://localhost:8080/api")
    pub status_api_url: String,

    /// Connection address copied by the copy action
    /// Env: SERVER_ADDRESS (default: "play.example.net")
    pub server_address: String,

    /// Avatar service URL, `{name}` is replaced by the player name
    /// Env: AVATAR_URL (default: "https://mc-heads.net/avatar/{name}")
    pub avatar_url: String,

    /// Period between fetch cycles
    /// Env: POLL_INTERVAL_SECS (default: 10)
    pub poll_interval: Duration,

    /// Timeout for each status API and avatar request
    /// Env: FETCH_TIMEOUT_SECS (default: 5)
    pub fetch_timeout: Duration,

    /// Request timeout for the board's own routes
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Request body size limit in bytes
    /// Env: REQUEST_BODY_LIMIT (default: 65536 = 64KB)
    pub request_body_limit: usize,

    /// Rate limit for the retry and copy actions (requests per second)
    /// Env: RATE_LIMIT_ACTION_PER_SEC (default: 2)
    pub rate_limit_action_per_sec: u64,

    /// Burst size for the retry and copy actions
    /// Env: RATE_LIMIT_ACTION_BURST (default: 5)
    pub rate_limit_action_burst: u32,

    /// Rate limit for status and avatar reads (requests per second)
    /// Env: RATE_LIMIT_GENERAL_PER_SEC (default: 20)
    pub rate_limit_general_per_sec: u64,

    /// Burst size for status and avatar reads
    /// Env: RATE_LIMIT_GENERAL_BURST (default: 50)
    pub rate_limit_general_burst: u32,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv();
        let defaults = Self::default();
        Self {
            port: env_or_default("PORT", defaults.port),
            bind_address: env_or_default_string("BIND_ADDRESS", &defaults.bind_address),
            status_api_url: env_or_default_string("STATUS_API_URL", &defaults.status_api_url),
            server_address: env_or_default_string("SERVER_ADDRESS", &defaults.server_address),
            avatar_url: env_or_default_string("AVATAR_URL", &defaults.avatar_url),
            poll_interval: Duration::from_secs(env_or_default("POLL_INTERVAL_SECS", defaults.poll_interval.as_secs())),
            fetch_timeout: Duration::from_secs(env_or_default("FETCH_TIMEOUT_SECS", defaults.fetch_timeout.as_secs())),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", defaults.request_timeout.as_secs())),
            request_body_limit: env_or_default("REQUEST_BODY_LIMIT", defaults.request_body_limit),
            rate_limit_action_per_sec: env_or_default("RATE_LIMIT_ACTION_PER_SEC", defaults.rate_limit_action_per_sec),
            rate_limit_action_burst: env_or_default("RATE_LIMIT_ACTION_BURST", defaults.rate_limit_action_burst),
            rate_limit_general_per_sec: env_or_default("RATE_LIMIT_GENERAL_PER_SEC", defaults.rate_limit_general_per_sec),
            rate_limit_general_burst: env_or_default("RATE_LIMIT_GENERAL_BURST", defaults.rate_limit_general_burst),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "127.0.0.1".to_string(),
            status_api_url: "http://localhost:8080/api".to_string(),
            server_address: "play.example.net".to_string(),
            avatar_url: "https://mc-heads.net/avatar/{name}".to_string(),
            poll_interval: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            request_body_limit: 64 * 1024, // 64 KB
            rate_limit_action_per_sec: 2,
            rate_limit_action_burst: 5,
            rate_limit_general_per_sec: 20,
            rate_limit_general_burst: 50,
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
