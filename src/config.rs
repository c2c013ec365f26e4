//! Process configuration sourced from environment variables.
//!
//! Everything has a workable default so a bare `cargo run` comes up
//! listening on 3000 against a local upstream API.

use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPSTREAM_URL: &str = "http://localhost:3001";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 5;
const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 2;

/// Parse an env var, falling back to `default` when unset or malformed.
pub(crate) fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub upstream: UpstreamConfig,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self { port: env_parse("PORT", DEFAULT_PORT), upstream: UpstreamConfig::from_env() }
    }
}

/// Where the project/user API lives and how long to wait for it.
///
/// One base URL covers project lookup, user lookup, and token
/// verification; the three endpoints are served by the same upstream.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl UpstreamConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("UPSTREAM_API_URL")
            .unwrap_or_else(|_| DEFAULT_UPSTREAM_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            base_url,
            timeout: Duration::from_secs(env_parse("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)),
            connect_timeout: Duration::from_secs(env_parse(
                "UPSTREAM_CONNECT_TIMEOUT_SECS",
                DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_returns_default_when_unset() {
        assert_eq!(env_parse("SKETCHRELAY_TEST_NEVER_SET", 42u64), 42);
    }

    #[test]
    fn env_parse_returns_default_when_malformed() {
        // SAFETY: single-use var name, touched only by this test.
        unsafe { std::env::set_var("SKETCHRELAY_TEST_MALFORMED", "not-a-number") };
        assert_eq!(env_parse("SKETCHRELAY_TEST_MALFORMED", 7u16), 7);
    }

    #[test]
    fn env_parse_reads_a_set_value() {
        // SAFETY: single-use var name, touched only by this test.
        unsafe { std::env::set_var("SKETCHRELAY_TEST_SET", "9090") };
        assert_eq!(env_parse("SKETCHRELAY_TEST_SET", 1u16), 9090);
    }
}
