use jiff::SignedDuration;
use std::time::Duration;
use typed_builder::TypedBuilder;

/// Tunables for [`ShortenerService`](crate::ShortenerService).
#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceConfig {
    /// Public base under which short links are minted.
    #[builder(default = "http://localhost:8080".to_string())]
    pub base_url: String,
    /// Length of generated short codes.
    #[builder(default = 7)]
    pub code_length: usize,
    /// Collision retries before shortening gives up; `0` falls back to the
    /// generator's default.
    #[builder(default = 10)]
    pub max_attempts: usize,
    /// How many domains a metrics query reports when the caller passes `0`.
    #[builder(default = 3)]
    pub default_top_n: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Tunables for the rate limiter and its sweep, wired up by the caller.
#[derive(Debug, Clone, TypedBuilder)]
pub struct LimiterConfig {
    /// Requests each key may spend per window.
    #[builder(default = 1000)]
    pub max_tokens: u32,
    /// Length of the fixed window.
    #[builder(default = SignedDuration::from_hours(1))]
    pub window: SignedDuration,
    /// How often expired buckets and records are swept.
    #[builder(default = Duration::from_secs(600))]
    pub purge_interval: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_defaults_match_the_documented_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.code_length, 7);
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.default_top_n, 3);
    }

    #[test]
    fn limiter_defaults_match_the_documented_values() {
        let config = LimiterConfig::default();
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.window, SignedDuration::from_hours(1));
        assert_eq!(config.purge_interval, Duration::from_secs(600));
    }

    #[test]
    fn builder_overrides_stick() {
        let config = ServiceConfig::builder()
            .base_url("https://sn.example".to_string())
            .code_length(10)
            .build();
        assert_eq!(config.base_url, "https://sn.example");
        assert_eq!(config.code_length, 10);
        assert_eq!(config.default_top_n, 3);
    }
}
