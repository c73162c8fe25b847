//! Process configuration, loaded once at startup from environment
//! variables.

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub store_url: String,
    pub store_service_key: String,
    pub maps_api_key: Option<String>,
    pub sentry_dsn: Option<String>,
    pub server_port: u16,
    pub debug: bool,

    pub solver_timeout_ms: u64,
    pub distance_cache_tolerance: f64,
    pub provider_rate_limit_ms: u64,
    pub max_cluster_radius_miles: f64,
    pub max_stops_per_trip: usize,
    pub provider_batch_size: usize,
    pub setup_buffer_hours: f64,
    pub teardown_buffer_hours: f64,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let raw = env_or(name, default);
    raw.parse::<T>()
        .map_err(|_| ConfigError::Malformed { name, value: raw })
}

impl Config {
    /// Load configuration from the environment. A missing variable falls
    /// back to its default silently; a *present but malformed* value is a
    /// fatal startup error, never a silent fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store_url: env_or("TABULAR_STORE_URL", ""),
            store_service_key: env_or("TABULAR_STORE_SERVICE_KEY", ""),
            maps_api_key: {
                let key = env_or("GOOGLE_MAPS_API_KEY", "");
                if key.is_empty() { None } else { Some(key) }
            },
            sentry_dsn: {
                let dsn = env_or("OPTIMIZER_SENTRY_DSN", "");
                if dsn.is_empty() { None } else { Some(dsn) }
            },
            server_port: parse_env("FLASK_PORT", "5001")?,
            debug: env_or("FLASK_DEBUG", "false").eq_ignore_ascii_case("true"),
            solver_timeout_ms: parse_env("SOLVER_TIMEOUT_MS", "30000")?,
            distance_cache_tolerance: parse_env("DISTANCE_CACHE_TOLERANCE", "0.001")?,
            provider_rate_limit_ms: parse_env("GOOGLE_MAPS_RATE_LIMIT_MS", "200")?,
            max_cluster_radius_miles: parse_env("MAX_CLUSTER_RADIUS_MILES", "150")?,
            max_stops_per_trip: parse_env("MAX_STOPS_PER_TRIP", "4")?,
            provider_batch_size: parse_env("BATCH_SIZE", "25")?,
            setup_buffer_hours: parse_env("SETUP_BUFFER_HOURS", "4")?,
            teardown_buffer_hours: parse_env("TEARDOWN_BUFFER_HOURS", "3")?,
        })
    }

    /// Configuration with every field at its documented default, with no
    /// environment lookups. Used by tests and as a fallback display.
    pub fn defaults() -> Self {
        Self {
            store_url: String::new(),
            store_service_key: String::new(),
            maps_api_key: None,
            sentry_dsn: None,
            server_port: 5001,
            debug: false,
            solver_timeout_ms: 30_000,
            distance_cache_tolerance: 0.001,
            provider_rate_limit_ms: 200,
            max_cluster_radius_miles: 150.0,
            max_stops_per_trip: 4,
            provider_batch_size: 25,
            setup_buffer_hours: 4.0,
            teardown_buffer_hours: 3.0,
        }
    }

    pub fn is_store_configured(&self) -> bool {
        !self.store_url.is_empty() && !self.store_service_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::defaults();
        assert_eq!(config.server_port, 5001);
        assert_eq!(config.solver_timeout_ms, 30_000);
        assert_eq!(config.max_stops_per_trip, 4);
        assert!(!config.is_store_configured());
    }

    #[test]
    fn store_is_configured_only_when_both_fields_are_set() {
        let mut config = Config::defaults();
        config.store_url = "https://store.example".into();
        assert!(!config.is_store_configured());
        config.store_service_key = "secret".into();
        assert!(config.is_store_configured());
    }
}
