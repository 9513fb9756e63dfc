//! Runtime configuration from the environment.

use std::env;
use std::str::FromStr;

/// Sweeper daemon configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string, when running against a database
    pub database_url: Option<String>,
    /// UTC hour of the daily sweep
    pub sweep_hour_utc: u32,
    /// Bound on concurrent escalation deliveries
    pub delivery_concurrency: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok(),
            sweep_hour_utc: parse_env("SWEEP_HOUR_UTC", 9),
            delivery_concurrency: parse_env("DELIVERY_CONCURRENCY", 8),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Unlikely to be set in a test environment
        assert_eq!(parse_env::<u32>("ATS_POC_UNSET_SWEEP_HOUR", 9), 9);
    }

    #[test]
    fn test_garbage_value_falls_back() {
        env::set_var("ATS_POC_GARBAGE_HOUR", "not-a-number");
        assert_eq!(parse_env::<u32>("ATS_POC_GARBAGE_HOUR", 9), 9);
        env::remove_var("ATS_POC_GARBAGE_HOUR");
    }
}
