use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::hub::{TEMP_MAXIMUM, TEMP_MINIMUM};

/// Refresh throttle used when `WISER_SCAN_INTERVAL_SECS` is zero or unset.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Delay between startup connection attempts.
pub const DEFAULT_SETUP_RETRY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    /// Hub address, e.g. `192.168.1.20`.
    pub host: String,
    /// Hub shared secret. `None` talks to the hub without authentication.
    pub secret: Option<String>,
    /// Minimum seconds between hub refreshes; `0` selects the built-in default.
    pub scan_interval_secs: u64,
    /// Lowest temperature a user may set, °C.
    pub minimum_temp: f64,
    /// Degrees added to the current room temperature when boosting.
    pub boost_temp: f64,
    /// Boost duration in minutes.
    pub boost_time_mins: u32,
    /// Seconds between startup connection attempts.
    pub setup_retry_secs: u64,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            host: required(&lookup, "WISER_HOST")?,
            secret: lookup("WISER_SECRET").filter(|s| !s.trim().is_empty()),
            scan_interval_secs: optional(&lookup, "WISER_SCAN_INTERVAL_SECS", "0")
                .parse()
                .context("WISER_SCAN_INTERVAL_SECS must be a non-negative integer")?,
            minimum_temp: optional(&lookup, "WISER_MINIMUM_TEMP", &TEMP_MINIMUM.to_string())
                .parse()
                .context("WISER_MINIMUM_TEMP must be a number")?,
            boost_temp: optional(&lookup, "WISER_BOOST_TEMP", "2")
                .parse()
                .context("WISER_BOOST_TEMP must be a number")?,
            boost_time_mins: optional(&lookup, "WISER_BOOST_TIME", "30")
                .parse()
                .context("WISER_BOOST_TIME must be a positive integer (minutes)")?,
            setup_retry_secs: optional(&lookup, "WISER_SETUP_RETRY_SECS", "30")
                .parse()
                .context("WISER_SETUP_RETRY_SECS must be a positive integer")?,
            server_host: optional(&lookup, "SERVER_HOST", "0.0.0.0"),
            server_port: optional(&lookup, "SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
        };

        if config.minimum_temp >= TEMP_MAXIMUM {
            bail!(
                "WISER_MINIMUM_TEMP must be below {TEMP_MAXIMUM}, got {}",
                config.minimum_temp
            );
        }

        Ok(config)
    }

    pub fn scan_interval(&self) -> Duration {
        match self.scan_interval_secs {
            0 => DEFAULT_SCAN_INTERVAL,
            secs => Duration::from_secs(secs),
        }
    }

    pub fn setup_retry_delay(&self) -> Duration {
        match self.setup_retry_secs {
            0 => DEFAULT_SETUP_RETRY,
            secs => Duration::from_secs(secs),
        }
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("missing required env var: {key}"))
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_host_is_set() {
        let c = config_from(&[("WISER_HOST", "10.0.0.5")]).unwrap();
        assert_eq!(c.host, "10.0.0.5");
        assert_eq!(c.secret, None);
        assert_eq!(c.scan_interval(), DEFAULT_SCAN_INTERVAL);
        assert_eq!(c.minimum_temp, TEMP_MINIMUM);
        assert_eq!(c.boost_temp, 2.0);
        assert_eq!(c.boost_time_mins, 30);
        assert_eq!(c.setup_retry_delay(), Duration::from_secs(30));
        assert_eq!(c.server_port, 8080);
    }

    #[test]
    fn missing_host_errors() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("WISER_HOST"));
    }

    #[test]
    fn blank_secret_means_no_secret() {
        // The hub is reachable without a secret on some firmware; treat an
        // empty value as "not configured" rather than an error.
        let c = config_from(&[("WISER_HOST", "h"), ("WISER_SECRET", "  ")]).unwrap();
        assert_eq!(c.secret, None);
    }

    #[test]
    fn zero_scan_interval_uses_default() {
        let c = config_from(&[("WISER_HOST", "h"), ("WISER_SCAN_INTERVAL_SECS", "0")]).unwrap();
        assert_eq!(c.scan_interval(), DEFAULT_SCAN_INTERVAL);

        let c = config_from(&[("WISER_HOST", "h"), ("WISER_SCAN_INTERVAL_SECS", "90")]).unwrap();
        assert_eq!(c.scan_interval(), Duration::from_secs(90));
    }

    #[test]
    fn bad_number_errors_with_key_name() {
        let err = config_from(&[("WISER_HOST", "h"), ("WISER_BOOST_TIME", "soon")]).unwrap_err();
        assert!(err.to_string().contains("WISER_BOOST_TIME"));
    }

    #[test]
    fn minimum_above_hub_maximum_errors() {
        let err = config_from(&[("WISER_HOST", "h"), ("WISER_MINIMUM_TEMP", "35")]).unwrap_err();
        assert!(err.to_string().contains("WISER_MINIMUM_TEMP"));
    }
}
