//! Run configuration, read from the environment (and `.env`, if present).

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::distances::PathSettings;
use crate::structs::Coordinate;

const DEFAULT_TRACE_FILE: &str = "input.txt";
const DEFAULT_SOURCE: Coordinate = Coordinate {
    latitude: 6.9318,
    longitude: 79.8863,
};
const DEFAULT_REQUEST_DELAY_MS: u64 = 500;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// ipinfo.io access token.
    pub token: Option<String>,
    pub trace_file: PathBuf,
    pub output_dir: PathBuf,
    /// JSON list of known locations; when set, lookups never leave the machine.
    pub fixtures: Option<PathBuf>,
    pub path: PathSettings,
    pub resolver_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let latitude = parse(&var, "SOURCE_LAT")?.unwrap_or(DEFAULT_SOURCE.latitude);
        let longitude = parse(&var, "SOURCE_LON")?.unwrap_or(DEFAULT_SOURCE.longitude);
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ConfigError::Invalid {
                key: "SOURCE_LAT",
                value: latitude.to_string(),
            });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ConfigError::Invalid {
                key: "SOURCE_LON",
                value: longitude.to_string(),
            });
        }

        let delay_ms = parse(&var, "REQUEST_DELAY_MS")?.unwrap_or(DEFAULT_REQUEST_DELAY_MS);
        let timeout_secs = parse(&var, "RESOLVER_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            token: var("IPINFO").filter(|t| !t.is_empty()),
            trace_file: var("TRACE_FILE")
                .unwrap_or_else(|| DEFAULT_TRACE_FILE.to_string())
                .into(),
            output_dir: var("OUTPUT_DIR").unwrap_or_else(|| ".".to_string()).into(),
            fixtures: var("LOCATION_FIXTURES").map(PathBuf::from),
            path: PathSettings {
                source: Coordinate::new(latitude, longitude),
                source_label: var("SOURCE_LABEL").unwrap_or_else(|| "Source".to_string()),
                request_delay: Duration::from_millis(delay_ms),
            },
            resolver_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse<F, T>(var: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match var(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
