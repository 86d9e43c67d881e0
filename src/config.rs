use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_SETTINGS_PATH: &str = "school_settings.json";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub settings_path: PathBuf,
    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_url: String =
            try_load(&lookup, "SCHOOL_API_URL", DEFAULT_API_URL.to_string());
        let settings_path: String =
            try_load(&lookup, "SCHOOL_SETTINGS_PATH", DEFAULT_SETTINGS_PATH.to_string());
        let timeout_secs: u64 =
            try_load(&lookup, "SCHOOL_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS);

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            settings_path: PathBuf::from(settings_path),
            http_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

fn try_load<T: FromStr + Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T
where
    T::Err: Display,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
        Some(value) => value.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {value:?}: {e}, using default: {default}");
            default
        }),
    }
}
