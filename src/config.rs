use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::debounce::DEFAULT_SEARCH_DEBOUNCE;
use crate::filter::DEFAULT_RADIUS_KM;
use crate::geo::GeoPoint;
use crate::location::DEFAULT_LOCATION_TIMEOUT;
use crate::utils;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub timezone: Option<String>,
    pub radius_km: Option<f64>,
    pub home_latitude: Option<f64>,
    pub home_longitude: Option<f64>,
    pub search_debounce_ms: Option<u64>,
    pub location_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Lets the environment override what is stored on disk.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("EVENT_FEED_BACKEND_URL") {
            self.backend_url = Some(url);
        }
        if let Ok(key) = std::env::var("EVENT_FEED_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(token) = std::env::var("EVENT_FEED_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Ok(tz) = std::env::var("EVENT_FEED_TIMEZONE") {
            self.timezone = Some(tz);
        }
        self
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(DEFAULT_RADIUS_KM)
    }

    pub fn home(&self) -> Option<GeoPoint> {
        match (self.home_latitude, self.home_longitude) {
            (Some(lat), Some(lon)) => GeoPoint::checked(lat, lon),
            _ => None,
        }
    }

    pub fn search_debounce(&self) -> Duration {
        self.search_debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SEARCH_DEBOUNCE)
    }

    pub fn location_timeout(&self) -> Duration {
        self.location_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LOCATION_TIMEOUT)
    }

    /// Falls back to UTC when no zone is set or the name is not recognised.
    pub fn tz(&self) -> Tz {
        self.timezone
            .as_deref()
            .and_then(|name| name.parse::<Tz>().ok())
            .unwrap_or(Tz::UTC)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let text = || {
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        };
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "backend_url" => self.backend_url = text(),
            "api_key" => self.api_key = text(),
            "access_token" => self.access_token = text(),
            "timezone" => {
                if !value.is_empty() && value.parse::<Tz>().is_err() {
                    return Err(invalid());
                }
                self.timezone = text();
            }
            "radius_km" => self.radius_km = parse_optional(value).map_err(|_| invalid())?,
            "home_latitude" => self.home_latitude = parse_optional(value).map_err(|_| invalid())?,
            "home_longitude" => {
                self.home_longitude = parse_optional(value).map_err(|_| invalid())?
            }
            "search_debounce_ms" => {
                self.search_debounce_ms = parse_optional(value).map_err(|_| invalid())?
            }
            "location_timeout_secs" => {
                self.location_timeout_secs = parse_optional(value).map_err(|_| invalid())?
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

fn parse_optional<T: std::str::FromStr>(value: &str) -> Result<Option<T>, T::Err> {
    if value.is_empty() {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: Mutex<AppConfig>,
}

impl ConfigStore {
    pub fn load() -> Self {
        Self::load_from(utils::config_path())
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = match read_config(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("ignoring unreadable config {:?}: {err}", path);
                AppConfig::default()
            }
        };
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> AppConfig {
        match self.data.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update<F>(&self, transform: F) -> Result<AppConfig, ConfigError>
    where
        F: FnOnce(&mut AppConfig) -> Result<(), ConfigError>,
    {
        let mut guard = match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = guard.clone();
        transform(&mut next)?;
        write_config(&self.path, &next)?;
        *guard = next;
        Ok(guard.clone())
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    utils::ensure_parent(path)?;
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}
