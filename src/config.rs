use chrono_tz::Tz;
use config::{Config, Environment};
use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub store_backend: StoreBackend,

    pub database_path: Option<String>,

    #[serde(default = "default_dataset")]
    pub dataset: String,

    pub account_id: Option<String>,
    pub api_token: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    pub write_url: Option<String>,

    pub maxmind_city_db: Option<String>,

    #[serde(default = "default_day_boundary_timezone")]
    pub day_boundary_timezone: String,

    #[serde(default = "default_ignore_robots")]
    pub ignore_robots: bool,
}

/// Credentials for the remote analytics engine.
#[derive(Debug, Clone)]
pub struct RemoteCredentials {
    pub account_id: String,
    pub api_token: String,
    pub write_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_dataset() -> String {
    "metricsDataset".to_string()
}

fn default_api_base_url() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_day_boundary_timezone() -> String {
    "UTC".to_string()
}

fn default_ignore_robots() -> bool {
    true
}

impl Settings {
    pub fn new() -> std::result::Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            .add_source(
                Environment::with_prefix("QUIETCOUNT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn database_url(&self) -> String {
        match &self.database_path {
            Some(path) => format!("sqlite:{}?mode=rwc", path),
            None => "sqlite:quietcount.db?mode=rwc".to_string(),
        }
    }

    /// Timezone whose calendar days separate one "visitor day" from the next.
    pub fn day_boundary(&self) -> Result<Tz> {
        self.day_boundary_timezone.parse::<Tz>().map_err(|_| {
            Error::Configuration(format!(
                "unknown day boundary timezone '{}'",
                self.day_boundary_timezone
            ))
        })
    }

    /// The dataset name is interpolated into SQL, so it must be a plain identifier.
    pub fn validated_dataset(&self) -> Result<&str> {
        let ident = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| Error::Internal(e.to_string()))?;
        if ident.is_match(&self.dataset) {
            Ok(&self.dataset)
        } else {
            Err(Error::Configuration(format!(
                "dataset '{}' is not a valid identifier",
                self.dataset
            )))
        }
    }

    pub fn remote_credentials(&self) -> Result<RemoteCredentials> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let account_id = present(&self.account_id).ok_or_else(|| {
            Error::Configuration("QUIETCOUNT__ACCOUNT_ID is not set".to_string())
        })?;
        let api_token = present(&self.api_token)
            .ok_or_else(|| Error::Configuration("QUIETCOUNT__API_TOKEN is not set".to_string()))?;
        let write_url = present(&self.write_url)
            .ok_or_else(|| Error::Configuration("QUIETCOUNT__WRITE_URL is not set".to_string()))?;

        Ok(RemoteCredentials {
            account_id,
            api_token,
            write_url,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings {
        host: "127.0.0.1".to_string(),
        port: 3000,
        store_backend: StoreBackend::Sqlite,
        database_path: None,
        dataset: default_dataset(),
        account_id: None,
        api_token: None,
        api_base_url: default_api_base_url(),
        write_url: None,
        maxmind_city_db: None,
        day_boundary_timezone: "UTC".to_string(),
        ignore_robots: true,
    }
}
