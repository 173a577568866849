//! Client settings stored in `settings.toml` under the platform config dir.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

pub const API_URL_ENV: &str = "FACTUFACIL_API_URL";

const DEFAULT_API_URL: &str = "https://factufacil-3a5827bb6dca.herokuapp.com";
const DEFAULT_QR_SERVICE: &str = "https://api.qrserver.com/v1/create-qr-code/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Origin of the invoicing API.
    pub api_url: String,
    /// Page customers open from a store QR code. Defaults to `api_url`.
    pub public_url: Option<String>,
    pub qr_service_url: String,
    pub lookup_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            public_url: None,
            qr_service_url: DEFAULT_QR_SERVICE.into(),
            lookup_delay_ms: 800,
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("mx", "factufacil", "factufacil") {
        return dirs.config_dir().join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidUrl(field, raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(field, raw.to_string()));
    }
    Ok(url)
}

impl Settings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Settings from the default location, with the environment override
    /// applied.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Self::load_from(&config_path())?;
        if let Ok(url) = std::env::var(API_URL_ENV) {
            settings.apply_api_override(url);
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_api_override(&mut self, url: String) {
        if !url.trim().is_empty() {
            debug!(%url, "API URL overridden from environment");
            self.api_url = url;
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_base()?;
        self.public_base()?;
        self.qr_service()?;
        Ok(())
    }

    pub fn api_base(&self) -> Result<Url, ConfigError> {
        parse_url("api_url", &self.api_url)
    }

    pub fn public_base(&self) -> Result<Url, ConfigError> {
        match &self.public_url {
            Some(url) if !url.trim().is_empty() => parse_url("public_url", url),
            _ => self.api_base(),
        }
    }

    pub fn qr_service(&self) -> Result<Url, ConfigError> {
        parse_url("qr_service_url", &self.qr_service_url)
    }

    pub fn lookup_delay(&self) -> Duration {
        Duration::from_millis(self.lookup_delay_ms)
    }
}
