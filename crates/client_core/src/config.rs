use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The base URL as an absolute `http`/`https` address.
    pub fn base_url(&self) -> Result<Url, SettingsError> {
        let invalid = |reason: String| SettingsError::InvalidBaseUrl {
            url: self.api_base_url.clone(),
            reason,
        };
        let url = Url::parse(&self.api_base_url).map_err(|err| invalid(err.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }

    pub fn with_base_url(mut self, raw: &str) -> Self {
        self.api_base_url = normalize_base_url(raw);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        if timeout_ms > 0 {
            self.request_timeout_ms = timeout_ms;
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid api_base_url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {source}")]
    HttpClient { source: reqwest::Error },
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout_ms: Option<u64>,
}

/// Defaults, then `client.toml` in the working directory, then the process environment.
pub fn load_settings() -> Result<ClientSettings, SettingsError> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings, SettingsError> {
    let mut settings = ClientSettings::default();

    match fs::read_to_string(file) {
        Ok(raw) => {
            let file_cfg: FileSettings =
                toml::from_str(&raw).map_err(|source| SettingsError::Parse {
                    path: file.to_path_buf(),
                    source,
                })?;
            if let Some(v) = file_cfg.api_base_url {
                settings = settings.with_base_url(&v);
            }
            if let Some(v) = file_cfg.request_timeout_ms {
                settings = settings.with_timeout_ms(v);
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(SettingsError::Read {
                path: file.to_path_buf(),
                source,
            })
        }
    }

    if let Some(v) = env("API_BASE_URL") {
        settings = settings.with_base_url(&v);
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings = settings.with_base_url(&v);
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings = settings.with_timeout_ms(parsed),
            Err(_) => tracing::warn!(value = %v, "ignoring non-numeric APP__REQUEST_TIMEOUT_MS"),
        }
    }

    settings.base_url()?;
    Ok(settings)
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_API_BASE_URL.into();
    }
    trimmed.to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
