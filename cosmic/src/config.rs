//! Provider configuration
//!
//! Credentials come either from the provider block (with `COSMIC_*`
//! environment fallbacks) or from a section of an INI file.

use ini::Ini;
use thiserror::Error;
use tfplug::types::{AttributePath, DynamicValue};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 900;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("'api_url', 'api_key' and 'secret_key' should all have values")]
    IncompleteCredentials,

    #[error("'config' and 'profile' should both have a value")]
    IncompleteProfile,

    #[error("either 'api_url', 'api_key' and 'secret_key' or 'config' and 'profile' should have values")]
    MissingCredentials,

    #[error("failed to load config file {path}: {message}")]
    IniLoad { path: String, message: String },

    #[error("section '{profile}' does not exist in {path}")]
    MissingProfile { path: String, profile: String },

    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Raw provider block values after environment fallbacks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub http_get_only: Option<bool>,
    pub timeout: Option<u64>,
    pub config: Option<String>,
    pub profile: Option<String>,
}

/// Everything needed to build an API client
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub api_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub http_get_only: bool,
    pub timeout: u64,
}

fn non_empty_string(config: &DynamicValue, name: &str) -> Option<String> {
    config
        .get_string(&AttributePath::new(name))
        .ok()
        .filter(|s| !s.is_empty())
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

impl ProviderConfig {
    /// Reads the provider block. Null, unknown and empty values count as unset.
    pub fn from_block(config: &DynamicValue) -> Self {
        Self {
            api_url: non_empty_string(config, "api_url"),
            api_key: non_empty_string(config, "api_key"),
            secret_key: non_empty_string(config, "secret_key"),
            http_get_only: config.get_bool(&AttributePath::new("http_get_only")).ok(),
            timeout: config
                .get_number(&AttributePath::new("timeout"))
                .ok()
                .filter(|t| *t >= 0.0)
                .map(|t| t as u64),
            config: non_empty_string(config, "config"),
            profile: non_empty_string(config, "profile"),
        }
    }

    /// Fills unset values from `COSMIC_*` environment variables
    pub fn with_env_fallback(mut self) -> Result<Self, ConfigError> {
        self.api_url = self.api_url.or_else(|| env_string("COSMIC_API_URL"));
        self.api_key = self.api_key.or_else(|| env_string("COSMIC_API_KEY"));
        self.secret_key = self.secret_key.or_else(|| env_string("COSMIC_SECRET_KEY"));

        if self.http_get_only.is_none() {
            if let Some(value) = env_string("COSMIC_HTTP_GET_ONLY") {
                let parsed = value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
                    name: "COSMIC_HTTP_GET_ONLY",
                    value: value.clone(),
                })?;
                self.http_get_only = Some(parsed);
            }
        }

        if self.timeout.is_none() {
            if let Some(value) = env_string("COSMIC_TIMEOUT") {
                let parsed = value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    name: "COSMIC_TIMEOUT",
                    value: value.clone(),
                })?;
                self.timeout = Some(parsed);
            }
        }

        Ok(self)
    }

    fn has_keys(&self) -> bool {
        self.api_url.is_some() || self.api_key.is_some() || self.secret_key.is_some()
    }

    fn has_profile(&self) -> bool {
        self.config.is_some() || self.profile.is_some()
    }

    /// Both credential styles given at once
    pub fn conflicts(&self) -> bool {
        self.has_keys() && self.has_profile()
    }

    pub fn resolve(&self) -> Result<Credentials, ConfigError> {
        let (api_url, api_key, secret_key) = if self.has_keys() {
            match (&self.api_url, &self.api_key, &self.secret_key) {
                (Some(url), Some(key), Some(secret)) => (url.clone(), key.clone(), secret.clone()),
                _ => return Err(ConfigError::IncompleteCredentials),
            }
        } else if self.has_profile() {
            match (&self.config, &self.profile) {
                (Some(path), Some(profile)) => load_profile(path, profile)?,
                _ => return Err(ConfigError::IncompleteProfile),
            }
        } else {
            return Err(ConfigError::MissingCredentials);
        };

        Ok(Credentials {
            api_url,
            api_key,
            secret_key,
            http_get_only: self.http_get_only.unwrap_or(false),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        })
    }
}

/// Reads `url`, `apikey` and `secretkey` from section `profile`
fn load_profile(path: &str, profile: &str) -> Result<(String, String, String), ConfigError> {
    let ini = Ini::load_from_file(path).map_err(|e| ConfigError::IniLoad {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    let section = ini
        .section(Some(profile))
        .ok_or_else(|| ConfigError::MissingProfile {
            path: path.to_string(),
            profile: profile.to_string(),
        })?;

    let value = |key: &str| section.get(key).unwrap_or_default().to_string();
    Ok((value("url"), value("apikey"), value("secretkey")))
}
