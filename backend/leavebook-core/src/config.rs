// src/config.rs
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::backing_store::{HttpStoreConfig, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::desk::{DeskSettings, DEFAULT_SETTLE_DELAY_MS};
use crate::duplicate_guard::{LockConfig, DEFAULT_LOCK_WINDOW_TICKS, DEFAULT_TICK};
use crate::roster::StaffRoster;
use crate::session::{
    ManagerCredentials, SessionFile, DEFAULT_SESSION_FILE, DEFAULT_SESSION_TTL_MINS,
};

pub const ENV_PREFIX: &str = "LEAVEBOOK_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration from the environment")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the desk reads from `LEAVEBOOK_*` variables.
#[derive(Debug, Deserialize, Clone)]
pub struct DeskConfig {
    // Backing store
    pub endpoint: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub strict_acknowledgement: bool,

    // Desk behaviour
    #[serde(default = "default_lock_window_secs")]
    pub lock_window_secs: u32,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_true")]
    pub require_reason: bool,
    #[serde(default)]
    pub staff_roster: Option<String>,

    // Manager access
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
    #[serde(default = "default_session_ttl_mins")]
    pub session_ttl_mins: i64,
    #[serde(default = "default_manager_username")]
    pub manager_username: String,
    #[serde(default)]
    pub manager_password_sha256: Option<String>,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_lock_window_secs() -> u32 {
    DEFAULT_LOCK_WINDOW_TICKS
}
fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}
fn default_true() -> bool {
    true
}
fn default_session_file() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_FILE)
}
fn default_session_ttl_mins() -> i64 {
    DEFAULT_SESSION_TTL_MINS
}
fn default_manager_username() -> String {
    "admin".to_string()
}

impl DeskConfig {
    /// Loads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let config: DeskConfig = envy::prefixed(ENV_PREFIX).from_env()?;
        config.validate()?;
        debug!("Loaded configuration: {:?}", config.redacted());
        Ok(config)
    }

    /// Same as [`DeskConfig::from_env`] but from explicit pairs (no `.env`).
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: DeskConfig = envy::prefixed(ENV_PREFIX).from_iter(pairs)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::Invalid(format!("endpoint '{}' is not a URL: {}", self.endpoint, e))
        })?;
        if self.lock_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "lock_window_secs must be at least 1".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.session_ttl_mins <= 0 {
            return Err(ConfigError::Invalid(
                "session_ttl_mins must be positive".into(),
            ));
        }
        if let Some(digest) = &self.manager_password_sha256 {
            let digest = digest.trim();
            if digest.len() != 64 || hex::decode(digest).is_err() {
                return Err(ConfigError::Invalid(
                    "manager_password_sha256 must be 64 hex characters".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn store_config(&self) -> Result<HttpStoreConfig, ConfigError> {
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("endpoint: {}", e)))?;
        Ok(HttpStoreConfig {
            endpoint,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            strict_acknowledgement: self.strict_acknowledgement,
        })
    }

    pub fn lock_config(&self) -> LockConfig {
        LockConfig {
            window_ticks: self.lock_window_secs,
            tick: DEFAULT_TICK,
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_mins)
    }

    pub fn desk_settings(&self) -> DeskSettings {
        DeskSettings {
            require_reason: self.require_reason,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            session_ttl: self.session_ttl(),
            lock: self.lock_config(),
        }
    }

    pub fn session_file(&self) -> SessionFile {
        SessionFile::new(self.session_file.clone(), self.session_ttl())
    }

    /// `None` when no password digest is configured; manager login is then off.
    pub fn manager_credentials(&self) -> Option<ManagerCredentials> {
        self.manager_password_sha256
            .as_ref()
            .map(|digest| ManagerCredentials {
                username: self.manager_username.trim().to_string(),
                password_sha256: digest.trim().to_lowercase(),
            })
    }

    pub fn roster(&self) -> StaffRoster {
        match &self.staff_roster {
            Some(list) if !list.trim().is_empty() => StaffRoster::from_csv_list(list),
            _ => StaffRoster::default(),
        }
    }

    fn redacted(&self) -> DeskConfig {
        let mut copy = self.clone();
        if copy.manager_password_sha256.is_some() {
            copy.manager_password_sha256 = Some("<redacted>".into());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config =
            DeskConfig::from_pairs(pairs(&[("LEAVEBOOK_ENDPOINT", "https://sheet.example/exec")]))
                .unwrap();
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.lock_window_secs, 4);
        assert_eq!(config.settle_delay_ms, 1500);
        assert!(config.require_reason);
        assert!(!config.strict_acknowledgement);
        assert_eq!(config.session_ttl_mins, 30);
        assert_eq!(config.manager_username, "admin");
        assert!(config.manager_credentials().is_none());
        assert_eq!(config.roster(), StaffRoster::default());

        let settings = config.desk_settings();
        assert_eq!(settings.settle_delay, Duration::from_millis(1500));
        assert_eq!(settings.lock.window_ticks, 4);
    }

    #[test]
    fn test_overrides() {
        let digest = ManagerCredentials::hash_password("secret");
        let config = DeskConfig::from_pairs(pairs(&[
            ("LEAVEBOOK_ENDPOINT", "https://sheet.example/exec"),
            ("LEAVEBOOK_LOCK_WINDOW_SECS", "7"),
            ("LEAVEBOOK_REQUIRE_REASON", "false"),
            ("LEAVEBOOK_STRICT_ACKNOWLEDGEMENT", "true"),
            ("LEAVEBOOK_STAFF_ROSTER", "Ana, Bo"),
            ("LEAVEBOOK_MANAGER_PASSWORD_SHA256", digest.as_str()),
        ]))
        .unwrap();
        assert_eq!(config.lock_config().window_ticks, 7);
        assert!(!config.require_reason);
        assert!(config.store_config().unwrap().strict_acknowledgement);
        assert_eq!(config.roster().names(), &["Ana".to_string(), "Bo".to_string()]);
        let creds = config.manager_credentials().unwrap();
        assert!(creds.verify("admin", "secret").is_ok());
    }

    #[test]
    fn test_missing_endpoint_is_an_error() {
        assert!(matches!(
            DeskConfig::from_pairs(Vec::new()),
            Err(ConfigError::Env(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            DeskConfig::from_pairs(pairs(&[("LEAVEBOOK_ENDPOINT", "not a url")])),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DeskConfig::from_pairs(pairs(&[
                ("LEAVEBOOK_ENDPOINT", "https://sheet.example/exec"),
                ("LEAVEBOOK_LOCK_WINDOW_SECS", "0"),
            ])),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DeskConfig::from_pairs(pairs(&[
                ("LEAVEBOOK_ENDPOINT", "https://sheet.example/exec"),
                ("LEAVEBOOK_MANAGER_PASSWORD_SHA256", "abc"),
            ])),
            Err(ConfigError::Invalid(_))
        ));
    }
}
