// src/session.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_SESSION_FILE: &str = "leavebook_session.json";
pub const DEFAULT_SESSION_TTL_MINS: i64 = 30;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid manager credentials")]
    InvalidCredentials,

    #[error("Manager login is not configured")]
    NotConfigured,

    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),
}

fn io_context<S: Into<String>>(source: std::io::Error, context: S) -> SessionError {
    SessionError::Io {
        source,
        context: context.into(),
    }
}

// --- Credentials ---

/// The single manager account. Only a SHA-256 digest of the password is kept.
#[derive(Clone, Debug)]
pub struct ManagerCredentials {
    pub username: String,
    pub password_sha256: String,
}

impl ManagerCredentials {
    pub fn hash_password(password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, username: &str, password: &str) -> Result<(), SessionError> {
        let digest = Self::hash_password(password);
        if username.trim() == self.username && digest.eq_ignore_ascii_case(self.password_sha256.trim()) {
            Ok(())
        } else {
            warn!("Rejected manager login for '{}'", username.trim());
            Err(SessionError::InvalidCredentials)
        }
    }
}

// --- Session marker ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerSession {
    pub logged_in_at: DateTime<Utc>,
}

impl ManagerSession {
    pub fn started_at(now: DateTime<Utc>) -> Self {
        Self { logged_in_at: now }
    }

    /// Valid for `ttl` after login; a login stamped in the future is not.
    pub fn is_valid(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now - self.logged_in_at;
        age >= Duration::zero() && age < ttl
    }

    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.logged_in_at + ttl
    }
}

/// Local persistence for the session marker.
#[derive(Clone, Debug)]
pub struct SessionFile {
    path: PathBuf,
    ttl: Duration,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Checks credentials and persists a fresh marker.
    pub fn login(
        &self,
        credentials: &ManagerCredentials,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<ManagerSession, SessionError> {
        credentials.verify(username, password)?;
        let session = ManagerSession::started_at(now);
        self.save(&session)?;
        info!(
            "Manager logged in; session valid until {}",
            session.expires_at(self.ttl)
        );
        Ok(session)
    }

    /// Startup check. An expired marker is removed and reported as absent.
    pub fn restore(&self, now: DateTime<Utc>) -> Result<Option<ManagerSession>, SessionError> {
        match self.load()? {
            Some(session) if session.is_valid(now, self.ttl) => Ok(Some(session)),
            Some(_) => {
                info!("Stored manager session expired; clearing it");
                self.clear()?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn load(&self) -> Result<Option<ManagerSession>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json_string = fs::read_to_string(&self.path)
            .map_err(|e| io_context(e, format!("Failed to read session file: {:?}", self.path)))?;
        let session: ManagerSession = serde_json::from_str(&json_string)?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &ManagerSession) -> Result<(), SessionError> {
        let json_string = serde_json::to_string_pretty(session)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                io_context(
                    e,
                    format!("Failed to create directory for session file: {:?}", parent),
                )
            })?;
        }

        let mut file = File::create(&self.path).map_err(|e| {
            io_context(e, format!("Failed to create session file: {:?}", self.path))
        })?;
        file.write_all(json_string.as_bytes()).map_err(|e| {
            io_context(e, format!("Failed to write session file: {:?}", self.path))
        })?;
        Ok(())
    }

    /// Logout. Missing file is fine.
    pub fn clear(&self) -> Result<(), SessionError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                io_context(e, format!("Failed to remove session file: {:?}", self.path))
            })?;
        }
        Ok(())
    }
}
