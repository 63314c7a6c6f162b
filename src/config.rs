//! Persisted configuration and download settings.
//!
//! The configuration file (`music-get.json` in the working directory) holds
//! the provider session cookies and the preferred bitrate. It is loaded once
//! at startup and saved after the provider request pipeline has run, so
//! cookies captured by a login survive to the next invocation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::provider::Bitrate;
use crate::session::{ProviderSession, StoredCookie};

/// Default configuration file name, resolved against the working directory.
pub const CONFIG_FILE_NAME: &str = "music-get.json";

/// Default download directory name, resolved against the working directory.
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";

/// Default preferred bitrate in kbps.
pub const DEFAULT_BITRATE_KBPS: u32 = 128;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 16;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Errors from loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("IO error on config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file exists but is not valid configuration JSON.
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// JSON-backed application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
    #[serde(default = "default_bitrate", rename = "br")]
    pub bitrate: u32,
}

fn default_bitrate() -> u32 {
    DEFAULT_BITRATE_KBPS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cookies: Vec::new(),
            bitrate: DEFAULT_BITRATE_KBPS,
        }
    }
}

impl AppConfig {
    /// Loads the configuration, falling back to defaults when the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file exists but cannot be read and
    /// [`ConfigError::Parse`] when it is not valid JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            path = %path.display(),
            cookies = config.cookies.len(),
            br = config.bitrate,
            "config loaded"
        );
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "config saved");
        Ok(())
    }

    /// Session built from the persisted cookies.
    #[must_use]
    pub fn session(&self) -> ProviderSession {
        ProviderSession::new(self.cookies.clone())
    }

    /// Stores the session cookies for the next save.
    pub fn set_session(&mut self, session: ProviderSession) {
        self.cookies = session.into_cookies();
    }

    /// Preferred bitrate.
    #[must_use]
    pub fn bitrate(&self) -> Bitrate {
        Bitrate::from_kbps(self.bitrate)
    }
}

/// Settings consumed by the download engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Global download root every relative save path is rebased onto.
    pub download_dir: PathBuf,
    /// Re-download files that already exist.
    pub overwrite: bool,
    /// Maximum number of concurrent downloads.
    pub concurrency: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            overwrite: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl DownloadSettings {
    /// Creates settings, replacing an out-of-range concurrency with the default.
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>, overwrite: bool, concurrency: usize) -> Self {
        let concurrency = if (MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            concurrency
        } else {
            warn!(
                concurrency,
                fallback = DEFAULT_CONCURRENCY,
                "invalid concurrency, expected {MIN_CONCURRENCY}..={MAX_CONCURRENCY}"
            );
            DEFAULT_CONCURRENCY
        };
        Self {
            download_dir: download_dir.into(),
            overwrite,
            concurrency,
        }
    }
}
