//! Configuration for the manifest pipeline

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ScanError;

/// Files below this size are never treated as media (1 MiB)
pub const DEFAULT_MIN_MEDIA_SIZE: u64 = 1024 * 1024;

/// Default timeout for a single metadata lookup
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Persist the manifest after every newly resolved record
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 1;

/// Default title-lookup endpoint
pub const DEFAULT_API_URL: &str = "https://www.omdbapi.com/";

/// Manifest file name used when no explicit path is configured
pub const DEFAULT_MANIFEST_NAME: &str = "manifest.json";

/// Video extensions accepted by default (lowercase, without dot)
pub const MEDIA_EXTENSIONS: [&str; 3] = ["avi", "mp4", "mkv"];

/// Configuration for a library refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root directory holding the media files
    pub media_path: PathBuf,

    /// Manifest location; `<media_path>/manifest.json` when unset
    pub manifest_path: Option<PathBuf>,

    /// API key for the title-lookup service
    #[serde(skip_serializing, default)]
    pub api_key: String,

    /// Base URL of the title-lookup service
    pub api_url: String,

    /// File extensions to include (lowercase, without dot)
    pub extensions: HashSet<String>,

    /// Minimum file size in bytes for a file to count as media
    pub min_media_size: u64,

    /// Timeout for one metadata request, in seconds
    pub request_timeout_secs: u64,

    /// Number of newly resolved records between manifest writes
    pub checkpoint_interval: u64,

    /// Emit JSON progress lines on stderr
    pub show_progress: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            media_path: PathBuf::new(),
            manifest_path: None,
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            extensions: Self::default_extensions(),
            min_media_size: DEFAULT_MIN_MEDIA_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            show_progress: false,
        }
    }
}

impl LibraryConfig {
    /// Create a config for the given media directory
    pub fn new(media_path: impl Into<PathBuf>) -> Self {
        Self {
            media_path: media_path.into(),
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> LibraryConfigBuilder {
        LibraryConfigBuilder::new()
    }

    /// Get the default video extensions
    pub fn default_extensions() -> HashSet<String> {
        MEDIA_EXTENSIONS.iter().map(|s| s.to_string()).collect()
    }

    /// Resolved manifest location
    pub fn effective_manifest_path(&self) -> PathBuf {
        self.manifest_path
            .clone()
            .unwrap_or_else(|| self.media_path.join(DEFAULT_MANIFEST_NAME))
    }

    /// Media root as given
    pub fn media_root(&self) -> &Path {
        &self.media_path
    }

    /// Reject configurations that cannot run a refresh
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.media_path.as_os_str().is_empty() {
            return Err(ScanError::invalid_config("missing media path (MEDIA_PATH)"));
        }
        if self.api_key.trim().is_empty() {
            return Err(ScanError::invalid_config("missing api key (OMDB_API_KEY)"));
        }
        if self.api_url.trim().is_empty() {
            return Err(ScanError::invalid_config("missing metadata api url"));
        }
        if self.extensions.is_empty() {
            return Err(ScanError::invalid_config("extension allow-list is empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ScanError::invalid_config("request timeout must be positive"));
        }
        if self.checkpoint_interval == 0 {
            return Err(ScanError::invalid_config(
                "checkpoint interval must be positive",
            ));
        }
        Ok(())
    }
}

/// Builder for LibraryConfig
#[derive(Debug, Default)]
pub struct LibraryConfigBuilder {
    config: LibraryConfig,
}

impl LibraryConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the media root
    pub fn media_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.media_path = path.into();
        self
    }

    /// Set an explicit manifest location
    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.manifest_path = Some(path.into());
        self
    }

    /// Set the API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Point the client at another endpoint
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the extensions whitelist
    pub fn extensions(mut self, extensions: HashSet<String>) -> Self {
        self.config.extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Set the minimum media size
    pub fn min_media_size(mut self, bytes: u64) -> Self {
        self.config.min_media_size = bytes;
        self
    }

    /// Set the request timeout
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Set the checkpoint interval
    pub fn checkpoint_interval(mut self, interval: u64) -> Self {
        self.config.checkpoint_interval = interval;
        self
    }

    /// Enable or disable progress output
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    /// Build the config
    pub fn build(self) -> LibraryConfig {
        self.config
    }
}
