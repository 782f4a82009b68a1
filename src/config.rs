//! Layered application configuration.
//!
//! Settings are resolved, lowest precedence first, from:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config PATH`, else `<config dir>/dupescan/config.toml`)
//! 3. `DUPESCAN_*` environment variables
//! 4. Command-line flags (applied by the caller)
//!
//! ```toml
//! io_threads = 8
//! skip_hidden = true
//! ignore_patterns = ["target/", "*.tmp"]
//! min_size = 1024
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::FinderConfig;
use crate::scanner::{WalkerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PARALLEL_THRESHOLD, MAX_CHUNK_SIZE};

/// Prefix for environment overrides, e.g. `DUPESCAN_IO_THREADS=16`.
pub const ENV_PREFIX: &str = "DUPESCAN_";

/// Errors from loading, validating or saving configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A provider produced a value that could not be deserialized.
    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// The merged configuration is inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// No home directory to derive the default config path from.
    #[error("Could not determine the configuration directory")]
    NoConfigDir,

    /// Writing the config file failed.
    #[error("Failed to write config file {path}: {source}")]
    Write {
        /// Target path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be rendered as TOML.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Resolved scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker threads for traversal and hashing.
    pub io_threads: usize,
    /// Fingerprint chunk size in bytes.
    pub chunk_size: usize,
    /// Files at least this large hash chunks in parallel; unset disables it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_threshold: Option<u64>,
    /// Descend into symlinked directories and hash symlinked files.
    pub follow_symlinks: bool,
    /// Skip entries whose name starts with a dot.
    pub skip_hidden: bool,
    /// Gitignore-style patterns excluded from the scan.
    pub ignore_patterns: Vec<String>,
    /// Smallest file size considered, in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    /// Largest file size considered, in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    /// Stop at the first path error.
    pub strict: bool,
    /// Include single-file groups in reports.
    pub show_all: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            io_threads: 4,
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel_threshold: Some(DEFAULT_PARALLEL_THRESHOLD),
            follow_symlinks: false,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            min_size: None,
            max_size: None,
            strict: false,
            show_all: false,
        }
    }
}

impl Config {
    /// Load configuration from defaults, a TOML file and the environment.
    ///
    /// With `explicit_path` the file must exist. Without it the default
    /// platform path is used when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit file is missing, a value cannot be
    /// parsed, or the result fails [`validate`](Self::validate).
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match explicit_path {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().ok().filter(|p| p.is_file()),
        };
        if let Some(ref path) = file {
            log::debug!("Loading configuration from {}", path.display());
        }
        Self::from_figment(Self::figment(file.as_deref()))
    }

    /// Extract and validate a configuration from any figment.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// The figment every load goes through.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Platform-specific default config file location.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] when no home directory is known.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("", "", "dupescan").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_threads == 0 {
            return Err(ConfigError::Invalid("io_threads must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "chunk_size ({}) exceeds the maximum of {MAX_CHUNK_SIZE} bytes",
                self.chunk_size
            )));
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "min_size ({min}) is larger than max_size ({max})"
                )));
            }
        }
        Ok(())
    }

    /// Write this configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)
    }

    /// Traversal options for the walker.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            min_size: self.min_size,
            max_size: self.max_size,
            ignore_patterns: self.ignore_patterns.clone(),
        }
    }

    /// Finder options; shutdown flag and progress are attached by the caller.
    #[must_use]
    pub fn finder_config(&self) -> FinderConfig {
        FinderConfig::default()
            .with_io_threads(self.io_threads)
            .with_chunk_size(self.chunk_size)
            .with_parallel_threshold(self.parallel_threshold)
            .with_strict(self.strict)
            .with_walker_config(self.walker_config())
    }
}
