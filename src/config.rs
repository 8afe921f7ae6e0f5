//! Application configuration management.
//!
//! Configuration is layered with figment, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A config file: `--config <FILE>` or `config.toml` in the platform config
//!    directory. TOML, JSON and YAML are recognized by extension.
//! 3. Environment variables prefixed with `RUSTQUARANTINE_`; `__` separates
//!    nested keys (`RUSTQUARANTINE_DUPLICATES__MIN_SIZE=4096`).
//! 4. CLI flags, applied by the caller after loading.
//!
//! The merged result is validated once and then passed around immutably.

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Commands, TraversalArgs};
use crate::scanner::WalkerConfig;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "RUSTQUARANTINE_";

/// Largest accepted `schedule_interval_minutes` (one year).
pub const MAX_SCHEDULE_INTERVAL_MINUTES: u64 = 366 * 24 * 60;

/// Duplicate detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatesConfig {
    /// Run duplicate detection as part of `scan`.
    pub enabled: bool,
    /// Smallest file size considered, in bytes.
    pub min_size: u64,
    /// Where duplicate batches go. `None` means `<quarantine_base>/duplicates`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates_dir: Option<PathBuf>,
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_size: 1,
            duplicates_dir: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prune hidden files and directories from scans.
    pub ignore_hidden: bool,
    /// Mirror the scanned layout inside batches instead of flattening.
    pub preserve_structure: bool,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Directory that receives quarantine batches.
    pub quarantine_base: PathBuf,
    /// Minutes between `watch` ticks.
    pub schedule_interval_minutes: u64,
    /// Duplicate detection settings.
    pub duplicates: DuplicatesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_hidden: true,
            preserve_structure: false,
            recursive: true,
            quarantine_base: PathBuf::from("."),
            schedule_interval_minutes: 60,
            duplicates: DuplicatesConfig::default(),
        }
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// An explicit `config_file` must exist; the default file is optional.
    ///
    /// # Errors
    ///
    /// A missing explicit file, a file or environment value that does not
    /// parse, or a value that fails [`Config::validate`].
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_file {
            if !path.is_file() {
                bail!("config file not found: {}", path.display());
            }
        }
        let file = config_file
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path);
        if let Some(ref path) = file {
            log::debug!("Loading configuration from {}", path.display());
        }

        let figment = Self::figment(file.as_deref()).merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    /// Defaults merged with `file`, without the environment layer.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            None => figment,
            Some(path) => match path.extension().and_then(|e| e.to_str()) {
                Some("json") => figment.merge(Json::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                _ => figment.merge(Toml::file(path)),
            },
        }
    }

    /// Extract and validate a configuration.
    ///
    /// # Errors
    ///
    /// Extraction failures (which name the offending key) and validation errors.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check value constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// The first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.schedule_interval_minutes == 0 {
            bail!("invalid configuration: schedule_interval_minutes must be greater than 0");
        }
        if self.schedule_interval_minutes > MAX_SCHEDULE_INTERVAL_MINUTES {
            bail!(
                "invalid configuration: schedule_interval_minutes must be at most {}",
                MAX_SCHEDULE_INTERVAL_MINUTES
            );
        }
        if self.quarantine_base.as_os_str().is_empty() {
            bail!("invalid configuration: quarantine_base must not be empty");
        }
        Ok(())
    }

    /// Time between `watch` ticks.
    #[must_use]
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_minutes.saturating_mul(60))
    }

    /// Apply the flags of `command` that override configuration keys.
    ///
    /// Only flags that were given change anything; call [`Config::validate`]
    /// afterwards.
    pub fn merge_command(&mut self, command: &Commands) {
        match command {
            Commands::Scan(args) => {
                self.merge_quarantine_base(args.quarantine_base.as_deref());
                self.merge_traversal(&args.traversal);
            }
            Commands::Restore(args) => self.merge_quarantine_base(args.quarantine_base.as_deref()),
            Commands::List(args) => self.merge_quarantine_base(args.quarantine_base.as_deref()),
            Commands::Dupes(args) => {
                self.merge_quarantine_base(args.quarantine_base.as_deref());
                self.merge_traversal(&args.traversal);
                if let Some(min_size) = args.min_size {
                    self.duplicates.min_size = min_size;
                }
                if let Some(ref dir) = args.duplicates_dir {
                    self.duplicates.duplicates_dir = Some(dir.clone());
                }
            }
            Commands::Watch(args) => {
                self.merge_quarantine_base(args.quarantine_base.as_deref());
                self.merge_traversal(&args.traversal);
                if let Some(minutes) = args.interval_minutes {
                    self.schedule_interval_minutes = minutes;
                }
            }
            Commands::Config => {}
        }
    }

    fn merge_quarantine_base(&mut self, base: Option<&Path>) {
        if let Some(base) = base {
            self.quarantine_base = base.to_path_buf();
        }
    }

    fn merge_traversal(&mut self, args: &TraversalArgs) {
        if args.include_hidden {
            self.ignore_hidden = false;
        }
        if args.no_recursive {
            self.recursive = false;
        }
        if args.preserve_structure {
            self.preserve_structure = true;
        }
    }

    /// Traversal settings for scans.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::new(self.ignore_hidden, self.recursive)
    }

    /// Directory duplicate batches go to.
    #[must_use]
    pub fn duplicates_dir(&self) -> PathBuf {
        self.duplicates
            .duplicates_dir
            .clone()
            .unwrap_or_else(|| self.quarantine_base.join("duplicates"))
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Serialization failures.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration")
    }

    /// Get the default platform-specific configuration path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "rustquarantine", "rustquarantine")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
