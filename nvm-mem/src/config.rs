//! Configuration for region mapping and cache control.
//!
//! Configs load from TOML or from `PREFIX_KEY` environment variables layered
//! over the defaults.
//!
//! ```rust
//! use nvm_mem::config::{Config, MemoryConfig, TeardownPolicy};
//!
//! let config = MemoryConfig::from_toml(r#"
//!     directory = "/mnt/pmem0/nvm"
//!     teardown = "keep"
//!     flush = "writeback"
//! "#)?;
//! assert_eq!(config.teardown, TeardownPolicy::Keep);
//! assert_eq!(config.name_prefix, "Data_");
//! # Ok::<(), nvm_mem::MemError>(())
//! ```

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::{FlushKind, PrefetchLocality};
use crate::error::{ConfigError, MemResult};
use crate::naming::DEFAULT_NAME_PREFIX;

/// Conventional prefix for [`MemoryConfig::from_env`].
pub const ENV_PREFIX: &str = "NVM_MEM";

/// Shared behaviour of loadable configs.
pub trait Config: Serialize + DeserializeOwned {
    /// Check that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad field.
    fn validate(&self) -> Result<(), ConfigError>;

    fn defaults() -> Self;

    /// Parse and validate a TOML document. Missing keys take their default.
    fn from_toml(toml: &str) -> MemResult<Self>
    where
        Self: Sized,
    {
        let config: Self = toml::from_str(toml)
            .map_err(|e| ConfigError::Parse(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    fn load(path: &Path) -> MemResult<Self>
    where
        Self: Sized,
    {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    fn to_toml(&self) -> MemResult<String> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(format!("TOML serialize error: {e}")))?;
        Ok(text)
    }
}

/// What happens to a region's backing file when the region is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownPolicy {
    /// Remove the file; the region is scratch memory for this run.
    #[default]
    Delete,
    /// Leave the file in place so it can be mapped again later.
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory used by [`RegionMapper::map_unique`](crate::RegionMapper::map_unique).
    pub directory: PathBuf,
    /// Prefix of generated region file names.
    pub name_prefix: String,
    /// Pre-fault mappings at creation.
    pub populate: bool,
    pub teardown: TeardownPolicy,
    pub flush: FlushKind,
    pub prefetch_locality: PrefetchLocality,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./nvm_data"),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            populate: true,
            teardown: TeardownPolicy::Delete,
            flush: FlushKind::Auto,
            prefetch_locality: PrefetchLocality::T0,
        }
    }
}

impl Config for MemoryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("directory must not be empty".into()));
        }
        if self.name_prefix.is_empty() {
            return Err(ConfigError::Invalid("name_prefix must not be empty".into()));
        }
        if self.name_prefix.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "name_prefix {:?} must not contain a path separator",
                self.name_prefix
            )));
        }
        Ok(())
    }

    fn defaults() -> Self {
        Self::default()
    }
}

impl MemoryConfig {
    /// Defaults overridden by `{prefix}_DIRECTORY`, `{prefix}_NAME_PREFIX`,
    /// `{prefix}_POPULATE`, `{prefix}_TEARDOWN`, `{prefix}_FLUSH` and
    /// `{prefix}_PREFETCH_LOCALITY`.
    pub fn from_env(prefix: &str) -> MemResult<Self> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> MemResult<Self> {
        let var = |name: &str| lookup(&format!("{prefix}_{name}"));
        let mut config = Self::default();

        if let Some(dir) = var("DIRECTORY") {
            config.directory = PathBuf::from(dir);
        }
        if let Some(name_prefix) = var("NAME_PREFIX") {
            config.name_prefix = name_prefix;
        }
        if let Some(populate) = var("POPULATE") {
            config.populate = parse_bool(&populate).ok_or_else(|| {
                ConfigError::Parse(format!("{prefix}_POPULATE: expected a boolean, got {populate:?}"))
            })?;
        }
        if let Some(teardown) = var("TEARDOWN") {
            config.teardown = parse_enum(prefix, "TEARDOWN", teardown)?;
        }
        if let Some(flush) = var("FLUSH") {
            config.flush = parse_enum(prefix, "FLUSH", flush)?;
        }
        if let Some(locality) = var("PREFETCH_LOCALITY") {
            config.prefetch_locality = parse_enum(prefix, "PREFETCH_LOCALITY", locality)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_enum<T: DeserializeOwned>(prefix: &str, key: &str, value: String) -> Result<T, ConfigError> {
    toml::Value::String(value.trim().to_ascii_lowercase())
        .try_into()
        .map_err(|e| ConfigError::Parse(format!("{prefix}_{key}: {e}")))
}
