//! Error types for the memory layer.
//!
//! Resource-acquisition failures are reported with the path (and size where
//! relevant) so the caller can retry with a different location instead of
//! aborting.

use std::io;
use std::path::PathBuf;

use nvm_osal::OsalError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type MemResult<T> = Result<T, MemError>;

/// Errors produced by region mapping, naming and configuration.
#[derive(Debug, Error)]
pub enum MemError {
    /// The backing directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing file could not be created or opened.
    #[error("failed to open {}: {source}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing file could not be resized to the requested length.
    #[error("failed to resize {} to {size} bytes: {source}", path.display())]
    ResizeFile {
        path: PathBuf,
        size: u64,
        #[source]
        source: io::Error,
    },

    /// The backing file could not be mapped.
    #[error("failed to map {size} bytes of {}: {source}", path.display())]
    Map {
        path: PathBuf,
        size: usize,
        #[source]
        source: OsalError,
    },

    /// `msync` over the region failed.
    #[error("failed to sync {}: {source}", path.display())]
    Sync {
        path: PathBuf,
        #[source]
        source: OsalError,
    },

    /// The requested size cannot hold a single aligned cache line.
    #[error("region of {requested} bytes is smaller than the minimum of {minimum} bytes")]
    RegionTooSmall { requested: usize, minimum: usize },

    /// A region name was empty or contained a path separator.
    #[error("invalid region name {0:?}")]
    InvalidName(String),

    /// A region-relative range does not fit inside the aligned region.
    #[error("range {offset}+{len} is out of bounds for a region of {size} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// The file name counter cannot produce another unique value.
    #[error("file name counter exhausted")]
    NamesExhausted,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),

    #[error("config serialize error: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
