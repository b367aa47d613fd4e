use std::io;
use std::path::PathBuf;

use crate::ir::Type;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // -- Distance table
    /// No distance file was configured for the pass.
    #[error("no distance file specified")]
    DistanceFileUnset,

    #[error("failed to read distance file {path}: {source}")]
    DistanceFileUnreadable { path: PathBuf, source: io::Error },

    // -- Counters
    /// A global with a counter's name already exists but has an incompatible type.
    #[error("global @{name} already exists with type {found}, expected i64")]
    CounterTypeMismatch { name: String, found: Type },

    // -- Driver
    #[error("failed to read unit {path}: {source}")]
    UnitUnreadable { path: PathBuf, source: io::Error },

    #[error("failed to parse unit {path}: {source}")]
    UnitMalformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize unit {path}: {source}")]
    UnitUnserializable {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write unit {path}: {source}")]
    UnitUnwritable { path: PathBuf, source: io::Error },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("failed to parse configuration: {0}")]
    ConfigMalformed(#[from] toml::de::Error),

    #[error("failed to read configuration {path}: {source}")]
    ConfigUnreadable { path: PathBuf, source: io::Error },
}
