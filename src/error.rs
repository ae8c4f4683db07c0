//! Error types for the blackhole generator.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::tree::Node;

/// Main error type for blackhole operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("fetch error: {0}")]
    Fetch(#[from] crate::fetch::FetchError),

    #[error("file error for {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid removal pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no blacklist configuration has been detected")]
    NoBlacklist,

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("source name cannot be empty in {node}")]
    EmptySourceName { node: Node },

    #[error("duplicate source name {name:?} in {node}")]
    DuplicateSource { node: Node, name: String },

    #[error("source {name:?} in {node} has neither a url nor a file")]
    MissingOrigin { node: Node, name: String },

    #[error("source {name:?} in {node} has both a url and a file")]
    ConflictingOrigin { node: Node, name: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
