//! Error types for layered tree compilation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by resolution, materialization, and the command runner
#[derive(Debug, Error)]
pub enum IsoenvError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Failed to read directory {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove stale entry {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for command: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Failed to resolve path {}: {source}", path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session directory error for {}: {source}", path.display())]
    Session {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IsoenvError {
    /// Process exit status for a failure reaching the binaries.
    pub fn exit_code(&self) -> i32 {
        match self {
            IsoenvError::Config(_) => 2,
            _ => 1,
        }
    }
}

impl From<config::ConfigError> for IsoenvError {
    fn from(err: config::ConfigError) -> Self {
        IsoenvError::Config(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, IsoenvError>;
