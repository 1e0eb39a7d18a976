//! Scoped compilation sessions.
//!
//! A session compiles the sources into a directory that lives exactly as long
//! as the [`CompiledTree`] handle. The directory is removed when the handle is
//! dropped, including during unwinding, or explicitly through
//! [`CompiledTree::close`], which reports removal failures.

use crate::compile::{compile_directories, CompileOutcome, CompileRequest};
use crate::error::IsoenvError;
use crate::exclude::ExclusionSet;
use crate::tree::path::canonicalize_path;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Prefix for temporary session directories.
const TEMP_PREFIX: &str = "isoenv-";

/// Settings for a transient compilation
#[derive(Debug, Clone)]
pub struct Session {
    sources: Vec<PathBuf>,
    environment: String,
    destination: Option<PathBuf>,
    exclusions: ExclusionSet,
}

impl Session {
    pub fn new(sources: Vec<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            sources,
            environment: environment.into(),
            destination: None,
            exclusions: ExclusionSet::default(),
        }
    }

    /// Compile into `dir` instead of a fresh temporary directory.
    ///
    /// The directory is still deleted when the session ends.
    pub fn with_destination(mut self, dir: Option<PathBuf>) -> Self {
        self.destination = dir;
        self
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Acquire the directory and run a live compile into it.
    pub fn compile(&self) -> Result<CompiledTree, IsoenvError> {
        let guard = self.acquire()?;

        let request = CompileRequest::new(
            self.sources.clone(),
            guard.path.clone(),
            self.environment.as_str(),
        )
        .with_exclusions(self.exclusions.clone());

        // On failure `guard` drops here and removes the directory.
        let outcome = compile_directories(&request)?;

        Ok(CompiledTree { guard, outcome })
    }

    /// Compile, hand the directory to `work`, and remove it afterwards.
    pub fn run<T, F>(&self, work: F) -> Result<T, IsoenvError>
    where
        F: FnOnce(&Path) -> Result<T, IsoenvError>,
    {
        let tree = self.compile()?;
        let value = work(tree.path())?;
        tree.close()?;
        Ok(value)
    }

    fn acquire(&self) -> Result<DirGuard, IsoenvError> {
        match &self.destination {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|source| IsoenvError::Session {
                    path: dir.clone(),
                    source,
                })?;
                let path = canonicalize_path(dir)?;
                debug!(path = %path.display(), "Using supplied session directory");
                Ok(DirGuard {
                    path,
                    temp: None,
                    removed: false,
                })
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix(TEMP_PREFIX)
                    .tempdir()
                    .map_err(|source| IsoenvError::Session {
                        path: std::env::temp_dir(),
                        source,
                    })?;
                let path = canonicalize_path(temp.path())?;
                debug!(path = %path.display(), "Created temporary session directory");
                Ok(DirGuard {
                    path,
                    temp: Some(temp),
                    removed: false,
                })
            }
        }
    }
}

/// A materialized tree that is deleted when dropped
#[derive(Debug)]
pub struct CompiledTree {
    guard: DirGuard,
    outcome: CompileOutcome,
}

impl CompiledTree {
    /// Absolute path of the materialized directory.
    pub fn path(&self) -> &Path {
        &self.guard.path
    }

    pub fn outcome(&self) -> &CompileOutcome {
        &self.outcome
    }

    /// Remove the directory now, surfacing any failure.
    pub fn close(mut self) -> Result<(), IsoenvError> {
        self.guard.remove()
    }
}

#[derive(Debug)]
struct DirGuard {
    path: PathBuf,
    temp: Option<TempDir>,
    removed: bool,
}

impl DirGuard {
    fn remove(&mut self) -> Result<(), IsoenvError> {
        if self.removed {
            return Ok(());
        }
        self.removed = true;

        let result = match self.temp.take() {
            Some(temp) => temp.close(),
            None if self.path.exists() => fs::remove_dir_all(&self.path),
            None => Ok(()),
        };
        debug!(path = %self.path.display(), "Removed session directory");
        result.map_err(|source| IsoenvError::Session {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("Failed to remove session directory: {}", e);
        }
    }
}
