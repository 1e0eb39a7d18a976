//! Filesystem walker producing one listing per directory

use crate::error::IsoenvError;
use crate::exclude::ExclusionSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

/// One visited directory: its path and its (already filtered) immediate children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListing {
    /// Directory path, built by joining names onto the walk root
    pub path: PathBuf,
    /// Subdirectory names, sorted
    pub dirs: Vec<OsString>,
    /// File names, sorted (anything that is not a directory)
    pub files: Vec<OsString>,
}

impl DirListing {
    /// Full paths of the files in this listing.
    pub fn file_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(|name| self.path.join(name))
    }
}

/// Deferred descent into a reserved directory name
///
/// A subdirectory named `marker` is descended into only after the subtrees of
/// all its siblings are finished. Inside a `marker` directory only the child
/// named `selected` is descended into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerDescent {
    pub marker: String,
    pub selected: String,
}

/// Filesystem walker configuration
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Whether to descend into symbolic links to directories (default: false)
    pub follow_symlinks: bool,
    /// Names hidden at every level of the walk
    pub exclusions: ExclusionSet,
    /// Optional two-phase descent for a reserved directory name
    pub marker: Option<MarkerDescent>,
}

/// Filesystem walker
pub struct Walker {
    root: PathBuf,
    config: WalkerConfig,
}

impl Walker {
    /// Create a new walker for the given root path
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            config: WalkerConfig::default(),
        }
    }

    /// Create a walker with custom configuration
    pub fn with_config(root: PathBuf, config: WalkerConfig) -> Self {
        Self { root, config }
    }

    /// Start a fresh depth-first, pre-order walk.
    ///
    /// Nothing is read until the first item is requested.
    pub fn walk(&self) -> Walk {
        Walk {
            config: self.config.clone(),
            pending: vec![Pending {
                dir: self.root.clone(),
                inside_marker: false,
            }],
        }
    }
}

/// Lazy walk over a directory tree
///
/// Yields `Err` at most once; the walk is finished after an error.
pub struct Walk {
    config: WalkerConfig,
    pending: Vec<Pending>,
}

/// A queued directory and whether it was entered as a marker directory
struct Pending {
    dir: PathBuf,
    inside_marker: bool,
}

impl Walk {
    fn read_listing(&self, dir: &Path) -> Result<DirListing, IsoenvError> {
        let mut dirs = Vec::new();
        let mut files = Vec::new();

        let entries = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();

        for entry in entries {
            let entry = entry.map_err(|e| walk_error(dir, e))?;
            let name = entry.file_name().to_os_string();

            let is_dir = if entry.path_is_symlink() && !self.config.follow_symlinks {
                // Links to directories are listed as directories but never entered.
                entry.path().is_dir()
            } else {
                entry.file_type().is_dir()
            };

            if is_dir {
                dirs.push(name);
            } else {
                files.push(name);
            }
        }

        self.config.exclusions.apply(&mut dirs, &mut files);

        Ok(DirListing {
            path: dir.to_path_buf(),
            dirs,
            files,
        })
    }

    /// Queue the children of `listing` so that ordinary subdirectories are
    /// visited in name order and the marker directory comes last.
    fn schedule(&mut self, listing: &DirListing, inside_marker: bool) {
        let mut ordinary = Vec::new();
        let mut deferred = None;

        for name in &listing.dirs {
            let child = listing.path.join(name);
            if !self.config.follow_symlinks && is_symlink(&child) {
                continue;
            }
            match &self.config.marker {
                Some(descent) if inside_marker => {
                    if name == descent.selected.as_str() {
                        ordinary.push(child);
                    } else {
                        trace!(path = %child.display(), "Skipping unselected marker child");
                    }
                }
                Some(descent) if name == descent.marker.as_str() => deferred = Some(child),
                _ => ordinary.push(child),
            }
        }

        // Stack order: last pushed is visited first.
        if let Some(dir) = deferred {
            self.pending.push(Pending {
                dir,
                inside_marker: true,
            });
        }
        self.pending.extend(ordinary.into_iter().rev().map(|dir| Pending {
            dir,
            inside_marker: false,
        }));
    }
}

impl Iterator for Walk {
    type Item = Result<DirListing, IsoenvError>;

    fn next(&mut self) -> Option<Self::Item> {
        let Pending { dir, inside_marker } = self.pending.pop()?;
        match self.read_listing(&dir) {
            Ok(listing) => {
                self.schedule(&listing, inside_marker);
                Some(Ok(listing))
            }
            Err(e) => {
                self.pending.clear();
                Some(Err(e))
            }
        }
    }
}

/// Walk `root` hiding every name in `exclusions`.
pub fn walk_with_exclusions(root: &Path, exclusions: &ExclusionSet) -> Walk {
    let config = WalkerConfig {
        exclusions: exclusions.clone(),
        ..WalkerConfig::default()
    };
    Walker::with_config(root.to_path_buf(), config).walk()
}

/// Every non-excluded file beneath `root`, in walk order.
pub fn list_directory(root: &Path, exclusions: &ExclusionSet) -> Result<Vec<PathBuf>, IsoenvError> {
    let mut files = Vec::new();
    for listing in walk_with_exclusions(root, exclusions) {
        let listing = listing?;
        files.extend(listing.file_paths());
    }
    Ok(files)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

fn walk_error(dir: &Path, err: walkdir::Error) -> IsoenvError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, message));
    IsoenvError::Walk { path, source }
}
