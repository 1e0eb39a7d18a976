//! Materializer: turns a destination map into files on disk.
//!
//! A live run clears the destination first, so after it finishes the
//! destination holds exactly the mapped files plus the manifest. Excluded
//! names are left alone during the clear, using the same exclusion set that
//! drove resolution. A dry run reads but never writes.

use crate::error::IsoenvError;
use crate::exclude::ExclusionSet;
use crate::overlay::DestinationMap;
use crate::tree::path::depth;
use crate::tree::walker::walk_with_exclusions;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, FileTimes};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Directory (relative to the destination) holding the manifest.
pub const MANIFEST_DIR: &str = "etc";

/// Manifest file name.
pub const MANIFEST_FILE: &str = "mapped_files.json";

/// Counts of what a materialization did (or would do, in a dry run)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub removed_files: usize,
    pub removed_dirs: usize,
    pub copied_files: usize,
}

/// Writes a [`DestinationMap`] into a destination directory
pub struct Materializer {
    dest: PathBuf,
    exclusions: ExclusionSet,
    dry_run: bool,
}

impl Materializer {
    pub fn new(dest: PathBuf) -> Self {
        Self {
            dest,
            exclusions: ExclusionSet::default(),
            dry_run: false,
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Path of the manifest inside the destination.
    pub fn manifest_path(&self) -> PathBuf {
        self.dest.join(MANIFEST_DIR).join(MANIFEST_FILE)
    }

    /// Clear stale content, copy every mapped file, then write the manifest.
    #[instrument(skip_all, fields(dest = %self.dest.display(), dry_run = self.dry_run))]
    pub fn materialize(&self, map: &DestinationMap) -> Result<MaterializeSummary, IsoenvError> {
        let mut summary = self.clear()?;
        summary.copied_files = self.copy_files(map)?;
        self.write_manifest(map)?;

        info!(
            removed_files = summary.removed_files,
            removed_dirs = summary.removed_dirs,
            copied_files = summary.copied_files,
            "Materialized destination"
        );
        Ok(summary)
    }

    /// Delete every non-excluded file in the destination, then every directory
    /// left empty, deepest first. A missing destination counts as empty.
    pub fn clear(&self) -> Result<MaterializeSummary, IsoenvError> {
        let mut summary = MaterializeSummary::default();
        if !self.dest.exists() {
            debug!("Destination does not exist yet; nothing to clear");
            return Ok(summary);
        }

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for listing in walk_with_exclusions(&self.dest, &self.exclusions) {
            let listing = listing?;
            files.extend(listing.file_paths());
            dirs.extend(listing.dirs.iter().map(|name| listing.path.join(name)));
        }

        for file in &files {
            if self.dry_run {
                debug!(path = %file.display(), "Would remove stale file");
            } else {
                debug!(path = %file.display(), "Removing stale file");
                fs::remove_file(file).map_err(|source| IsoenvError::Cleanup {
                    path: file.clone(),
                    source,
                })?;
            }
            summary.removed_files += 1;
        }

        // Paths a live run would have deleted by now; a dry run consults this
        // instead of the filesystem.
        let mut gone: HashSet<PathBuf> = files.iter().cloned().collect();

        dirs.sort_by_key(|dir| std::cmp::Reverse(depth(dir)));
        for dir in &dirs {
            let removed = if self.dry_run {
                let removable = only_contains(dir, &gone)?;
                if removable {
                    debug!(path = %dir.display(), "Would remove directory");
                    gone.insert(dir.clone());
                }
                removable
            } else {
                remove_empty_dir(dir)?
            };

            if removed {
                summary.removed_dirs += 1;
            } else {
                debug!(path = %dir.display(), "Keeping directory with excluded content");
            }
        }

        Ok(summary)
    }

    /// Copy each source to its destination, creating parents as needed.
    pub fn copy_files(&self, map: &DestinationMap) -> Result<usize, IsoenvError> {
        let mut copied = 0;
        for (dest, source) in map {
            if self.dry_run {
                info!("Would copy {} to {}", source.display(), dest.display());
            } else {
                debug!("Copying {} to {}", source.display(), dest.display());
                copy_preserving_metadata(source, dest)?;
            }
            copied += 1;
        }
        Ok(copied)
    }

    /// Persist `map` as key-sorted JSON with four-space indentation.
    pub fn write_manifest(&self, map: &DestinationMap) -> Result<(), IsoenvError> {
        let path = self.manifest_path();
        let manifest_error = |source| IsoenvError::Manifest {
            path: path.clone(),
            source,
        };
        let rendered = render_manifest(map)
            .map_err(std::io::Error::from)
            .map_err(manifest_error)?;

        if self.dry_run {
            info!(path = %path.display(), entries = map.len(), "Would write manifest");
            debug!("Manifest content:\n{}", String::from_utf8_lossy(&rendered));
            return Ok(());
        }

        if let Some(dir) = path.parent() {
            create_dir_tolerant(dir)?;
        }
        let file = fs::File::create(&path).map_err(manifest_error)?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&rendered)
            .and_then(|_| writer.flush())
            .map_err(manifest_error)?;

        debug!(path = %path.display(), "Wrote manifest");
        Ok(())
    }
}

/// Serialize the manifest body.
pub fn render_manifest(map: &DestinationMap) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    map.to_manifest().serialize(&mut serializer)?;
    Ok(out)
}

/// Create `dir` and its parents; an existing directory is not an error.
fn create_dir_tolerant(dir: &Path) -> Result<(), IsoenvError> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(source) => Err(IsoenvError::CreateDir {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// Whether every entry of `dir` is already in `gone`.
fn only_contains(dir: &Path, gone: &HashSet<PathBuf>) -> Result<bool, IsoenvError> {
    let cleanup = |source| IsoenvError::Cleanup {
        path: dir.to_path_buf(),
        source,
    };

    let meta = fs::symlink_metadata(dir).map_err(cleanup)?;
    if meta.file_type().is_symlink() {
        return Ok(true);
    }
    for entry in fs::read_dir(dir).map_err(cleanup)? {
        let entry = entry.map_err(cleanup)?;
        if !gone.contains(&dir.join(entry.file_name())) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Returns false when the directory still has (excluded) content.
fn remove_empty_dir(dir: &Path) -> Result<bool, IsoenvError> {
    let cleanup = |source| IsoenvError::Cleanup {
        path: dir.to_path_buf(),
        source,
    };

    let meta = fs::symlink_metadata(dir).map_err(cleanup)?;
    if meta.file_type().is_symlink() {
        fs::remove_file(dir).map_err(cleanup)?;
        return Ok(true);
    }

    let is_empty = fs::read_dir(dir).map_err(cleanup)?.next().is_none();
    if !is_empty {
        return Ok(false);
    }
    fs::remove_dir(dir).map_err(cleanup)?;
    Ok(true)
}

/// Copy contents and permissions, then carry over access and modification times.
fn copy_preserving_metadata(source: &Path, dest: &Path) -> Result<(), IsoenvError> {
    if let Some(parent) = dest.parent() {
        create_dir_tolerant(parent)?;
    }

    let copy_error = |source_err| IsoenvError::Copy {
        from: source.to_path_buf(),
        to: dest.to_path_buf(),
        source: source_err,
    };

    fs::copy(source, dest).map_err(copy_error)?;

    let meta = fs::metadata(source).map_err(copy_error)?;
    let mut times = FileTimes::new();
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    fs::File::open(dest)
        .and_then(|file| file.set_times(times))
        .map_err(copy_error)?;

    Ok(())
}
