//! Overlay resolution: which source file wins for every destination path.
//!
//! Source roots are applied in order, each later root overriding earlier ones.
//! Inside a root, files under `ENVIRONMENT_SPECIFIC/<environment>/` override
//! common files at the same relative location, wherever the marker directory
//! appears in the tree. Subtrees for other environments are never mapped.

use crate::error::IsoenvError;
use crate::exclude::ExclusionSet;
use crate::tree::path::normalize_lexically;
use crate::tree::walker::{MarkerDescent, Walker, WalkerConfig};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Reserved directory name holding one subdirectory per environment.
pub const ENV_DIR: &str = "ENVIRONMENT_SPECIFIC";

/// Destination path to winning source path, ordered by destination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationMap {
    entries: BTreeMap<PathBuf, PathBuf>,
}

impl DestinationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `source` as the winner for `dest`, returning the source it replaced.
    pub fn insert(&mut self, dest: PathBuf, source: PathBuf) -> Option<PathBuf> {
        self.entries.insert(dest, source)
    }

    pub fn get(&self, dest: &Path) -> Option<&Path> {
        self.entries.get(dest).map(PathBuf::as_path)
    }

    pub fn contains(&self, dest: &Path) -> bool {
        self.entries.contains_key(dest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, PathBuf, PathBuf> {
        self.entries.iter()
    }

    /// String form used for the audit manifest; keys sort as strings.
    pub fn to_manifest(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(dest, source)| {
                (
                    dest.to_string_lossy().into_owned(),
                    source.to_string_lossy().into_owned(),
                )
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a DestinationMap {
    type Item = (&'a PathBuf, &'a PathBuf);
    type IntoIter = btree_map::Iter<'a, PathBuf, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Resolves source roots into a [`DestinationMap`] for one environment
pub struct OverlayResolver {
    environment: String,
    exclusions: ExclusionSet,
}

impl OverlayResolver {
    /// Resolver for `environment` with the default exclusions.
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            exclusions: ExclusionSet::default(),
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Build the destination map for `sources` (lowest precedence first) into `dest`.
    #[instrument(skip_all, fields(environment = %self.environment))]
    pub fn resolve(&self, sources: &[PathBuf], dest: &Path) -> Result<DestinationMap, IsoenvError> {
        let start = Instant::now();
        let mut map = DestinationMap::new();

        for source in sources {
            self.resolve_root(source, dest, &mut map)?;
        }

        info!(
            files = map.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Resolved destination map"
        );
        Ok(map)
    }

    fn resolve_root(
        &self,
        source: &Path,
        dest: &Path,
        map: &mut DestinationMap,
    ) -> Result<(), IsoenvError> {
        if !source.is_dir() {
            return Err(IsoenvError::SourceNotFound(source.to_path_buf()));
        }
        debug!(source = %source.display(), "Mapping source root");

        let config = WalkerConfig {
            follow_symlinks: false,
            exclusions: self.exclusions.clone(),
            marker: Some(MarkerDescent {
                marker: ENV_DIR.to_string(),
                selected: self.environment.clone(),
            }),
        };

        for listing in Walker::with_config(source.to_path_buf(), config).walk() {
            let listing = listing?;

            let relative = listing.path.strip_prefix(source).unwrap_or(&listing.path);
            let relative = strip_environment(relative, &self.environment);
            if contains_marker(&relative) {
                continue;
            }
            let dest_dir = dest.join(&relative);

            for name in &listing.files {
                let dest_file = normalize_lexically(&dest_dir.join(name));
                let src_file = normalize_lexically(&listing.path.join(name));

                if let Some(old_src) = map.insert(dest_file.clone(), src_file.clone()) {
                    warn!(
                        "{} has multiple sources, overriding {} with {}",
                        dest_file.display(),
                        old_src.display(),
                        src_file.display()
                    );
                } else {
                    debug!(
                        dest = %dest_file.display(),
                        src = %src_file.display(),
                        "Mapped file"
                    );
                }
            }
        }

        Ok(())
    }
}

/// Map `sources` into `dest` for `environment`; convenience over [`OverlayResolver`].
pub fn map_files(
    sources: &[PathBuf],
    dest: &Path,
    environment: &str,
    exclusions: &ExclusionSet,
) -> Result<DestinationMap, IsoenvError> {
    OverlayResolver::new(environment)
        .with_exclusions(exclusions.clone())
        .resolve(sources, dest)
}

/// Remove every `ENVIRONMENT_SPECIFIC/<environment>` segment pair from a relative path.
fn strip_environment(relative: &Path, environment: &str) -> PathBuf {
    let parts: Vec<&OsStr> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();

    let mut stripped = PathBuf::new();
    let mut i = 0;
    while i < parts.len() {
        let is_env_pair = parts[i] == ENV_DIR && parts.get(i + 1).is_some_and(|p| *p == environment);
        if is_env_pair {
            i += 2;
        } else {
            stripped.push(parts[i]);
            i += 1;
        }
    }
    stripped
}

fn contains_marker(relative: &Path) -> bool {
    relative.components().any(|c| c.as_os_str() == ENV_DIR)
}
