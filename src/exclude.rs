//! Exclusion set for traversal and cleanup.
//!
//! Exclusion is name-scoped: a name in the set hides every file or directory
//! with exactly that name, at any depth below any root. Nothing is pattern
//! matched; `.git` excludes `.git` but not `.gitignore`.

use std::collections::BTreeSet;
use std::ffi::OsStr;

/// Built-in exclusions (version-control metadata).
pub const DEFAULT_EXCLUDED: &[&str] = &[".git"];

/// Set of names invisible to traversal and copy operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED.iter().copied())
    }
}

impl ExclusionSet {
    /// Build a set from the given names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// A set that excludes nothing.
    pub fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    /// Add more names to the set.
    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
    }

    /// Names that are not valid UTF-8 can never match.
    pub fn is_excluded<N: AsRef<OsStr>>(&self, name: N) -> bool {
        name.as_ref()
            .to_str()
            .is_some_and(|name| self.names.contains(name))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Prune excluded names from one directory listing.
    pub fn apply<N: AsRef<OsStr>>(&self, dirs: &mut Vec<N>, files: &mut Vec<N>) {
        if self.names.is_empty() {
            return;
        }
        dirs.retain(|name| !self.is_excluded(name));
        files.retain(|name| !self.is_excluded(name));
    }
}
