//! Directory tree traversal
//!
//! Lazy per-directory walks with name-scoped exclusion, plus the lexical path
//! helpers used to build destination and source paths.

pub mod path;
pub mod walker;
