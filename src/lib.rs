//! Isoenv: layered, environment-specific directory compilation
//!
//! Overlays an ordered list of source trees, selects the files of one
//! environment from their `ENVIRONMENT_SPECIFIC` subtrees, and materializes
//! the result into a destination directory. A scoped session can compile into
//! a transient directory and run a command inside it.

pub mod cli;
pub mod compile;
pub mod config;
pub mod error;
pub mod exclude;
pub mod logging;
pub mod materialize;
pub mod overlay;
pub mod runner;
pub mod session;
pub mod tree;
