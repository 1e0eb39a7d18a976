//! CLI parse: clap types for both binaries. No behavior; definitions only.

use clap::{Args, Parser};
use std::path::PathBuf;

/// Compile a set of source directories containing environment specific files
/// into a single output directory with only the files for the specified
/// environment
#[derive(Parser, Debug)]
#[command(name = "isoenv", version)]
pub struct CompileArgs {
    /// Source directories, lowest precedence first
    #[arg(long, num_args = 1.., required = true, value_name = "SOURCE")]
    pub sources: Vec<PathBuf>,

    /// Environment whose ENVIRONMENT_SPECIFIC subtree is selected
    #[arg(long)]
    pub environment: String,

    /// Destination directory
    pub dest: PathBuf,

    /// Don't modify the destination directory
    #[arg(short = 'd', long)]
    pub dryrun: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Run a command inside a compiled directory
#[derive(Parser, Debug)]
#[command(name = "in_env", version)]
pub struct InEnvArgs {
    /// Source directories, lowest precedence first
    #[arg(long, num_args = 1.., required = true, value_name = "SOURCE")]
    pub sources: Vec<PathBuf>,

    /// Environment whose ENVIRONMENT_SPECIFIC subtree is selected
    #[arg(long)]
    pub environment: String,

    /// Compile into this directory instead of a temporary one (removed afterwards)
    #[arg(long)]
    pub destination: Option<PathBuf>,

    /// Shell used to run the command (default: /bin/sh)
    #[arg(long)]
    pub shell: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,

    /// Command line to run; words are joined with spaces
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Flags shared by both binaries
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Additional names to exclude at every level (repeatable)
    #[arg(long = "exclude", value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run silently
    #[arg(short, long)]
    pub quiet: bool,

    /// Run verbosely
    #[arg(short, long)]
    pub verbose: bool,

    /// Which file to log to
    #[arg(short = 'l', long = "logging-file", visible_alias = "logging_file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log format (text, json)
    #[arg(long)]
    pub log_format: Option<String>,
}
