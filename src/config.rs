//! Configuration System
//!
//! Layered configuration: built-in defaults, then the global config file, then
//! an explicit `--config` file, then `ISOENV_*` environment variables. The
//! binaries apply command-line flags on top of the loaded value.

use crate::error::IsoenvError;
use crate::exclude::{ExclusionSet, DEFAULT_EXCLUDED};
use crate::logging::LoggingConfig;
use crate::runner::{COMPILED_DIR_VAR, DEFAULT_GRACE_PERIOD, DEFAULT_SHELL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge;
mod sources;

pub use merge::ENV_PREFIX;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsoenvConfig {
    /// Names hidden from resolution and destination cleanup
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,

    /// Shell used by `in_env` to run the command line
    #[serde(default = "default_shell")]
    pub shell: PathBuf,

    /// Variable naming the compiled directory for the child command
    #[serde(default = "default_compiled_dir_var")]
    pub compiled_dir_var: String,

    /// Grace period between SIGTERM and SIGKILL
    #[serde(default = "default_termination_grace_ms")]
    pub termination_grace_ms: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_exclusions() -> Vec<String> {
    DEFAULT_EXCLUDED.iter().map(|s| s.to_string()).collect()
}

fn default_shell() -> PathBuf {
    PathBuf::from(DEFAULT_SHELL)
}

fn default_compiled_dir_var() -> String {
    COMPILED_DIR_VAR.to_string()
}

fn default_termination_grace_ms() -> u64 {
    DEFAULT_GRACE_PERIOD.as_millis() as u64
}

impl Default for IsoenvConfig {
    fn default() -> Self {
        Self {
            exclusions: default_exclusions(),
            shell: default_shell(),
            compiled_dir_var: default_compiled_dir_var(),
            termination_grace_ms: default_termination_grace_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

impl IsoenvConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.shell.as_os_str().is_empty() {
            errors.push("shell cannot be empty".to_string());
        }
        if self.compiled_dir_var.is_empty() || self.compiled_dir_var.contains('=') {
            errors.push(format!(
                "compiled_dir_var '{}' is not a valid variable name",
                self.compiled_dir_var
            ));
        }
        for name in &self.exclusions {
            if name.is_empty() || name.contains('/') || name.contains('\\') {
                errors.push(format!(
                    "exclusion '{}' must be a single file or directory name",
                    name
                ));
            }
        }
        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Exclusion set from config plus any extra names (e.g. `--exclude`).
    pub fn exclusion_set<I, S>(&self, extra: I) -> ExclusionSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = ExclusionSet::new(self.exclusions.iter().cloned());
        set.extend(extra);
        set
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }
}

/// Loads [`IsoenvConfig`] from every configured source
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, global file, optional explicit file, then environment.
    pub fn load(explicit: Option<&Path>) -> Result<IsoenvConfig, IsoenvError> {
        let mut builder = merge::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder)?;
        if let Some(path) = explicit {
            builder = sources::explicit_file::add_to_builder(builder, path)?;
        }
        builder = builder.add_source(merge::environment_source());

        let config: IsoenvConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    /// Load only the given file on top of defaults (no global file, no environment).
    pub fn load_from_file(path: &Path) -> Result<IsoenvConfig, IsoenvError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::explicit_file::add_to_builder(builder, path)?;
        let config: IsoenvConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    fn validated(config: IsoenvConfig) -> Result<IsoenvConfig, IsoenvError> {
        config.validate().map_err(|errors| {
            IsoenvError::Config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            ))
        })?;
        Ok(config)
    }
}
