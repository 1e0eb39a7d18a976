//! Merge rules: built-in defaults and the environment-variable layer.

use crate::exclude::DEFAULT_EXCLUDED;
use crate::runner::{COMPILED_DIR_VAR, DEFAULT_GRACE_PERIOD, DEFAULT_SHELL};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment};

/// Prefix for environment-variable overrides, e.g. `ISOENV_SHELL`.
pub const ENV_PREFIX: &str = "ISOENV";

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("exclusions", DEFAULT_EXCLUDED.to_vec())?
        .set_default("shell", DEFAULT_SHELL)?
        .set_default("compiled_dir_var", COMPILED_DIR_VAR)?
        .set_default(
            "termination_grace_ms",
            DEFAULT_GRACE_PERIOD.as_millis() as i64,
        )?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")
}

/// Environment layer: `ISOENV_SHELL`, `ISOENV_LOGGING__LEVEL`, and a
/// comma-separated `ISOENV_EXCLUSIONS`.
pub fn environment_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("exclusions")
        .try_parsing(true)
}
