//! CLI route: run context and the two command handlers.

use crate::cli::parse::{CommonArgs, CompileArgs, InEnvArgs};
use crate::compile::{compile_directories, CompileOutcome, CompileRequest};
use crate::config::{ConfigLoader, IsoenvConfig};
use crate::error::IsoenvError;
use crate::logging::LoggingConfig;
use crate::runner::{CancelToken, CommandRunner};
use crate::session::Session;
use tracing::{debug, info};

/// Run-mode label for compile log records.
pub fn run_mode(dryrun: bool) -> &'static str {
    if dryrun {
        "dry run"
    } else {
        "live run"
    }
}

/// Apply logging flags on top of the configured logging settings.
/// Precedence: CLI flags override config file override defaults.
pub fn build_logging_config(
    base: &LoggingConfig,
    args: &CommonArgs,
    run_mode: Option<&str>,
) -> LoggingConfig {
    let mut config = base.clone();

    if args.quiet {
        config.enabled = false;
    }
    if args.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref file) = args.log_file {
        config.file = Some(file.clone());
    }
    if let Some(ref format) = args.log_format {
        config.format = format.clone();
    }
    config.run_mode = run_mode.map(str::to_string);

    config
}

/// Runtime context for CLI execution: loaded configuration and cancellation.
pub struct RunContext {
    config: IsoenvConfig,
    cancel: CancelToken,
}

impl RunContext {
    /// Load configuration (global file, optional explicit file, environment).
    pub fn new(common: &CommonArgs) -> Result<Self, IsoenvError> {
        let config = ConfigLoader::load(common.config.as_deref())?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: IsoenvConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn config(&self) -> &IsoenvConfig {
        &self.config
    }

    /// Token cancelled by the binary's signal handler.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// `isoenv`: compile sources into the destination.
    pub fn compile(&self, args: &CompileArgs) -> Result<CompileOutcome, IsoenvError> {
        let exclusions = self.config.exclusion_set(args.common.exclude.iter().cloned());
        debug!(exclusions = ?exclusions.iter().collect::<Vec<_>>(), "Using exclusions");

        let request = CompileRequest::new(
            args.sources.clone(),
            args.dest.clone(),
            args.environment.as_str(),
        )
        .with_exclusions(exclusions)
        .dry_run(args.dryrun);

        compile_directories(&request)
    }

    /// `in_env`: compile into a transient tree and run the command there.
    /// Returns the command's exit code.
    pub fn in_env(&self, args: &InEnvArgs) -> Result<i32, IsoenvError> {
        let exclusions = self.config.exclusion_set(args.common.exclude.iter().cloned());
        let shell = args
            .shell
            .clone()
            .unwrap_or_else(|| self.config.shell.clone());
        let command = args.command.join(" ");

        let runner = CommandRunner::new()
            .with_shell(shell)
            .with_env_var(self.config.compiled_dir_var.as_str())
            .with_grace_period(self.config.termination_grace())
            .with_cancel_token(self.cancel.clone());

        let session = Session::new(args.sources.clone(), args.environment.as_str())
            .with_destination(args.destination.clone())
            .with_exclusions(exclusions);

        let status = session.run(|dir| runner.run(&command, dir))?;
        info!(code = status.code, cancelled = status.cancelled, "in_env finished");
        Ok(status.code)
    }
}
