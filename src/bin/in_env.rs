//! in_env CLI Binary
//!
//! Compiles sources into a transient directory, runs a command there, and
//! removes the directory afterwards.

use clap::Parser;
use isoenv::cli::{build_logging_config, map_error, InEnvArgs, RunContext};
use isoenv::logging::init_logging;
use std::process;
use tracing::{error, warn};

fn main() {
    let args = InEnvArgs::parse();

    let context = match RunContext::new(&args.common) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}", map_error(&e));
            process::exit(e.exit_code());
        }
    };

    let logging_config = build_logging_config(&context.config().logging, &args.common, None);
    let dispatch = match init_logging(&logging_config) {
        Ok(dispatch) => dispatch,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    let code = tracing::dispatcher::with_default(&dispatch, || {
        if let Err(e) = context.cancel_token().install_signal_handler() {
            warn!("Could not install signal handler: {}", e);
        }

        match context.in_env(&args) {
            Ok(code) => code,
            Err(e) => {
                error!("in_env failed: {}", e);
                eprintln!("{}", map_error(&e));
                e.exit_code()
            }
        }
    });

    process::exit(code);
}
