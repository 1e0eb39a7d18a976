//! Isoenv CLI Binary
//!
//! Compiles layered source directories into a destination for one environment.

use clap::Parser;
use isoenv::cli::{build_logging_config, map_error, run_mode, CompileArgs, RunContext};
use isoenv::logging::init_logging;
use std::process;
use tracing::{error, info};

fn main() {
    let args = CompileArgs::parse();

    let context = match RunContext::new(&args.common) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}", map_error(&e));
            process::exit(e.exit_code());
        }
    };

    let logging_config = build_logging_config(
        &context.config().logging,
        &args.common,
        Some(run_mode(args.dryrun)),
    );
    let dispatch = match init_logging(&logging_config) {
        Ok(dispatch) => dispatch,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    let code = tracing::dispatcher::with_default(&dispatch, || match context.compile(&args) {
        Ok(outcome) => {
            info!(
                files = outcome.map.len(),
                removed = outcome.summary.removed_files,
                "Compile finished"
            );
            0
        }
        Err(e) => {
            error!("Compile failed: {}", e);
            eprintln!("{}", map_error(&e));
            e.exit_code()
        }
    });

    process::exit(code);
}
