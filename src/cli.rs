//! CLI domain: parse, route, and output only.
//! Orchestration lives in the library modules; handlers just wire flags to them.

mod output;
mod parse;
mod route;

pub use output::map_error;
pub use parse::{CommonArgs, CompileArgs, InEnvArgs};
pub use route::{build_logging_config, run_mode, RunContext};
