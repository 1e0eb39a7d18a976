//! Compile: resolve the overlay and materialize it in one step.

use crate::error::IsoenvError;
use crate::exclude::ExclusionSet;
use crate::materialize::{MaterializeSummary, Materializer};
use crate::overlay::{DestinationMap, OverlayResolver};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Inputs for one compilation
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Source roots, lowest precedence first
    pub sources: Vec<PathBuf>,
    pub dest: PathBuf,
    pub environment: String,
    /// Used for both resolution and destination cleanup
    pub exclusions: ExclusionSet,
    pub dry_run: bool,
}

impl CompileRequest {
    pub fn new(sources: Vec<PathBuf>, dest: PathBuf, environment: impl Into<String>) -> Self {
        Self {
            sources,
            dest,
            environment: environment.into(),
            exclusions: ExclusionSet::default(),
            dry_run: false,
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What a compilation resolved and did
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub map: DestinationMap,
    pub summary: MaterializeSummary,
}

/// Compile `request.sources` into `request.dest` for `request.environment`.
#[instrument(skip_all, fields(environment = %request.environment, dry_run = request.dry_run))]
pub fn compile_directories(request: &CompileRequest) -> Result<CompileOutcome, IsoenvError> {
    info!(
        "compiling {} from {} to {}",
        request.environment,
        display_sources(&request.sources),
        request.dest.display()
    );

    let map = OverlayResolver::new(request.environment.as_str())
        .with_exclusions(request.exclusions.clone())
        .resolve(&request.sources, &request.dest)?;

    let summary = Materializer::new(request.dest.clone())
        .with_exclusions(request.exclusions.clone())
        .dry_run(request.dry_run)
        .materialize(&map)?;

    info!("compile complete");
    Ok(CompileOutcome { map, summary })
}

fn display_sources(sources: &[PathBuf]) -> String {
    sources
        .iter()
        .map(|s| s.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
