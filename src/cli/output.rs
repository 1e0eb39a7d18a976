//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::IsoenvError;

/// Map domain errors to the line printed on stderr.
pub fn map_error(e: &IsoenvError) -> String {
    match e {
        IsoenvError::SourceNotFound(_) => format!("error: {} (check --sources)", e),
        _ => format!("error: {}", e),
    }
}
