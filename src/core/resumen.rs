use serde::Serialize;
use std::path::Path;

/// Final stdout line for pipelines that report statistics.
///
/// The stdout contract: diagnostics and progress go to stderr, the last
/// line of stdout is either a bare artifact path or this JSON object, so an
/// orchestrating process can pick up the result mechanically.
#[derive(Debug, Serialize)]
pub struct ResumenEjecucion<S: Serialize> {
    /// Path of the produced artifact.
    pub path: String,
    /// Pipeline-specific counters.
    pub stats: S,
}

impl<S: Serialize> ResumenEjecucion<S> {
    pub fn new(path: &Path, stats: S) -> Self {
        Self {
            path: path.display().to_string(),
            stats,
        }
    }

    /// Serialize to one JSON line.
    pub fn a_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"path\":{:?}}}", self.path))
    }
}
