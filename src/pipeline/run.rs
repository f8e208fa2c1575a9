//! Immutable parameters of one pipeline run.

/// Trigger metadata for one run: created once, never mutated, shared
/// read-only by every lane.
#[derive(Clone, Debug)]
pub struct PipelineRun {
    /// Branch the trigger fired on
    pub branch: String,
    /// Triggering commit id, used verbatim as the release version string
    pub commit: String,
    /// Whether the upstream CI stage succeeded
    pub upstream_success: bool,
}

impl PipelineRun {
    /// Whether deploy-gated components may execute at all: release branch
    /// and a green upstream, nothing less.
    pub fn deployable(&self, release_branch: &str) -> bool {
        self.branch == release_branch && self.upstream_success
    }
}
