//! Error taxonomy for pipeline operations.
//!
//! Failure classes map directly onto how the pipeline reacts to them:
//! build and transfer failures abort the lane, tool exhaustion is the
//! escalated form of a transient failure, and skips are not errors at all
//! (they are modeled as [`crate::pipeline::StepStatus::Skipped`]).

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for all pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A compiler/bundler or packaging-tool invocation failed. Fatal for
    /// the lane, never retried.
    #[error("build failed for {target}: {reason}")]
    Build {
        /// OS tag of the lane that failed
        target: &'static str,
        /// Tool output or cause
        reason: String,
    },

    /// A known-flaky external tool kept failing until the retry bound
    /// was exhausted.
    #[error("{command} failed after {attempts} attempts: {reason}")]
    ToolExhausted {
        /// Program that was retried
        command: String,
        /// Number of attempts made
        attempts: u32,
        /// Last failure detail
        reason: String,
    },

    /// A remote transfer or remote invocation failed. Fatal for the lane,
    /// never retried.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The merged universal binary does not carry the expected
    /// architecture slices.
    #[error("universal binary verification failed: {0}")]
    Universal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Info.plist read/write errors
    #[error("plist error: {0}")]
    Plist(#[from] plist::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Mach-O parse errors
    #[error("binary parse error: {0}")]
    MachParse(#[from] goblin::error::Error),

    /// Generic errors
    #[error("{0}")]
    Generic(String),
}

/// Failure of one external command invocation, carrying the captured
/// diagnostics. Call sites classify this into the [`PipelineError`]
/// variant appropriate for their step.
#[derive(Error, Debug, Clone)]
#[error("{program}: {detail}")]
pub struct ToolError {
    /// Program that failed
    pub program: String,
    /// Stderr excerpt or launch-failure message
    pub detail: String,
}

impl ToolError {
    pub fn new(program: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            detail: detail.into(),
        }
    }
}
