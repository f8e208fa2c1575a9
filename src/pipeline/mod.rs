//! Pipeline control and decision logic.
//!
//! The rules that decide which steps run, in what order, and under what
//! preconditions. The per-OS packaging strategies live in
//! [`crate::packager`]; everything here is control flow.

pub mod config;
pub mod lane;
pub mod report;
pub mod retry;
pub mod run;
pub mod secrets;

pub use config::{ReleaseConfig, TriggerInputs, data_name};
pub use lane::{
    LaneContext, LaneOutcome, SkipReason, StepStatus, notify_gate, publish_gate, run_lane,
};
pub use report::RunReporter;
pub use retry::{RetryPolicy, run_with_retry};
pub use run::PipelineRun;
pub use secrets::{CredentialKind, SecretAvailability};
