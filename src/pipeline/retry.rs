//! Retrying executor for one known-flaky external tool.
//!
//! Bound to disk-image creation, which fails nondeterministically with
//! "resource busy" under OS-level contention. Nothing else in the
//! pipeline retries implicitly; build and transfer failures stay fatal.

use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::external::{ToolInvocation, ToolRunner};

/// Fixed retry bound: attempts and the inter-attempt delay.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// Runs `invocation` up to `policy.max_attempts` times, sleeping the
/// fixed delay between attempts. Succeeds on the first success; after
/// exhaustion the last failure escalates to a fatal error.
pub async fn run_with_retry(
    runner: &dyn ToolRunner,
    invocation: &ToolInvocation,
    policy: &RetryPolicy,
) -> Result<()> {
    let mut last_failure = None;

    for attempt in 1..=policy.max_attempts {
        match runner.run(invocation).await {
            Ok(()) => {
                if attempt > 1 {
                    log::info!(
                        "{} succeeded on attempt {attempt}/{}",
                        invocation.program,
                        policy.max_attempts
                    );
                }
                return Ok(());
            }
            Err(e) => {
                log::warn!(
                    "{} failed on attempt {attempt}/{}: {e}",
                    invocation.program,
                    policy.max_attempts
                );
                last_failure = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(PipelineError::ToolExhausted {
        command: invocation.program.clone(),
        attempts: policy.max_attempts,
        reason: last_failure
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string()),
    })
}
