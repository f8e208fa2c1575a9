//! Universal-binary merge and structural verification.
//!
//! The merge itself is `lipo`; the ARM64 bundle binary is both an input
//! and the output path, so the bundle ends up holding the fat binary.
//! Verification inspects the fat header's architecture slices with goblin
//! rather than executing anything.

use std::path::Path;

use goblin::mach::Mach;
use goblin::mach::cputype::{CPU_TYPE_ARM64, CPU_TYPE_X86_64};

use crate::error::{PipelineError, Result, ToolError};
use crate::external::{ToolInvocation, ToolRunner};

/// Merges `arm` and `x86` into a universal binary written over `arm`.
///
/// The output path deliberately equals the ARM input: the ARM slice comes
/// out of the bundling tool already sitting at the bundle's binary path,
/// and the merged result must land there.
pub async fn merge(
    runner: &dyn ToolRunner,
    arm: &Path,
    x86: &Path,
) -> std::result::Result<(), ToolError> {
    let invocation = ToolInvocation::new(
        "lipo",
        [
            "-create".to_string(),
            arm.display().to_string(),
            x86.display().to_string(),
            "-output".to_string(),
            arm.display().to_string(),
        ],
    );
    runner.run(&invocation).await
}

/// Checks that `path` is a fat binary carrying both an ARM64 and an
/// x86_64 slice.
pub async fn verify(path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(path).await?;
    verify_bytes(&bytes)
}

/// Slice check on in-memory contents.
pub fn verify_bytes(bytes: &[u8]) -> Result<()> {
    match Mach::parse(bytes)? {
        Mach::Fat(multi) => {
            let arches = multi.arches()?;
            let cputypes: Vec<u32> = arches.iter().map(|a| a.cputype).collect();
            for required in [CPU_TYPE_ARM64, CPU_TYPE_X86_64] {
                if !cputypes.contains(&required) {
                    return Err(PipelineError::Universal(format!(
                        "missing cputype {required:#x}; present: {cputypes:#x?}"
                    )));
                }
            }
            Ok(())
        }
        Mach::Binary(_) => Err(PipelineError::Universal(
            "thin binary, expected a fat binary with two slices".to_string(),
        )),
    }
}
