//! App-icon generation for macOS.
//!
//! One master PNG is resized to every required size with `sips` (one
//! invocation per size), then the resulting iconset is compiled to `.icns`
//! with `iconutil`. The whole thing is a single logical external step;
//! any tool failure aborts it.

use std::path::Path;

use crate::error::ToolError;
use crate::external::{ToolInvocation, ToolRunner};

/// Icon sizes an `.icns` is expected to carry.
pub const ICON_SIZES: [u32; 7] = [16, 32, 64, 128, 256, 512, 1024];

/// Generates `icns_out` from a master PNG.
pub async fn generate_icns(
    runner: &dyn ToolRunner,
    master: &Path,
    icns_out: &Path,
) -> Result<(), ToolError> {
    let iconset = icns_out.with_extension("iconset");
    std::fs::create_dir_all(&iconset)
        .map_err(|e| ToolError::new("iconset", format!("{}: {e}", iconset.display())))?;

    for size in ICON_SIZES {
        let out = iconset.join(format!("icon_{size}x{size}.png"));
        let resize = ToolInvocation::new(
            "sips",
            [
                "-z".to_string(),
                size.to_string(),
                size.to_string(),
                master.display().to_string(),
                "--out".to_string(),
                out.display().to_string(),
            ],
        );
        runner.run(&resize).await?;
    }

    let compile = ToolInvocation::new(
        "iconutil",
        [
            "-c".to_string(),
            "icns".to_string(),
            iconset.display().to_string(),
            "-o".to_string(),
            icns_out.display().to_string(),
        ],
    );
    runner.run(&compile).await?;

    log::info!("generated app icon {}", icns_out.display());
    Ok(())
}
