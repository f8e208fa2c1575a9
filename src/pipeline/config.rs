//! Environment resolver: trigger-time configuration, resolved once per
//! run and read-only thereafter.

use std::path::PathBuf;

use serde::Serialize;

/// Inputs the resolver reads from the trigger. All optional fields have
/// defaults; resolution never fails.
#[derive(Clone, Debug, Default)]
pub struct TriggerInputs {
    /// Product name
    pub product_name: String,
    /// Overrides the display name; defaults to the product name
    pub display_name: Option<String>,
    /// Commit id, used verbatim as the version string
    pub commit: String,
    /// Branch lanes deploy from
    pub release_branch: String,
    /// Update-manifest base URL baked into the build
    pub manifest_url: Option<String>,
    /// Alternate auto-update base URL baked into the build
    pub update_base: Option<String>,
    /// Master icon image for macOS icon generation
    pub icon_master: Option<PathBuf>,
    /// Source checkout the compile step runs in
    pub project_dir: PathBuf,
}

/// Resolved release parameters. Shared read-only by all lanes.
#[derive(Clone, Debug, Serialize)]
pub struct ReleaseConfig {
    /// Human-facing name, e.g. "Potato Launcher"
    pub display_name: String,
    /// Machine-facing name derived from the display name
    pub data_name: String,
    /// Release version string (the trigger commit id, not parsed)
    pub version: String,
    /// Branch deploys are allowed from
    pub release_branch: String,
    pub manifest_url: Option<String>,
    pub update_base: Option<String>,
    #[serde(skip)]
    pub icon_master: Option<PathBuf>,
    #[serde(skip)]
    pub project_dir: PathBuf,
}

impl ReleaseConfig {
    /// Resolves the run configuration. Pure: no I/O, no error cases.
    pub fn resolve(inputs: TriggerInputs) -> Self {
        let display_name = inputs
            .display_name
            .unwrap_or_else(|| inputs.product_name.clone());
        let data_name = data_name(&display_name);
        Self {
            display_name,
            data_name,
            version: inputs.commit,
            release_branch: inputs.release_branch,
            manifest_url: inputs.manifest_url,
            update_base: inputs.update_base,
            icon_master: inputs.icon_master,
            project_dir: inputs.project_dir,
        }
    }
}

/// Lowercases the display name and replaces spaces with underscores.
/// Every artifact naming rule that is not display-facing uses this form.
pub fn data_name(display_name: &str) -> String {
    display_name.to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_name_is_lowercased_and_underscored() {
        assert_eq!(data_name("Potato Launcher"), "potato_launcher");
        assert_eq!(data_name("launcher"), "launcher");
        assert_eq!(data_name("A B C"), "a_b_c");
    }

    #[test]
    fn display_name_defaults_to_product_name() {
        let config = ReleaseConfig::resolve(TriggerInputs {
            product_name: "Potato Launcher".to_string(),
            commit: "deadbeef".to_string(),
            release_branch: "master".to_string(),
            ..Default::default()
        });
        assert_eq!(config.display_name, "Potato Launcher");
        assert_eq!(config.data_name, "potato_launcher");
        assert_eq!(config.version, "deadbeef");
    }

    #[test]
    fn display_override_wins() {
        let config = ReleaseConfig::resolve(TriggerInputs {
            product_name: "launcher".to_string(),
            display_name: Some("Fancy Launcher".to_string()),
            commit: "c0ffee".to_string(),
            release_branch: "master".to_string(),
            ..Default::default()
        });
        assert_eq!(config.display_name, "Fancy Launcher");
        assert_eq!(config.data_name, "fancy_launcher");
    }
}
