//! Multi-target release pipeline library for the launcher.
//!
//! One independent lane per target OS: compile via the external
//! toolchain, package into the native distributable (executable, tarball,
//! or disk image), and - gated on the release branch and deploy
//! credentials - publish the artifacts and fire the post-deploy action.
//!
//! The crate's content is the control and decision logic; compilers,
//! bundlers, and transports are collaborators behind traits and can be
//! replaced with fakes in tests.

pub mod cli;
pub mod error;
pub mod external;
pub mod packager;
pub mod pipeline;
pub mod publish;

// Re-export commonly used types
pub use error::{PipelineError, Result, ToolError};
