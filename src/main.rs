//! Launcher release pipeline binary.
//!
//! Compiles, packages, and optionally deploys the launcher for each
//! selected target OS, one independent lane per target.

use std::process;

use launcher_release::cli;

#[tokio::main]
async fn main() {
    env_logger::init();

    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    process::exit(exit_code);
}
