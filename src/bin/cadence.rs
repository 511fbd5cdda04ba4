//! Cadence CLI
//!
//! Validates, simulates and verifies state tables without any handler code.
//! Useful for checking a table before it ships and for replaying recorded runs.

use cadence_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
