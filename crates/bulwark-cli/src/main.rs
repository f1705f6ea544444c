//! Bulwark CLI application
//!
//! Validates configuration files and runs a scripted demonstration of the
//! resilience core against a simulated flaky downstream.
//!
//! ```bash
//! bulwark check-config bulwark.toml
//! bulwark --config bulwark.yaml --set circuit_breaker.reset_timeout=500ms demo
//! ```
//!
//! Set `RUST_LOG=debug` for verbose logging; it takes precedence over the
//! configured `logging.level`.

mod args;
mod commands;
mod logging;
mod router;

use clap::Parser;

pub use args::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    router::route(cli).await
}
