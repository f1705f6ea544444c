//! Command routing logic for CLI

use anyhow::Context;
use bulwark_core::config::{BulwarkConfig, ConfigLoader};

use crate::args::{Cli, Commands};
use crate::{commands, logging};

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::CheckConfig { path } => {
            logging::init(&BulwarkConfig::default().logging, cli.log_format)?;
            let report = commands::check_config::run(path, &cli.overrides)?;
            println!("{report}");
            Ok(())
        }
        Commands::Demo(args) => {
            let config = load(&cli)?;
            logging::init(&config.logging, cli.log_format)?;
            let snapshot = commands::demo::run(&config, args).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

/// Defaults, then `--config`, then `BULWARK_*` variables, then `--set`
fn load(cli: &Cli) -> anyhow::Result<BulwarkConfig> {
    let mut loader = ConfigLoader::new().with_defaults();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    loader
        .with_env()
        .with_overrides(cli.overrides.iter().cloned())
        .load()
        .context("failed to load configuration")
}
