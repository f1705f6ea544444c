//! CLI argument definitions using clap

use bulwark_core::config::LogFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bulwark")]
#[command(about = "Bulwark - circuit breaker, retry, event bus and TTL cache toolkit")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML, YAML or JSON configuration file
    #[arg(long, global = true, env = "BULWARK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format (overrides logging.format)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Override a configuration key, e.g. `--set retry.max_attempts=5`
    #[arg(long = "set", global = true, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub overrides: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a configuration file and print the effective configuration
    CheckConfig {
        /// Configuration file to validate
        path: PathBuf,
    },

    /// Run the resilience core against a simulated flaky downstream
    Demo(DemoArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Number of requests to send through the protected call
    #[arg(long, default_value_t = 10)]
    pub requests: u32,

    /// Number of downstream invocations that fail before it recovers
    #[arg(long, default_value_t = 6)]
    pub outage_calls: u32,

    /// Distinct cache keys the requests rotate through
    #[arg(long, default_value_t = 3)]
    pub keys: u32,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            requests: 10,
            outage_calls: 6,
            keys: 3,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_demo_with_globals() {
        let cli = Cli::try_parse_from([
            "bulwark",
            "demo",
            "--requests",
            "4",
            "--log-format",
            "json",
            "--set",
            "retry.max_attempts=2",
        ])
        .unwrap();

        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert_eq!(
            cli.overrides,
            vec![("retry.max_attempts".to_string(), "2".to_string())]
        );
        match cli.command {
            Commands::Demo(args) => {
                assert_eq!(args.requests, 4);
                assert_eq!(args.outage_calls, 6);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_check_config() {
        let cli = Cli::try_parse_from(["bulwark", "check-config", "bulwark.toml"]).unwrap();
        match cli.command {
            Commands::CheckConfig { path } => assert_eq!(path, PathBuf::from("bulwark.toml")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_log_format_and_override() {
        assert!(Cli::try_parse_from(["bulwark", "--log-format", "xml", "demo"]).is_err());
        assert!(Cli::try_parse_from(["bulwark", "--set", "=3", "demo"]).is_err());
        assert!(Cli::try_parse_from(["bulwark", "--set", "retry", "demo"]).is_err());
    }
}
