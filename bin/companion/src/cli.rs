//! Contains the companion CLI.

use crate::{
    commands::{IngestCommand, RpcCommand},
    telemetry::{self, MetricsArgs},
};
use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Subcommands for the CLI.
#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Commands {
    /// Ingest service commands.
    ///
    /// The ingest service pulls blocks from a CometBFT node and stores them in the database.
    /// Run a single instance per followed node.
    #[command(subcommand)]
    Ingest(IngestCommand),
    /// Query service commands.
    #[command(subcommand)]
    Rpc(RpcCommand),
}

/// The companion CLI.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Verbosity level (0-2)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub(crate) v: u8,
    /// Configuration file.
    #[arg(
        long,
        short = 'f',
        global = true,
        default_value = "config.toml",
        env = "COMPANION_CONFIG"
    )]
    pub(crate) config: PathBuf,
    /// Prometheus CLI arguments.
    #[command(flatten)]
    pub(crate) metrics: MetricsArgs,
    /// The subcommand to run.
    #[command(subcommand)]
    pub(crate) subcommand: Commands,
}

impl Cli {
    /// Runs the CLI.
    pub(crate) async fn run(self) -> Result<()> {
        telemetry::init_tracing_subscriber(self.v)?;
        telemetry::init_prometheus_server(&self.metrics)?;

        match self.subcommand {
            Commands::Ingest(ingest) => ingest.run(&self.config).await,
            Commands::Rpc(rpc) => rpc.run(&self.config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest_start() {
        let cli = Cli::try_parse_from(["companion", "-vv", "--config", "c.toml", "ingest", "start"])
            .unwrap();
        assert_eq!(cli.v, 2);
        assert_eq!(cli.config, PathBuf::from("c.toml"));
        assert!(matches!(cli.subcommand, Commands::Ingest(IngestCommand::Start)));
    }

    #[test]
    fn test_parse_backfill() {
        let cli = Cli::try_parse_from([
            "companion",
            "ingest",
            "backfill",
            "--from",
            "10",
            "--count",
            "5",
            "--metrics.enabled",
        ])
        .unwrap();
        assert!(cli.metrics.enabled);
        assert!(matches!(
            cli.subcommand,
            Commands::Ingest(IngestCommand::Backfill { from: 10, count: 5 })
        ));
    }

    #[test]
    fn test_parse_rpc_start() {
        let cli = Cli::try_parse_from(["companion", "rpc", "start", "-f", "other.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert!(matches!(cli.subcommand, Commands::Rpc(RpcCommand::Start { listen: None })));

        let cli =
            Cli::try_parse_from(["companion", "rpc", "start", "--rpc.listen", "0.0.0.0:9000"])
                .unwrap();
        let Commands::Rpc(RpcCommand::Start { listen }) = cli.subcommand else {
            panic!("expected rpc start");
        };
        assert_eq!(listen, Some("0.0.0.0:9000".parse().unwrap()));
    }

    #[test]
    fn test_backfill_requires_range() {
        assert!(Cli::try_parse_from(["companion", "ingest", "backfill", "--from", "1"]).is_err());
    }
}
