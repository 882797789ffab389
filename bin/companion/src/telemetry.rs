//! Logging and metrics setup.

use anyhow::Context;
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

/// Prometheus CLI arguments.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct MetricsArgs {
    /// Serve Prometheus metrics.
    #[arg(
        long = "metrics.enabled",
        global = true,
        default_value_t = false,
        env = "COMPANION_METRICS_ENABLED"
    )]
    pub(crate) enabled: bool,
    /// Listen address of the metrics server.
    #[arg(
        long = "metrics.addr",
        global = true,
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        env = "COMPANION_METRICS_ADDR"
    )]
    pub(crate) addr: IpAddr,
    /// Port of the metrics server.
    #[arg(long = "metrics.port", global = true, default_value_t = 9090, env = "COMPANION_METRICS_PORT")]
    pub(crate) port: u16,
}

impl Default for MetricsArgs {
    fn default() -> Self {
        Self { enabled: false, addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 9090 }
    }
}

/// Maps the `-v` count to a default level. `RUST_LOG` takes precedence when set.
pub(crate) const fn verbosity_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs the global tracing subscriber.
pub(crate) fn init_tracing_subscriber(verbosity: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_level(verbosity).as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}

/// Starts the Prometheus metrics server and describes the pipeline metrics.
pub(crate) fn init_prometheus_server(args: &MetricsArgs) -> anyhow::Result<()> {
    if !args.enabled {
        return Ok(());
    }
    let addr = SocketAddr::from((args.addr, args.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to start metrics server")?;
    companion_core::Metrics::init();
    info!(target: "prometheus", "Serving metrics at: http://{addr}");
    Ok(())
}
