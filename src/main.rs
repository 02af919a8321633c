//! Backend load balancer daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────────┐
//!                    │                  UPSTREAM BALANCER                  │
//!                    │                                                     │
//!  Client Request    │  ┌─────────┐    ┌──────────┐    ┌───────────────┐  │
//!  ──────────────────┼─▶│  http   │───▶│ balancer │───▶│ load_balancer │  │
//!                    │  │ server  │    │ forward  │    │ registry+algo │  │
//!                    │  └─────────┘    └────┬─────┘    └───────────────┘  │
//!                    │                      │ retry / backoff              │
//!                    │                      ▼                              │
//!  Client Response   │               ┌─────────────┐                      │
//!  ◀─────────────────┼───────────────│  transport  │◀─────────────────────┼──── Backend
//!                    │               └─────────────┘                      │
//!                    │                                                     │
//!                    │  health monitor · session sweeper · admin · metrics │
//!                    └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use upstream_balancer::config::{load_config, validate_config, Algorithm, ConfigError};
use upstream_balancer::lifecycle::{self, signals, Shutdown};
use upstream_balancer::observability::logging::init_tracing;
use upstream_balancer::transport::{HttpTransport, SimulatedTransport, Transport};

#[derive(Parser)]
#[command(name = "upstream-balancer")]
#[command(about = "Health-aware load balancer for a static backend pool", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "balancer.toml")]
    config: PathBuf,

    /// Override the configured algorithm.
    #[arg(short, long)]
    algorithm: Option<Algorithm>,

    /// Use the simulated transport instead of real HTTP.
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    init_tracing(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "upstream-balancer starting");
    tracing::info!(
        config = %args.config.display(),
        algorithm = %config.algorithm,
        backends = config.backends.len(),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let transport: Arc<dyn Transport> = if args.simulate {
        tracing::warn!("Using simulated transport; no real backends are contacted");
        Arc::new(SimulatedTransport::default())
    } else {
        Arc::new(HttpTransport::new(config.listener.max_body_bytes))
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    lifecycle::serve(config, transport, shutdown).await?;
    Ok(())
}
