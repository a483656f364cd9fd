//! # Sirocco Gateway
//!
//! Binary entry point for the realtime trading gateway.
//!
//! ```bash
//! # Defaults: port 8082, host 0.0.0.0
//! sirocco-gateway
//!
//! # Explicit port and host
//! sirocco-gateway 9000 127.0.0.1
//! ```
//!
//! Exit codes: 0 on clean shutdown, 1 on initialization or runtime
//! failure. SIGINT/SIGTERM drain the rooms and close the transport.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use clap::Parser;
use tracing::{error, info, Level};

use sirocco_gateway::{shutdown, GatewayConfig, GatewayServer};

/// Sirocco realtime trading gateway
#[derive(Parser, Debug)]
#[command(name = "sirocco-gateway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(default_value_t = 8082)]
    port: u16,

    /// Host address to bind
    #[arg(default_value = "0.0.0.0")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable the market-data simulator
    #[arg(long)]
    no_simulator: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);

    let mut config = GatewayConfig {
        host: args.host,
        port: args.port,
        ..GatewayConfig::default()
    };
    config.simulator.enabled = !args.no_simulator;

    let server = GatewayServer::with_demo_collaborators(config);
    tokio::spawn(shutdown::setup_signal_handlers(server.shutdown_controller()));

    match server.run().await {
        Ok(()) => info!("sirocco gateway stopped"),
        Err(e) => {
            error!(error = %e, "gateway failed");
            std::process::exit(1);
        }
    }
}
