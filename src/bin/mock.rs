//! mcwire Mock Server Binary
//!
//! Runs a fault-injecting memcached stand-in in the foreground.

use std::time::Duration;

use clap::Parser;
use mcwire::{AcceptMode, MockServer, MockServerConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// Mock memcached server
#[derive(Parser, Debug)]
#[command(name = "mcwire-mock")]
#[command(about = "Memcached mock server with fault injection")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "11212")]
    port: u16,

    /// Interface to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Seconds to wait before answering each get
    #[arg(long, default_value = "0")]
    get_delay: u64,

    /// Listen but never accept a connection
    #[arg(long, conflicts_with = "keep_accepting")]
    dont_accept: bool,

    /// Keep accepting connections one after another instead of serving one
    #[arg(long)]
    keep_accepting: bool,
}

impl Args {
    fn accept_mode(&self) -> AcceptMode {
        if self.dont_accept {
            AcceptMode::Refuse
        } else if self.keep_accepting {
            AcceptMode::Sequential
        } else {
            AcceptMode::Once
        }
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mcwire=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("mcwire mock server v{}", mcwire::VERSION);

    let config = MockServerConfig::builder()
        .listen_addr(format!("{}:{}", args.host, args.port))
        .get_delay(Duration::from_secs(args.get_delay))
        .accept_mode(args.accept_mode())
        .build();

    let server = match MockServer::bind(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    // Never signalled; the process runs until killed
    let (_shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
    if let Err(e) = server.run(shutdown_rx) {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
