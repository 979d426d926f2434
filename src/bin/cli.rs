//! mcwire CLI Client
//!
//! Command-line interface for poking a memcached server.

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mcwire::{Client, ClientConfig, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// mcwire CLI
#[derive(Parser, Debug)]
#[command(name = "mcwire-cli")]
#[command(about = "CLI for memcached-compatible servers")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = mcwire::config::DEFAULT_CLIENT_ADDR)]
    server: String,

    /// Read/write timeout in seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Connect timeout in seconds (defaults to the read/write timeout)
    #[arg(long)]
    connect_timeout: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Get several values in one request
    Mget {
        /// The keys to get
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// Expiry in seconds (0 = never)
        #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
        exptime: i64,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// Print server statistics
    Stats {
        /// Optional stats group, e.g. "slabs"
        args: Option<String>,
    },

    /// Invalidate every item
    FlushAll,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut builder = ClientConfig::builder().addr(&args.server);
    if let Some(secs) = args.timeout {
        builder = builder.timeout(seconds(secs)?);
    }
    if let Some(secs) = args.connect_timeout {
        builder = builder.connect_timeout(seconds(secs)?);
    }
    let mut client = Client::new(builder.build()?);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.command {
        Commands::Get { key } => match client.get(&key)? {
            Some(value) => {
                out.write_all(&value)?;
                writeln!(out)?;
            }
            None => writeln!(out, "(nil)")?,
        },
        Commands::Mget { keys } => {
            for (key, value) in keys.iter().zip(client.multi_get(keys.as_slice())?) {
                match value {
                    Some(value) => writeln!(out, "{} = {}", key, value.escape_ascii())?,
                    None => writeln!(out, "{} = (nil)", key)?,
                }
            }
        }
        Commands::Set {
            key,
            value,
            exptime,
        } => {
            client.set_with_exptime(&key, value.as_bytes(), exptime)?;
            writeln!(out, "STORED")?;
        }
        Commands::Delete { key } => {
            client.delete(&key)?;
            writeln!(out, "OK")?;
        }
        Commands::Stats { args } => {
            let mut stats: Vec<_> = client.stats(args.as_deref())?.into_iter().collect();
            stats.sort();
            for (name, value) in stats {
                writeln!(out, "{} {}", name, value.unwrap_or_default())?;
            }
        }
        Commands::FlushAll => {
            client.flush_all()?;
            writeln!(out, "OK")?;
        }
    }

    Ok(())
}

fn seconds(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| mcwire::McError::Config(format!("invalid timeout: {}", secs)))
}
