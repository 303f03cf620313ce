// This file is part of AAWallet.
//
// AAWallet is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// AAWallet is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with AAWallet.
// If not, see https://www.gnu.org/licenses/.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

mod keys;
mod keyserver;
mod logging;
mod metrics;
mod signer;
mod wallet;

use keys::KeysCliArgs;
use keyserver::KeyServerCliArgs;
use wallet::WalletCliArgs;

/// Main entry point for the CLI
///
/// Parses the CLI arguments and runs the selected subcommand. Only the key
/// server serves metrics; the client subcommands exit when done.
pub async fn run() -> anyhow::Result<()> {
    let opt = Cli::parse();
    let _guard = logging::configure_logging(&opt.logs)?;

    match opt.command {
        Command::KeyServer(args) => {
            let metrics_addr = format!("{}:{}", opt.metrics.host, opt.metrics.port).parse()?;
            metrics::initialize(metrics_addr, &opt.metrics.tags, &opt.metrics.buckets)
                .context("metrics server should start")?;
            keyserver::run(args).await
        }
        Command::Keys(args) => keys::run(args),
        Command::Wallet(args) => wallet::run(args).await,
    }
}

/// CLI commands
#[derive(Subcommand)]
enum Command {
    /// Key server command
    ///
    /// Serves the configured keys over JSON-RPC until ctrl-c.
    #[command(name = "keyserver")]
    KeyServer(KeyServerCliArgs),

    /// Keys command
    ///
    /// Prints the index and address of every configured key.
    #[command(name = "keys")]
    Keys(KeysCliArgs),

    /// Wallet command
    ///
    /// Drives a wallet session against a running key server or injected provider.
    #[command(name = "wallet")]
    Wallet(WalletCliArgs),
}

/// CLI options for the metrics server
#[derive(Debug, Args)]
#[command(next_help_heading = "Metrics")]
pub struct MetricsArgs {
    /// Port to listen on for metrics requests
    #[arg(
        long = "metrics.port",
        name = "metrics.port",
        env = "METRICS_PORT",
        default_value = "8080",
        global = true
    )]
    port: u16,

    /// Host to listen on for metrics requests
    #[arg(
        long = "metrics.host",
        name = "metrics.host",
        env = "METRICS_HOST",
        default_value = "127.0.0.1",
        global = true
    )]
    host: String,

    /// Tags for metrics
    ///
    /// Format: key1=value1,key2=value2,...
    #[arg(
        long = "metrics.tags",
        name = "metrics.tags",
        env = "METRICS_TAGS",
        default_values_t = Vec::<String>::new(),
        value_delimiter = ',',
        global = true
    )]
    tags: Vec<String>,

    /// Buckets for histogram metrics, in milliseconds
    #[arg(
        long = "metrics.histogram_buckets",
        name = "metrics.histogram_buckets",
        env = "METRICS_HISTOGRAM_BUCKETS",
        default_values_t = vec![
            0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0,
            500.0, 1000.0, 2000.0, 5000.0, 10000.0,
        ],
        value_delimiter = ',',
        global = true
    )]
    buckets: Vec<f64>,
}

/// CLI options for logging
#[derive(Debug, Args)]
#[command(next_help_heading = "Logging")]
pub struct LogsArgs {
    /// Log file
    ///
    /// If not provided, logs will be written to stderr
    #[arg(
        long = "log.file",
        name = "log.file",
        env = "LOG_FILE",
        default_value = None,
        global = true
    )]
    file: Option<String>,

    /// Log JSON
    ///
    /// If set, logs will be written in JSON format
    #[arg(
        long = "log.json",
        name = "log.json",
        env = "LOG_JSON",
        required = false,
        num_args = 0,
        global = true
    )]
    json: bool,
}

/// CLI options
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    #[clap(flatten)]
    metrics: MetricsArgs,

    #[clap(flatten)]
    logs: LogsArgs,
}
