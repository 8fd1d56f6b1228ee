//! Command-line interface for Topspin tennis trackers.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod format;
mod style;
mod util;

use cli::{DeviceArgs, EndpointArgs, OutputFormat};
use config::Config;
use format::FormatOptions;
use topspin_core::DeviceHttpClient;

#[derive(Parser)]
#[command(name = "topspin")]
#[command(author, version, about = "CLI for Topspin tennis trackers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Omit the header row in CSV output
    #[arg(long, global = true)]
    no_header: bool,

    /// Emit compact JSON instead of pretty-printed
    #[arg(long, global = true)]
    compact: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for nearby Topspin trackers
    Scan {
        /// Scan timeout in seconds
        #[arg(short, long, default_value = "5")]
        timeout: u64,

        /// Include devices that do not look like trackers
        #[arg(short, long)]
        all: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Stream live shot counts from a tracker
    Stream {
        #[command(flatten)]
        device: DeviceArgs,

        /// Stop after this many samples (default: until Ctrl-C)
        #[arg(short, long)]
        count: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show tracker health (firmware, battery, SD card)
    Info {
        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Start a recording session on the tracker
    Start {
        #[command(flatten)]
        endpoint: EndpointArgs,
    },

    /// Stop the current recording session
    Stop {
        #[command(flatten)]
        endpoint: EndpointArgs,
    },

    /// Re-zero the tracker's inertial sensor
    Reset {
        #[command(flatten)]
        endpoint: EndpointArgs,
    },

    /// Download the full shot history over WiFi
    Pull {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        endpoint: EndpointArgs,

        /// SSID of the tracker's access point
        #[arg(long, env = "TOPSPIN_SSID")]
        ssid: Option<String>,

        /// Stay on the tracker network after the download
        #[arg(long)]
        keep_network: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "topspin", &mut io::stdout());
        return Ok(());
    }

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut config = Config::load();
    let no_color = cli.no_color || config.no_color;
    let opts = FormatOptions::new(no_color)
        .with_no_header(cli.no_header)
        .with_compact(cli.compact);

    match cli.command {
        Commands::Scan {
            timeout,
            all,
            format,
        } => {
            commands::cmd_scan(timeout, all, format, cli.output.as_ref(), cli.quiet, &opts).await
        }
        Commands::Stream {
            device,
            count,
            format,
        } => {
            let timeout = effective_timeout(device.timeout, &config);
            commands::cmd_stream(
                device.device,
                timeout,
                count,
                format,
                cli.output.as_ref(),
                cli.quiet,
                &opts,
                &mut config,
            )
            .await
        }
        Commands::Info { endpoint, format } => {
            let url = effective_url(endpoint.url, &config);
            commands::cmd_info(&url, format, cli.output.as_ref(), cli.quiet, &opts).await
        }
        Commands::Start { endpoint } => {
            let url = effective_url(endpoint.url, &config);
            commands::cmd_session_start(&url, &opts).await
        }
        Commands::Stop { endpoint } => {
            let url = effective_url(endpoint.url, &config);
            commands::cmd_session_stop(&url, &opts).await
        }
        Commands::Reset { endpoint } => {
            let url = effective_url(endpoint.url, &config);
            commands::cmd_reset(&url).await
        }
        Commands::Pull {
            device,
            endpoint,
            ssid,
            keep_network,
        } => {
            let url = effective_url(endpoint.url, &config);
            let timeout = effective_timeout(device.timeout, &config);
            commands::cmd_pull(
                device.device,
                timeout,
                ssid,
                &url,
                keep_network,
                cli.output.as_ref(),
                cli.quiet,
                &mut config,
            )
            .await
        }
        Commands::Completions { .. } => unreachable!(),
    }
}

/// Pick the tracker URL from the argument, config, or built-in default.
fn effective_url(arg: Option<String>, config: &Config) -> String {
    arg.or_else(|| config.url.clone())
        .unwrap_or_else(|| DeviceHttpClient::DEFAULT_BASE_URL.to_string())
}

/// Pick the connection timeout, letting config override the clap default.
fn effective_timeout(arg: u64, config: &Config) -> u64 {
    if arg != 15 {
        arg
    } else {
        config.timeout.unwrap_or(arg)
    }
}
