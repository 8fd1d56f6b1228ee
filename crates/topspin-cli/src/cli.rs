//! CLI argument definitions using clap.

use clap::{Args, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Reusable device connection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device identifier (address or peripheral ID), or use TOPSPIN_DEVICE env var
    #[arg(short, long, env = "TOPSPIN_DEVICE")]
    pub device: Option<String>,

    /// Connection timeout in seconds
    #[arg(short = 'T', long, default_value = "15")]
    pub timeout: u64,
}

/// Reusable HTTP endpoint arguments
#[derive(Debug, Clone, Args)]
pub struct EndpointArgs {
    /// Base URL of the tracker's HTTP server
    #[arg(long, env = "TOPSPIN_URL")]
    pub url: Option<String>,
}
