//! Info command implementation.
//!
//! Fetches a health snapshot over the tracker's HTTP interface, so it
//! requires the phone (or host) to be on the tracker's network.

use std::path::PathBuf;

use anyhow::{Context, Result};
use topspin_core::DeviceHttpClient;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_health_json, format_health_text};
use crate::style;
use crate::util::write_output;

pub async fn cmd_info(
    url: &str,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let client = DeviceHttpClient::new(url).context("Invalid tracker URL")?;

    let spinner = if !quiet && matches!(format, OutputFormat::Text) {
        Some(style::operation_spinner("Fetching tracker health..."))
    } else {
        None
    };

    let health = client.health().await;

    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }

    let health = health.with_context(|| {
        format!(
            "Failed to reach tracker at {}. Join its network first (see 'topspin pull').",
            url
        )
    })?;

    let content = match format {
        OutputFormat::Json => format_health_json(&health, opts)?,
        _ => format_health_text(&health, opts),
    };

    write_output(output, &content)
}
