//! Utility functions for CLI operations.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use topspin_core::{BleLink, ConnectionConfig, EventDispatcher, ScanOptions, Session};

use crate::config::Config;
use crate::style;

/// Resolve the device identifier from the argument, config, or a scan.
///
/// Resolution order: explicit argument, configured default, last
/// connected device, then a short auto-detect scan.
pub async fn resolve_device(device: Option<String>, config: &Config) -> Result<String> {
    if let Some(dev) = device {
        return Ok(dev);
    }
    if let Some(dev) = &config.device {
        return Ok(dev.clone());
    }
    if let Some(dev) = &config.last_device {
        tracing::debug!("Using last connected device: {}", dev);
        return Ok(dev.clone());
    }

    eprintln!("No device specified. Scanning for nearby trackers...");

    let options = ScanOptions::new().duration(Duration::from_secs(5));
    let devices = topspin_core::scan_with_options(options)
        .await
        .context("Failed to scan for devices")?;

    match devices.first() {
        Some(dev) => {
            let name = dev.name.as_deref().unwrap_or("Unknown");
            eprintln!("Found: {} ({})", name, dev.id);
            Ok(dev.id.clone())
        }
        None => bail!(
            "No Topspin trackers found nearby.\n\
             Make sure your tracker is powered on and in range, or use --device <ID>."
        ),
    }
}

/// Connect a session to the given device, with a spinner on interactive
/// terminals.
pub async fn connect_session(
    identifier: &str,
    timeout: Duration,
    events: EventDispatcher,
) -> Result<Arc<Session<BleLink>>> {
    let config = ConnectionConfig::new().connection_timeout(timeout);
    let link = Arc::new(BleLink::with_config(config));
    let session = Arc::new(Session::with_events(link, events));

    let spinner = if io::stderr().is_terminal() {
        Some(style::connecting_spinner(identifier))
    } else {
        None
    };

    let result = session.connect(identifier).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    result.with_context(|| format!("Failed to connect to {}", identifier))?;
    Ok(session)
}

/// Write content to the output file, or stdout if none was given.
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}
