//! Bulk history download command.
//!
//! Drives the full BLE-to-WiFi hand-off: connects over BLE, tells the
//! tracker to bring up its access point and HTTP server, joins that
//! network, downloads the shot-history CSV, and tears everything down.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use topspin_core::{
    BulkCoordinator, BulkOptions, BulkPhase, CommandDispatcher, DeviceEvent, DeviceHttpClient,
    EventDispatcher, SystemWifi, format_bytes,
};

use crate::config::Config;
use crate::style;
use crate::util::{connect_session, resolve_device, write_output};

#[allow(clippy::too_many_arguments)]
pub async fn cmd_pull(
    device: Option<String>,
    timeout: u64,
    ssid: Option<String>,
    url: &str,
    keep_network: bool,
    output: Option<&PathBuf>,
    quiet: bool,
    config: &mut Config,
) -> Result<()> {
    let identifier = resolve_device(device, config).await?;

    let events = EventDispatcher::new(64);
    let mut rx = events.subscribe();

    let session = connect_session(&identifier, Duration::from_secs(timeout), events.clone()).await?;
    let name = session.device().and_then(|d| d.name);
    config.remember_device(&identifier, name.as_deref());

    let mut options = BulkOptions::new()
        .base_url(url)
        .leave_on_finish(!keep_network);
    if let Some(ssid) = ssid.or_else(|| config.ssid.clone()) {
        options = options.ssid(ssid);
    }

    let wifi = Arc::new(SystemWifi::new());
    let bulk = Arc::new(BulkCoordinator::new(wifi, options, events));
    let http = DeviceHttpClient::new(url).context("Invalid tracker URL")?;
    let dispatcher = CommandDispatcher::new(Arc::clone(&session), http, bulk);

    let spinner = if !quiet && std::io::stderr().is_terminal() {
        Some(style::operation_spinner("Requesting bulk mode..."))
    } else {
        None
    };

    let transfer = dispatcher
        .enable_bulk_mode()
        .await
        .context("Failed to enable bulk mode")?;

    // Narrate transfer phases while the background task runs.
    let phase_spinner = spinner.clone();
    let narrator = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let DeviceEvent::BulkPhaseChanged { phase } = event {
                let message = match phase {
                    BulkPhase::AwaitingNetwork => "Joining tracker network...",
                    BulkPhase::Joined => "Joined. Waiting for the HTTP server...",
                    BulkPhase::Fetching => "Downloading shot history...",
                    BulkPhase::Complete { .. } | BulkPhase::Failed { .. } => break,
                    _ => continue,
                };
                if let Some(ref pb) = phase_spinner {
                    pb.set_message(message);
                }
            }
        }
    });

    let result = transfer
        .await
        .context("Bulk transfer task panicked")?
        .context("Bulk transfer failed")?;
    narrator.abort();

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    // Best-effort teardown; the data is already on disk-bound.
    if let Err(e) = dispatcher.disable_bulk_mode().await {
        tracing::debug!("Could not disable bulk mode: {}", e);
    }
    session.disconnect().await.ok();

    if !quiet {
        eprintln!(
            "Downloaded {} of shot history.",
            format_bytes(result.len() as u64)
        );
    }
    write_output(output, &result.data)
}
