//! Example: Pulling shot history over the WiFi hand-off
//!
//! Connects over BLE, tells the tracker to bring up its HTTP server, joins
//! the tracker's access point, and downloads the shot-history CSV.
//!
//! Run with: `cargo run --example pull_history`

use std::sync::Arc;

use topspin_core::{
    BleLink, BulkCoordinator, BulkOptions, CommandDispatcher, DeviceHttpClient, EventDispatcher,
    ScanOptions, Session, SystemWifi, format_bytes,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let events = EventDispatcher::default();
    let session = Arc::new(Session::with_events(
        Arc::new(BleLink::new()),
        events.clone(),
    ));

    println!("Scanning for trackers...");
    let devices = session.scan(ScanOptions::default()).await?;
    let tracker = devices.first().ok_or("no tracker in range")?;

    session.connect(&tracker.id).await?;
    println!("Connected. Requesting bulk mode...");

    let wifi = Arc::new(SystemWifi::new());
    let bulk = Arc::new(BulkCoordinator::new(
        wifi,
        BulkOptions::default(),
        events.clone(),
    ));
    let http = DeviceHttpClient::new(DeviceHttpClient::DEFAULT_BASE_URL)?;
    let dispatcher = CommandDispatcher::new(Arc::clone(&session), http, bulk);

    let transfer = dispatcher.enable_bulk_mode().await?;
    let result = transfer.await??;

    println!(
        "Downloaded {} of shot history",
        format_bytes(result.len() as u64)
    );
    for line in result.data.lines().take(5) {
        println!("  {}", line);
    }

    dispatcher.disable_bulk_mode().await?;
    session.disconnect().await?;
    Ok(())
}
