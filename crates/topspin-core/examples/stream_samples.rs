//! Example: Streaming swing samples
//!
//! Connects to the first tracker found, subscribes to swing notifications,
//! and prints samples as they arrive for thirty seconds.
//!
//! Run with: `cargo run --example stream_samples`

use std::sync::Arc;
use std::time::Duration;

use topspin_core::{BleLink, DeviceEvent, ScanOptions, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let session = Session::new(Arc::new(BleLink::new()));

    println!("Scanning for trackers...");
    let devices = session.scan(ScanOptions::default()).await?;
    let tracker = devices.first().ok_or("no tracker in range")?;
    println!(
        "Connecting to {}...",
        tracker.name.as_deref().unwrap_or(&tracker.id)
    );

    session.connect(&tracker.id).await?;
    session.start_streaming().await?;
    println!("Streaming. Swing away!");

    let mut events = session.subscribe_events();
    let window = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(window);

    loop {
        tokio::select! {
            _ = &mut window => break,
            event = events.recv() => match event {
                Ok(DeviceEvent::Sample { count, .. }) => {
                    println!("  swing count: {}", count);
                }
                Ok(DeviceEvent::Disconnected { .. }) => {
                    println!("Tracker disconnected.");
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            },
        }
    }

    println!("Session samples: {:?}", session.samples().snapshot());
    session.disconnect().await?;
    Ok(())
}
