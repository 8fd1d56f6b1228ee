//! Example: Scanning for Topspin trackers
//!
//! This example demonstrates how to scan for Topspin trackers
//! using Bluetooth Low Energy.
//!
//! Run with: `cargo run --example scan_devices`

use topspin_core::scan::{self, ScanOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("Scanning for Topspin trackers...");
    println!();

    let options = ScanOptions::default()
        .duration_secs(10)
        .filter_trackers_only(true);

    let devices = scan::scan_with_options(options).await?;

    if devices.is_empty() {
        println!("No trackers found.");
        println!();
        println!("Make sure:");
        println!("  - Your tracker is powered on");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The tracker is within range");
    } else {
        println!("Found {} tracker(s):", devices.len());
        println!();

        for device in &devices {
            let name = device.name.as_deref().unwrap_or("Unknown");
            let rssi = device
                .rssi
                .map(|r| format!("{} dBm", r))
                .unwrap_or_else(|| "N/A".to_string());

            println!("  {}", name);
            println!("    Identifier: {}", device.id);
            println!("    RSSI: {}", rssi);
            println!();
        }
    }

    Ok(())
}
