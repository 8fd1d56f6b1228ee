//! Hardware-backed tests for topspin-core.
//!
//! These tests require a real Topspin tracker in range and should be run
//! with: `cargo test --package topspin-core -- --ignored --nocapture`
//!
//! Set the TOPSPIN_DEVICE environment variable to pick which tracker to
//! test: `TOPSPIN_DEVICE="Topspin-Tracker" cargo test -- --ignored`

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use topspin_core::scan::{ScanOptions, scan_with_options};
use topspin_core::{BleLink, ConnectionState, Session};

/// Default timeout for BLE operations.
const BLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Get the tracker identifier from the environment or use the default.
fn get_device_name() -> String {
    env::var("TOPSPIN_DEVICE").unwrap_or_else(|_| "Topspin-Tracker".to_string())
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_scan_for_trackers() {
    let options = ScanOptions {
        duration: Duration::from_secs(10),
        filter_trackers_only: true,
    };

    let result = timeout(BLE_TIMEOUT, scan_with_options(options)).await;

    match result {
        Ok(Ok(devices)) => {
            println!("Found {} tracker(s)", devices.len());
            for device in devices {
                println!(
                    "  {} ({})",
                    device.name.as_deref().unwrap_or("Unknown"),
                    device.address
                );
            }
        }
        Ok(Err(e)) => panic!("Scan failed: {}", e),
        Err(_) => panic!("Scan timed out after {:?}", BLE_TIMEOUT),
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_connect_and_stream() {
    let device_name = get_device_name();
    println!("Connecting to tracker: {}", device_name);

    let session = Session::new(Arc::new(BleLink::new()));

    let connect_result = timeout(BLE_TIMEOUT, session.connect(&device_name)).await;
    match connect_result {
        Ok(Ok(())) => println!("Connected!"),
        Ok(Err(e)) => panic!("Failed to connect to {}: {}", device_name, e),
        Err(_) => panic!("Connection timed out after {:?}", BLE_TIMEOUT),
    }

    session.start_streaming().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Streaming);

    // Swing the tracker during this window to see samples arrive
    tokio::time::sleep(Duration::from_secs(10)).await;
    println!("Samples: {:?}", session.samples().snapshot());

    session.disconnect().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
#[ignore = "requires BLE hardware and tracker in bulk mode"]
async fn test_health_endpoint() {
    use topspin_core::DeviceHttpClient;

    let client = DeviceHttpClient::new(DeviceHttpClient::DEFAULT_BASE_URL).unwrap();
    let health = timeout(Duration::from_secs(15), client.health())
        .await
        .expect("health request timed out")
        .expect("health request failed");

    println!(
        "Firmware {} battery {}% sd {:?}",
        health.version, health.battery, health.sd_card
    );
    assert!(health.battery <= 100);
}
