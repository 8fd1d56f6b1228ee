//! IMU reset command implementation.

use anyhow::{Context, Result};
use topspin_core::DeviceHttpClient;

pub async fn cmd_reset(url: &str) -> Result<()> {
    let client = DeviceHttpClient::new(url).context("Invalid tracker URL")?;
    client
        .reset_imu()
        .await
        .with_context(|| format!("Failed to reset the inertial sensor on tracker at {}", url))?;
    println!("Inertial sensor re-zeroed. Keep the racket still for a moment.");
    Ok(())
}
