//! Phone-side WiFi control for joining the tracker's access point.
//!
//! This module provides [`SystemWifi`], a [`WifiTransport`] that drives the
//! host's network manager (`nmcli` on Linux) through subprocess calls. The
//! tracker's AP is an open network, so joins carry no credentials.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::WifiTransport;

/// Default SSID advertised by the tracker's access point.
pub const TRACKER_SSID: &str = "Topspin-Tracker";

/// WiFi transport backed by the system's network manager.
#[derive(Debug, Clone, Default)]
pub struct SystemWifi;

impl SystemWifi {
    /// Create a new system WiFi transport.
    pub fn new() -> Self {
        Self
    }

    /// Run nmcli and collect stdout, mapping failures to crate errors.
    async fn nmcli(args: &[&str]) -> Result<String> {
        debug!("nmcli {}", args.join(" "));
        let output = Command::new("nmcli").args(args).output().await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.contains("not authorized") || stderr.contains("Insufficient privileges") {
                Err(Error::PermissionDenied(stderr.to_string()))
            } else {
                Err(Error::InvalidData(format!(
                    "nmcli exited with {}: {}",
                    output.status, stderr
                )))
            }
        }
    }
}

#[async_trait]
impl WifiTransport for SystemWifi {
    #[tracing::instrument(level = "info", skip(self))]
    async fn join(&self, ssid: &str) -> Result<()> {
        info!("Joining tracker network '{}'", ssid);
        Self::nmcli(&["device", "wifi", "connect", ssid])
            .await
            .map_err(|e| match e {
                Error::PermissionDenied(_) | Error::Io(_) => e,
                other => Error::NetworkJoinFailed {
                    ssid: ssid.to_string(),
                    reason: other.to_string(),
                },
            })?;
        Ok(())
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn leave(&self, ssid: &str) -> Result<()> {
        info!("Leaving tracker network '{}'", ssid);
        // Dropping the connection lets the manager fall back to the
        // previously active network on its own.
        if let Err(e) = Self::nmcli(&["connection", "down", "id", ssid]).await {
            warn!("Could not leave '{}' cleanly: {}", ssid, e);
        }
        // Forget the profile so the phone does not auto-rejoin a network
        // with no internet access.
        if let Err(e) = Self::nmcli(&["connection", "delete", "id", ssid]).await {
            debug!("Could not delete profile '{}': {}", ssid, e);
        }
        Ok(())
    }

    async fn current_ssid(&self) -> Result<Option<String>> {
        let output = Self::nmcli(&["-t", "-f", "active,ssid", "device", "wifi"]).await?;
        for line in output.lines() {
            // Terse output: "yes:MySsid"
            if let Some(ssid) = line.strip_prefix("yes:") {
                let ssid = ssid.trim();
                if !ssid.is_empty() {
                    return Ok(Some(ssid.to_string()));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_ssid_constant() {
        assert_eq!(TRACKER_SSID, "Topspin-Tracker");
    }
}
