//! Recording session start/stop commands.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use topspin_core::DeviceHttpClient;

use crate::format::FormatOptions;

pub async fn cmd_session_start(url: &str, opts: &FormatOptions) -> Result<()> {
    let client = DeviceHttpClient::new(url).context("Invalid tracker URL")?;
    client
        .start_recording()
        .await
        .with_context(|| format!("Failed to start recording on tracker at {}", url))?;
    print_ok("Recording started.", opts);
    Ok(())
}

pub async fn cmd_session_stop(url: &str, opts: &FormatOptions) -> Result<()> {
    let client = DeviceHttpClient::new(url).context("Invalid tracker URL")?;
    client
        .stop_recording()
        .await
        .with_context(|| format!("Failed to stop recording on tracker at {}", url))?;
    print_ok("Recording stopped.", opts);
    Ok(())
}

fn print_ok(message: &str, opts: &FormatOptions) {
    if opts.no_color {
        println!("{}", message);
    } else {
        println!("{}", message.green());
    }
}
