//! Live shot-count streaming command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;
use topspin_core::{DeviceEvent, EventDispatcher};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::format::{FormatOptions, format_samples_csv};
use crate::util::{connect_session, resolve_device, write_output};

#[allow(clippy::too_many_arguments)]
pub async fn cmd_stream(
    device: Option<String>,
    timeout: u64,
    count: Option<u64>,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
    config: &mut Config,
) -> Result<()> {
    let identifier = resolve_device(device, config).await?;

    let events = EventDispatcher::new(64);
    let mut rx = events.subscribe();

    let session = connect_session(&identifier, Duration::from_secs(timeout), events).await?;
    let name = session.device().and_then(|d| d.name);
    config.remember_device(&identifier, name.as_deref());

    session
        .start_streaming()
        .await
        .context("Failed to start streaming")?;

    if !quiet && matches!(format, OutputFormat::Text) {
        println!("Streaming shot counts. Press Ctrl-C to stop.\n");
    }

    let mut received: u64 = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !quiet {
                    eprintln!("\nStopping...");
                }
                break;
            }
            event = rx.recv() => {
                match event {
                    Ok(DeviceEvent::Sample { count: shots, .. }) => {
                        received += 1;
                        if matches!(format, OutputFormat::Text) {
                            print_sample(received, shots, opts);
                        }
                        if let Some(limit) = count
                            && received >= limit
                        {
                            break;
                        }
                    }
                    Ok(DeviceEvent::MalformedSample { len, .. }) => {
                        if !quiet {
                            eprintln!("Ignored malformed notification ({} bytes)", len);
                        }
                    }
                    Ok(DeviceEvent::Disconnected { reason, .. }) => {
                        eprintln!("Tracker disconnected: {}", reason);
                        break;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("Event stream lagged, skipped {} events", n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    let samples = session.samples().snapshot();
    session.disconnect().await.ok();

    match format {
        OutputFormat::Csv => write_output(output, &format_samples_csv(&samples, opts))?,
        OutputFormat::Json => write_output(output, &opts.as_json(&samples)?)?,
        OutputFormat::Text => {
            if let Some(path) = output {
                write_output(Some(path), &format_samples_csv(&samples, opts))?;
            }
            if !quiet {
                println!("\nReceived {} sample(s).", samples.len());
            }
        }
    }

    Ok(())
}

fn print_sample(index: u64, shots: u32, opts: &FormatOptions) {
    if opts.no_color {
        println!("[{:>4}] shots: {}", index, shots);
    } else {
        println!("[{:>4}] shots: {}", index, shots.to_string().cyan().bold());
    }
}
