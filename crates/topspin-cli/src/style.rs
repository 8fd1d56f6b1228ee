//! Visual styling utilities for the CLI.
//!
//! Spinners for long-running operations, signal bars, and table styling.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard spinner tick interval
const SPINNER_TICK_MS: u64 = 80;

/// Get the standard spinner style.
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .expect("valid template")
        .tick_chars(SPINNER_TICK_CHARS)
}

/// Create a spinner for scanning operations.
pub fn scanning_spinner(timeout_secs: u64) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(format!(
        "Scanning for Topspin trackers... ({}s)",
        timeout_secs
    ));
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Create a spinner for connecting to a device.
pub fn connecting_spinner(device: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(format!("Connecting to {}...", device));
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Create a spinner for a generic long-running operation.
pub fn operation_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Format an RSSI value as a visual signal bar.
#[must_use]
pub fn format_signal_bar(rssi: Option<i16>, no_color: bool) -> String {
    let rssi = match rssi {
        Some(r) => r,
        None => return "N/A".to_string(),
    };

    // Normalize RSSI to 0-10 scale
    // -30 dBm = excellent (10), -100 dBm = very weak (0)
    let strength = ((rssi + 100).clamp(0, 70) as f32 / 7.0).round() as usize;
    let filled = strength.min(10);
    let empty = 10 - filled;

    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(empty));

    if no_color {
        format!("{} {:>3}", bar, rssi)
    } else if filled >= 7 {
        format!("{} {:>3}", bar.green(), rssi)
    } else if filled >= 4 {
        format!("{} {:>3}", bar.yellow(), rssi)
    } else {
        format!("{} {:>3}", bar.red(), rssi)
    }
}

/// Format a battery percentage with threshold colors.
#[must_use]
pub fn format_battery_colored(percent: u8, no_color: bool) -> String {
    let text = format!("{}%", percent);
    if no_color {
        text
    } else if percent >= 50 {
        format!("{}", text.green())
    } else if percent >= 20 {
        format!("{}", text.yellow())
    } else {
        format!("{}", text.red())
    }
}

/// Apply the standard table style.
pub fn apply_table_style(table: &mut tabled::Table) {
    use tabled::settings::Style;
    table.with(Style::rounded());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_bar_none() {
        assert_eq!(format_signal_bar(None, true), "N/A");
    }

    #[test]
    fn test_signal_bar_strong() {
        let bar = format_signal_bar(Some(-35), true);
        assert!(bar.contains("█"));
        assert!(bar.contains("-35"));
    }

    #[test]
    fn test_signal_bar_weak_mostly_empty() {
        let bar = format_signal_bar(Some(-95), true);
        assert!(bar.contains("░░░░░░░░░"));
    }

    #[test]
    fn test_battery_no_color() {
        assert_eq!(format_battery_colored(87, true), "87%");
        assert_eq!(format_battery_colored(10, true), "10%");
    }
}
