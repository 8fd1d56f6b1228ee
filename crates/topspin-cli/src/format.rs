//! Output formatting utilities for text, JSON, and CSV output.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use topspin_core::DiscoveredDevice;
use topspin_types::{DeviceHealth, format_bytes};

use crate::style;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Omit header row in CSV output.
    pub no_header: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            no_header: false,
            compact: false,
        }
    }

    /// Create with no_header option for CSV output.
    #[must_use]
    pub fn with_no_header(mut self, no_header: bool) -> Self {
        self.no_header = no_header;
        self
    }

    /// Create with compact JSON option.
    #[must_use]
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: serde::Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }
}

/// Escape a string for CSV output.
#[must_use]
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn format_scan_json(devices: &[DiscoveredDevice], opts: &FormatOptions) -> Result<String> {
    #[derive(Serialize)]
    struct ScanResult<'a> {
        count: usize,
        devices: Vec<DeviceJson<'a>>,
    }

    #[derive(Serialize)]
    struct DeviceJson<'a> {
        name: Option<&'a str>,
        id: &'a str,
        address: &'a str,
        rssi: Option<i16>,
        is_tracker: bool,
    }

    let result = ScanResult {
        count: devices.len(),
        devices: devices
            .iter()
            .map(|d| DeviceJson {
                name: d.name.as_deref(),
                id: &d.id,
                address: &d.address,
                rssi: d.rssi,
                is_tracker: d.is_tracker,
            })
            .collect(),
    };

    opts.as_json(&result)
}

/// Format scan results as a table.
#[must_use]
pub fn format_scan_text(devices: &[DiscoveredDevice], opts: &FormatOptions) -> String {
    use tabled::{Table, Tabled};

    if devices.is_empty() {
        return "No Topspin trackers found.\n".to_string();
    }

    let count_display = if opts.no_color {
        devices.len().to_string()
    } else {
        format!("{}", devices.len().to_string().green().bold())
    };
    let header = format!("Found {} device(s)\n\n", count_display);

    #[derive(Tabled)]
    struct DeviceRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Tracker")]
        tracker: String,
        #[tabled(rename = "Signal")]
        signal: String,
        #[tabled(rename = "Identifier")]
        id: String,
    }

    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|d| {
            let name = d.name.as_deref().unwrap_or("Unknown");
            DeviceRow {
                name: if opts.no_color {
                    name.to_string()
                } else {
                    format!("{}", name.cyan())
                },
                tracker: if d.is_tracker { "yes" } else { "no" }.to_string(),
                signal: style::format_signal_bar(d.rssi, opts.no_color),
                id: d.id.clone(),
            }
        })
        .collect();

    let mut table = Table::new(rows);
    style::apply_table_style(&mut table);

    format!("{}{}\n", header, table)
}

#[must_use]
pub fn format_scan_csv(devices: &[DiscoveredDevice], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "name,id,address,rssi,is_tracker\n".to_string()
    };
    for d in devices {
        output.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_escape(d.name.as_deref().unwrap_or("")),
            csv_escape(&d.id),
            csv_escape(&d.address),
            d.rssi.map(|r| r.to_string()).unwrap_or_default(),
            d.is_tracker,
        ));
    }
    output
}

/// Format a health snapshot as aligned key/value text.
#[must_use]
pub fn format_health_text(health: &DeviceHealth, opts: &FormatOptions) -> String {
    let mut output = String::new();
    let label = |s: &str| {
        if opts.no_color {
            format!("{:<12}", s)
        } else {
            format!("{:<12}", s.bold())
        }
    };

    output.push_str(&format!("{} {}\n", label("Firmware:"), health.version));
    output.push_str(&format!(
        "{} {}\n",
        label("Battery:"),
        style::format_battery_colored(health.battery, opts.no_color)
    ));
    match &health.sd_card {
        Some(sd) => {
            output.push_str(&format!(
                "{} {} of {} used\n",
                label("SD card:"),
                format_bytes(sd.used),
                format_bytes(sd.total)
            ));
        }
        None => {
            output.push_str(&format!("{} not reported\n", label("SD card:")));
        }
    }
    output
}

pub fn format_health_json(health: &DeviceHealth, opts: &FormatOptions) -> Result<String> {
    opts.as_json(health)
}

/// Format streamed samples as CSV lines.
#[must_use]
pub fn format_samples_csv(samples: &[u32], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "index,count\n".to_string()
    };
    for (i, sample) in samples.iter().enumerate() {
        output.push_str(&format!("{},{}\n", i, sample));
    }
    output
}
