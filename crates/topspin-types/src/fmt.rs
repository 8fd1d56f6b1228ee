//! Human-readable formatting helpers.

/// Units used by [`format_bytes`], base 1024.
const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count with base-1024 units and two decimal places.
///
/// # Examples
///
/// ```
/// use topspin_types::format_bytes;
///
/// assert_eq!(format_bytes(0), "0.00 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1_572_864), "1.50 MB");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
