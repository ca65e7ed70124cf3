//! Human-readable byte sizes and transfer rates

use std::time::Duration;

const MARKERS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

fn scale(mut value: f64) -> (f64, &'static str) {
    let mut idx = 0;
    while value > 1024.0 && idx < MARKERS.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }
    (value, MARKERS[idx])
}

/// Format a byte count with base-1024 units and two decimals, e.g. `1.50KB`.
pub fn format_size(bytes: u64) -> String {
    let (value, marker) = scale(bytes as f64);
    format!("{value:.2}{marker}")
}

/// Format a transfer rate, e.g. `2.00MB/s`.
///
/// An elapsed time too short to measure reports the whole size per second.
pub fn format_speed(bytes: u64, elapsed: Duration) -> String {
    let seconds = elapsed.as_secs_f64();
    let rate = if seconds > 0.0 { bytes as f64 / seconds } else { bytes as f64 };
    let (value, marker) = scale(rate);
    format!("{value:.2}{marker}/s")
}
