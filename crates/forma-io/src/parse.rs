//! Tolerant value parsing.
//!
//! Design files carry vectors as `"x,y,z"` strings (comma, comma-space,
//! or space separated), thresholds that may end in `%`, and physical
//! quantities that may carry a unit token after whitespace. Malformed
//! input never aborts a load: it warns and defaults.

use glam::DVec3;
use tracing::warn;

/// Parses `"x,y,z"`, `"x, y, z"`, or `"x y z"` into a vector.
/// Malformed input yields the zero vector with a warning.
pub fn parse_vec(text: &str) -> DVec3 {
    let cleaned = text.replace(',', " ");
    let parts: Vec<f64> = cleaned
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .unwrap_or_default();
    if parts.len() == 3 {
        DVec3::new(parts[0], parts[1], parts[2])
    } else {
        warn!(
            input = %text,
            "malformed vector, expected \"value, value, value\""
        );
        DVec3::ZERO
    }
}

/// Parses a threshold that may carry a trailing `%` (divided by 100).
/// Malformed input yields `default` with a warning.
pub fn parse_threshold(text: &str, default: f64) -> f64 {
    let trimmed = text.trim();
    if let Some(percent) = trimmed.strip_suffix('%') {
        match percent.trim().parse::<f64>() {
            Ok(v) => return v / 100.0,
            Err(_) => {
                warn!(input = %text, "malformed percent threshold");
                return default;
            }
        }
    }
    match trimmed.parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            warn!(input = %text, "malformed threshold");
            default
        }
    }
}

/// Parses a quantity that may carry a unit token after whitespace,
/// e.g. `"70e9 Pa"`. Returns the value and the unit, if any.
pub fn parse_quantity(text: &str) -> (f64, Option<String>) {
    let mut parts = text.split_whitespace();
    let value = parts
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or_else(|| {
            warn!(input = %text, "malformed quantity");
            0.0
        });
    (value, parts.next().map(str::to_owned))
}

/// Negative durations mean "forever".
pub fn normalize_duration(seconds: f64) -> f64 {
    if seconds < 0.0 {
        f64::INFINITY
    } else {
        seconds
    }
}
