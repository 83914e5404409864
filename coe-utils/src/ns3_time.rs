//! Conversion of the simulator's time encoding into decimal seconds.
//!
//! The simulator prints instants as a sign character, a nanosecond count, and the literal unit
//! suffix `ns`, e.g. `+1000000000ns` or `+1.2e+09ns`. Trace files mix this encoding with plain
//! decimal seconds, so callers usually go through [`try_ns_to_seconds`] and fall back to a plain
//! float parse when the suffix is missing.

use lazy_static::lazy_static;
use regex::Regex;

/// Value returned by [`ns_to_seconds`] when the input cannot be converted.
pub const SENTINEL_SECONDS: f64 = -40.0;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

lazy_static! {
    static ref NS_TIME: Regex =
        Regex::new(r"^(?P<sign>[+-])?(?P<value>[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?)ns$").unwrap();
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeError {
    #[error("`{0}` is not a nanosecond timestamp")]
    Malformed(String),
    #[error("`{0}` is not a finite number of nanoseconds")]
    NotFinite(String),
}

/// Convert a nanosecond-suffixed timestamp into seconds.
pub fn try_ns_to_seconds(raw: &str) -> Result<f64, TimeError> {
    let raw = raw.trim();
    let captures = NS_TIME
        .captures(raw)
        .ok_or_else(|| TimeError::Malformed(raw.to_string()))?;
    let nanos: f64 = captures["value"]
        .parse()
        .map_err(|_| TimeError::Malformed(raw.to_string()))?;
    if !nanos.is_finite() {
        return Err(TimeError::NotFinite(raw.to_string()));
    }
    let seconds = nanos / NANOS_PER_SECOND;
    Ok(match captures.name("sign").map(|s| s.as_str()) {
        Some("-") => -seconds,
        _ => seconds,
    })
}

/// Convert a nanosecond-suffixed timestamp into seconds, returning [`SENTINEL_SECONDS`] (and
/// logging the input) if it is malformed.
pub fn ns_to_seconds(raw: &str) -> f64 {
    match try_ns_to_seconds(raw) {
        Ok(seconds) => seconds,
        Err(e) => {
            log::warn!("Error in time conversion: {e}");
            SENTINEL_SECONDS
        }
    }
}
