//! Module containing some utility functions that didn't fit anywhere else.

use time::{format_description, OffsetDateTime};

/// Produces a timestamp `String` of the current time in YYYY-MM-DD_HH-mm-SS format.
pub fn get_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_description::parse("[year]-[month]-[day]_[hour]-[minute]-[second]")
        .ok()
        .and_then(|format| now.format(&format).ok())
        .unwrap_or_else(|| now.unix_timestamp().to_string())
}

/// Format a value of an x-axis the way the simulator writes it into file names: integral values
/// without a fractional part, everything else with the shortest exact representation.
pub fn format_axis_value(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{x:.0}")
    } else {
        format!("{x}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn axis_values() {
        assert_eq!(format_axis_value(10.0), "10");
        assert_eq!(format_axis_value(555.625), "555.625");
        assert_eq!(format_axis_value(2247210.0), "2247210");
    }

    #[test]
    fn timestamp_shape() {
        let ts = get_timestamp();
        assert_eq!(ts.len(), "2024-06-13_22-59-00".len());
        assert_eq!(ts.matches('_').count(), 1);
    }
}
