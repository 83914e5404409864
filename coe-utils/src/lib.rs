//! Utility library for the COE trace analysis

pub mod ns3_time;
pub mod other;

pub use ns3_time::{ns_to_seconds, try_ns_to_seconds, TimeError, SENTINEL_SECONDS};
