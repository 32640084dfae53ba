use std::time::Duration;

/// Format a `Duration` as a human-readable string with automatic unit scaling.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}
