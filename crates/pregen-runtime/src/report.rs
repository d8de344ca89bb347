use std::time::Duration;

/// Human-readable breakdown such as `1 days, 2 hours, 5 minutes, 9 seconds`.
/// Leading zero units are left out; seconds are always present.
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{} days, ", days));
    }
    if hours > 0 {
        out.push_str(&format!("{} hours, ", hours % 24));
    }
    if minutes > 0 {
        out.push_str(&format!("{} minutes, ", minutes % 60));
    }
    out.push_str(&format!("{} seconds", seconds % 60));
    out
}

/// `[42.00%] ` style prefix for status lines.
pub fn progress_prefix(fraction: f64) -> String {
    format!("[{:.2}%] ", 100.0 * fraction.clamp(0.0, 1.0))
}
