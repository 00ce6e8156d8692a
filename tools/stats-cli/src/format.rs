//! Human readable durations for the statistics printout.

/// Short form for per-question and per-attempt times, e.g. `45s` or `2m 5s`.
pub fn short_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let (minutes, rest) = (seconds / 60, seconds % 60);
    if rest > 0 {
        format!("{minutes}m {rest}s")
    } else {
        format!("{minutes}m")
    }
}

/// Coarse form for accumulated study time, e.g. `12 min` or `3h 20m`.
pub fn time_spent(seconds: u64) -> String {
    if seconds < 3600 {
        return format!("{} min", seconds / 60);
    }
    let (hours, minutes) = (seconds / 3600, (seconds % 3600) / 60);
    if minutes > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{hours}h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_durations() {
        assert_eq!(short_duration(0), "0s");
        assert_eq!(short_duration(59), "59s");
        assert_eq!(short_duration(120), "2m");
        assert_eq!(short_duration(125), "2m 5s");
    }

    #[test]
    fn accumulated_time() {
        assert_eq!(time_spent(59), "0 min");
        assert_eq!(time_spent(1800), "30 min");
        assert_eq!(time_spent(7200), "2h");
        assert_eq!(time_spent(12_000), "3h 20m");
    }
}
