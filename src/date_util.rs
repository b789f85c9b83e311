use chrono::{DateTime, Utc};

/// Format a duration in whole seconds as `2d 3h 4m 5s`, omitting zero
/// components. Zero and negative inputs render as `0s`.
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "0s".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 {
        parts.push(format!("{secs}s"));
    }
    parts.join(" ")
}

/// Compact timestamp used in suggested export filenames: `YYYYMMDD_HHMMSS`.
pub fn timestamp_key(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_duration_zero() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn test_format_duration_seconds_only() {
        assert_eq!(format_duration(42), "42s");
    }

    #[test]
    fn test_format_duration_full_breakdown() {
        // 2 days, 3 hours, 4 minutes, 5 seconds
        assert_eq!(format_duration(2 * 86_400 + 3 * 3_600 + 4 * 60 + 5), "2d 3h 4m 5s");
    }

    #[test]
    fn test_format_duration_skips_zero_components() {
        assert_eq!(format_duration(86_400 + 30), "1d 30s");
        assert_eq!(format_duration(3_600), "1h");
    }

    #[test]
    fn test_timestamp_key() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(timestamp_key(at), "20250307_090501");
    }
}
