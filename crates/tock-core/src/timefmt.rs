/// Renders a millisecond duration as `H:MM:SS`. Hours are not padded and
/// not capped, so longer durations never render shorter. Negative input is
/// treated as zero.
pub fn format_duration(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}

pub fn format_duration_u64(ms: u64) -> String {
    format_duration(i64::try_from(ms).unwrap_or(i64::MAX))
}

/// Milliseconds rounded to the nearest whole minute.
pub fn whole_minutes(ms: u64) -> u64 {
    ms.saturating_add(30_000) / 60_000
}

#[cfg(test)]
mod tests {
    use super::{format_duration, format_duration_u64, whole_minutes};

    #[test]
    fn zero_is_zero_seconds() {
        assert_eq!(format_duration(0), "0:00:00");
    }

    #[test]
    fn hour_minute_second() {
        assert_eq!(format_duration(3_661_000), "1:01:01");
    }

    #[test]
    fn sub_second_remainder_is_truncated() {
        assert_eq!(format_duration(59_999), "0:00:59");
    }

    #[test]
    fn negative_clamps_to_zero() {
        assert_eq!(format_duration(-5_000), "0:00:00");
    }

    #[test]
    fn long_durations_keep_growing() {
        assert_eq!(format_duration(36_000_000), "10:00:00");
        assert_eq!(format_duration_u64(360_000_000), "100:00:00");
    }

    #[test]
    fn minutes_round_to_nearest() {
        assert_eq!(whole_minutes(0), 0);
        assert_eq!(whole_minutes(29_999), 0);
        assert_eq!(whole_minutes(30_000), 1);
        assert_eq!(whole_minutes(120_000), 2);
        assert_eq!(whole_minutes(u64::MAX), u64::MAX / 60_000);
    }
}
