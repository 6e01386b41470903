use crate::models::Bar;
use chrono::{DateTime, Utc};

/// Two minutes of slack on top of the bar period before data counts as late
pub const DEFAULT_STALE_THRESHOLD_SECS: i64 = 120;

/// Decide whether the freshest bar is too old to trade on
///
/// Data is stale when `now - latest_close` exceeds one nominal bar period plus
/// `threshold_seconds`. An empty series is always stale.
pub fn is_stale(
    bars: &[Bar],
    nominal_duration_minutes: i64,
    now: DateTime<Utc>,
    threshold_seconds: i64,
) -> bool {
    let Some(latest_close) = bars.iter().map(|b| b.close_time).max() else {
        tracing::warn!("No bars returned, treating data as stale");
        return true;
    };

    let age_secs = (now - latest_close).num_milliseconds() as f64 / 1000.0;
    let limit_secs = (nominal_duration_minutes * 60 + threshold_seconds) as f64;

    if age_secs > limit_secs {
        tracing::warn!(
            "Stale data: last close {} is {:.0}s old (limit {:.0}s)",
            latest_close.format("%Y-%m-%d %H:%M:%S"),
            age_secs,
            limit_secs
        );
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn create_test_bar(close_time: DateTime<Utc>, minutes: i64) -> Bar {
        Bar::from_close(close_time, minutes, 100.0, 101.0, 99.0, 100.0, Some(10.0))
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_series_is_stale() {
        assert!(is_stale(&[], 1, base_time(), DEFAULT_STALE_THRESHOLD_SECS));
    }

    #[test]
    fn test_within_threshold_not_stale() {
        let bars = vec![create_test_bar(base_time(), 30)];
        // 30 min period + 119s: under the limit
        let now = base_time() + Duration::seconds(30 * 60 + 119);
        assert!(!is_stale(&bars, 30, now, DEFAULT_STALE_THRESHOLD_SECS));
    }

    #[test]
    fn test_exactly_at_limit_not_stale() {
        let bars = vec![create_test_bar(base_time(), 30)];
        let now = base_time() + Duration::seconds(30 * 60 + 120);
        assert!(!is_stale(&bars, 30, now, DEFAULT_STALE_THRESHOLD_SECS));
    }

    #[test]
    fn test_one_second_over_is_stale() {
        let bars = vec![create_test_bar(base_time(), 30)];
        let now = base_time() + Duration::seconds(30 * 60 + 121);
        assert!(is_stale(&bars, 30, now, DEFAULT_STALE_THRESHOLD_SECS));
    }

    #[test]
    fn test_uses_latest_close_regardless_of_order() {
        let bars = vec![
            create_test_bar(base_time(), 1),
            create_test_bar(base_time() - Duration::minutes(10), 1),
        ];
        let now = base_time() + Duration::seconds(60);
        assert!(!is_stale(&bars, 1, now, DEFAULT_STALE_THRESHOLD_SECS));
    }
}
