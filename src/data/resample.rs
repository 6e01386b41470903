//! Bar resampling
//!
//! Finer bars are grouped into fixed buckets counted from the Unix epoch, so
//! 60m, 240m and 1440m buckets land on the usual UTC clock boundaries and a
//! duration that does not divide a day (420m, say) still lands on the same
//! grid however many bars a caller fetched. Aggregation is open=first,
//! high=max, low=min, close=last, volume=sum (only when every constituent
//! carries volume).

use crate::models::Bar;
use chrono::{DateTime, Duration, Utc};

fn bucket_start(origin: DateTime<Utc>, t: DateTime<Utc>, bucket_minutes: i64) -> DateTime<Utc> {
    let offset = (t - origin).num_minutes();
    origin + Duration::minutes(offset.div_euclid(bucket_minutes) * bucket_minutes)
}

/// Group time-ordered bars into epoch-aligned `bucket_minutes` buckets
/// without trimming
pub fn aggregate(bars: &[Bar], bucket_minutes: i64) -> Vec<Bar> {
    aggregate_from(bars, bucket_minutes, DateTime::<Utc>::UNIX_EPOCH)
}

/// Group time-ordered bars into `bucket_minutes` buckets counted from `origin`
///
/// Buckets with no input bars are skipped rather than emitted empty.
pub fn aggregate_from(bars: &[Bar], bucket_minutes: i64, origin: DateTime<Utc>) -> Vec<Bar> {
    if bars.is_empty() || bucket_minutes <= 0 {
        return Vec::new();
    }

    let mut out: Vec<Bar> = Vec::new();

    for bar in bars {
        let start = bucket_start(origin, bar.open_time, bucket_minutes);

        match out.last_mut() {
            Some(current) if current.open_time == start => {
                current.high = current.high.max(bar.high);
                current.low = current.low.min(bar.low);
                current.close = bar.close;
                current.volume = match (current.volume, bar.volume) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                };
            }
            _ => out.push(Bar {
                open_time: start,
                close_time: start + Duration::minutes(bucket_minutes),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            }),
        }
    }

    out
}

/// Resample `input_minutes` bars into complete `requested_minutes` bars
///
/// The leading bucket is dropped unless it starts exactly on the first input
/// bar, and the trailing bucket is dropped unless its final constituent
/// (`start + requested - input`) is the last input bar. Every bar returned is
/// therefore backed by a full set of finer bars at both edges. The result may
/// be empty; callers treat that as missing data.
pub fn resample(bars: &[Bar], input_minutes: i64, requested_minutes: i64) -> Vec<Bar> {
    let (Some(first_input), Some(last_input)) = (bars.first(), bars.last()) else {
        return Vec::new();
    };

    let mut out = aggregate(bars, requested_minutes);

    if out.first().is_some_and(|b| b.open_time != first_input.open_time) {
        tracing::debug!(
            "Dropping partial leading {}m bucket at {}",
            requested_minutes,
            out[0].open_time
        );
        out.remove(0);
    }

    let trailing_offset = Duration::minutes(requested_minutes - input_minutes);
    if out
        .last()
        .is_some_and(|b| b.open_time + trailing_offset != last_input.open_time)
    {
        tracing::debug!("Dropping partial trailing {}m bucket", requested_minutes);
        out.pop();
    }

    out
}
