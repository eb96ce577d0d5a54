//! Target alignment: re-index the raw series so that each row's values
//! describe the hour 24h *after* its timestamp.
//!
//! The operator's convention is "the row at T holds the forecast/actual
//! for the hour starting at T". The pipeline wants "at T we know (or will
//! later know) the load at T+24h", so every timestamp is set back by 24
//! hours and the value columns become `day_later_forecast` /
//! `day_later_load`. The series is then forced onto a strict 1h grid with
//! all-null rows where hours are missing, which lets every downstream lag
//! and rolling computation use fixed integer offsets.

use std::collections::BTreeMap;

use chrono::Duration;

use crate::data::types::{floor_to_hour, AlignedObservation, AlignedSeries, RawSeries, Timestamp};

/// Align a cleaned raw series. The input index must already be unique and
/// sorted (guaranteed by the quality enforcer); a violated precondition is
/// a programming error.
pub fn align(raw: &RawSeries) -> AlignedSeries {
    debug_assert!(raw.is_sorted(), "align() requires a sorted series");
    debug_assert!(
        raw.has_unique_timestamps(),
        "align() requires unique timestamps"
    );

    if raw.is_empty() {
        return AlignedSeries::default();
    }

    // Shift back 24h and bucket onto hour boundaries. If two shifted rows
    // land in the same bucket the per-column minimum wins (resample-min
    // semantics).
    let mut buckets: BTreeMap<Timestamp, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for row in raw.rows() {
        let bucket = floor_to_hour(row.timestamp - Duration::hours(24));
        let entry = buckets.entry(bucket).or_insert((None, None));
        entry.0 = merge_min(entry.0, row.forecast);
        entry.1 = merge_min(entry.1, row.load);
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return AlignedSeries::default();
    };

    let hours = (last - first).num_hours();
    let mut rows = Vec::with_capacity(hours as usize + 1);
    for i in 0..=hours {
        let timestamp = first + Duration::hours(i);
        let (day_later_forecast, day_later_load) =
            buckets.get(&timestamp).copied().unwrap_or((None, None));
        rows.push(AlignedObservation {
            timestamp,
            day_later_forecast,
            day_later_load,
        });
    }

    AlignedSeries::from_rows(rows)
}

fn merge_min(current: Option<f64>, incoming: Option<f64>) -> Option<f64> {
    match (current, incoming) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::test_support::ts;
    use crate::data::types::RawObservation;
    use chrono::{TimeZone, Utc};

    fn obs(timestamp: Timestamp, forecast: Option<f64>, load: Option<f64>) -> RawObservation {
        RawObservation {
            timestamp,
            forecast,
            load,
        }
    }

    #[test]
    fn load_at_t_becomes_day_later_load_at_t_minus_24h() {
        let t = ts(2024, 6, 10, 15);
        let raw = RawSeries::from_rows(vec![obs(t, Some(7100.0), Some(6950.0))]);

        let aligned = align(&raw);
        let row = aligned.get(t - Duration::hours(24)).unwrap();
        assert_eq!(row.day_later_load, Some(6950.0));
        assert_eq!(row.day_later_forecast, Some(7100.0));
    }

    #[test]
    fn missing_hours_become_all_null_rows() {
        let raw = RawSeries::from_rows(vec![
            obs(ts(2024, 1, 1, 21), Some(7890.0), None),
            obs(ts(2024, 1, 1, 22), None, Some(7890.0)),
            // 23:00 missing
            obs(ts(2024, 1, 2, 0), Some(7890.0), None),
        ]);

        let aligned = align(&raw);
        assert_eq!(aligned.len(), 4);
        let gap = &aligned.rows()[2];
        assert_eq!(gap.timestamp, ts(2023, 12, 31, 23));
        assert_eq!(gap.day_later_forecast, None);
        assert_eq!(gap.day_later_load, None);
    }

    #[test]
    fn consecutive_rows_are_exactly_one_hour_apart() {
        let raw = RawSeries::from_rows(vec![
            obs(ts(2024, 1, 1, 0), None, Some(1.0)),
            obs(ts(2024, 1, 1, 5), None, Some(2.0)),
            obs(ts(2024, 1, 2, 3), None, Some(3.0)),
        ]);

        let aligned = align(&raw);
        for w in aligned.rows().windows(2) {
            assert_eq!(w[1].timestamp - w[0].timestamp, Duration::hours(1));
        }
        // 00:00 of Jan 1 shifted to Dec 31 00:00, through Jan 1 03:00
        assert_eq!(aligned.len(), 28);
    }

    #[test]
    fn sub_hour_timestamps_floor_onto_the_grid() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 23, 45, 0).unwrap();
        let raw = RawSeries::from_rows(vec![obs(t, Some(7890.0), None)]);

        let aligned = align(&raw);
        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned.rows()[0].timestamp, ts(2023, 12, 31, 23));
    }

    #[test]
    fn empty_series_aligns_to_empty() {
        assert!(align(&RawSeries::new()).is_empty());
    }
}
