//! Sensor + date-window filtering and summary metrics.
//!
//! Everything here is a pure function of its inputs. The only configuration
//! is the zone whose calendar days a [`Window`] refers to.

use chrono::{FixedOffset, Offset, Utc};

use crate::models::{AggregateSummary, NormalizedRecord, Window};

// ---

#[derive(Debug, Clone, Copy)]
pub struct WindowAggregator {
    zone: FixedOffset,
}

impl WindowAggregator {
    pub fn new(zone: FixedOffset) -> Self {
        Self { zone }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    /// Records of `sensor_id` inside `window`, in input order.
    ///
    /// The window is `[start 00:00, (end + 1 day) 00:00)` in the aggregator's
    /// zone, so every reading on the end date is kept.
    pub fn filter(
        &self,
        records: &[NormalizedRecord],
        sensor_id: &str,
        window: &Window,
    ) -> Vec<NormalizedRecord> {
        // ---
        let (from, until) = window.bounds(self.zone);
        records
            .iter()
            .filter(|r| r.sensor_id == sensor_id)
            .filter(|r| r.timestamp >= from && r.timestamp < until)
            .cloned()
            .collect()
    }

    /// Window covering every record, by calendar date in this zone.
    pub fn default_window(&self, records: &[NormalizedRecord]) -> Option<Window> {
        Window::spanning(records, self.zone)
    }
}

/// Min/max per column and the latest reading.
///
/// Absent values are ignored; a column with nothing present reports `None`
/// for both bounds. When several records share the latest timestamp the
/// first of them in `records` order supplies the latest reading.
pub fn summarize(records: &[NormalizedRecord]) -> AggregateSummary {
    // ---
    let mut temp: Option<(f64, f64)> = None;
    let mut humidity: Option<(f64, f64)> = None;
    let mut latest: Option<&NormalizedRecord> = None;

    for r in records {
        widen(&mut temp, r.temperature);
        widen(&mut humidity, r.humidity);

        // Strict comparison keeps the first record on ties
        if latest.map_or(true, |l| r.timestamp > l.timestamp) {
            latest = Some(r);
        }
    }

    AggregateSummary {
        temp_min: temp.map(|(lo, _)| lo),
        temp_max: temp.map(|(_, hi)| hi),
        humidity_min: humidity.map(|(lo, _)| lo),
        humidity_max: humidity.map(|(_, hi)| hi),
        latest_timestamp: latest.map(|r| r.timestamp),
        latest_temperature: latest.and_then(|r| r.temperature),
        latest_humidity: latest.and_then(|r| r.humidity),
    }
}

fn widen(range: &mut Option<(f64, f64)>, value: Option<f64>) {
    let Some(v) = value else { return };
    *range = Some(match *range {
        Some((lo, hi)) => (lo.min(v), hi.max(v)),
        None => (v, v),
    });
}

/// Stable ascending sort by timestamp.
pub fn sort_by_timestamp(records: &mut [NormalizedRecord]) {
    records.sort_by_key(|r| r.timestamp);
}

/// Distinct sensor ids in first-seen order.
pub fn sensors(records: &[NormalizedRecord]) -> Vec<String> {
    // ---
    let mut ids: Vec<String> = Vec::new();
    for r in records {
        if !ids.iter().any(|id| id == &r.sensor_id) {
            ids.push(r.sensor_id.clone());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone};

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rec(
        sensor: &str,
        at: DateTime<Utc>,
        temperature: Option<f64>,
        humidity: Option<f64>,
    ) -> NormalizedRecord {
        NormalizedRecord {
            sensor_id: sensor.to_string(),
            timestamp: at,
            temperature,
            humidity,
        }
    }

    #[test]
    fn test_end_of_day_is_included() {
        // ---
        let records = vec![rec("S1", ts(2023, 11, 14, 23, 59, 59), Some(20.0), Some(50.0))];
        let window = Window::new(date(2023, 11, 14), date(2023, 11, 14)).unwrap();

        let filtered = WindowAggregator::utc().filter(&records, "S1", &window);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_filter_bounds_and_sensor() {
        // ---
        let records = vec![
            rec("S1", ts(2023, 11, 13, 23, 59, 59), Some(1.0), None),
            rec("S1", ts(2023, 11, 14, 0, 0, 0), Some(2.0), None),
            rec("S2", ts(2023, 11, 14, 12, 0, 0), Some(3.0), None),
            rec("S1", ts(2023, 11, 15, 23, 59, 59), Some(4.0), None),
            rec("S1", ts(2023, 11, 16, 0, 0, 0), Some(5.0), None),
        ];
        let window = Window::new(date(2023, 11, 14), date(2023, 11, 15)).unwrap();

        let filtered = WindowAggregator::utc().filter(&records, "S1", &window);
        let temps: Vec<Option<f64>> = filtered.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![Some(2.0), Some(4.0)]);
    }

    #[test]
    fn test_spanning_window_keeps_everything() {
        // ---
        let records = vec![
            rec("S1", ts(2023, 11, 14, 0, 0, 0), Some(20.0), Some(40.0)),
            rec("S1", ts(2023, 11, 15, 9, 30, 0), None, Some(41.0)),
            rec("S1", ts(2023, 11, 17, 23, 59, 59), Some(22.0), None),
        ];
        let agg = WindowAggregator::utc();
        let window = agg.default_window(&records).unwrap();

        assert_eq!(agg.filter(&records, "S1", &window), records);
    }

    #[test]
    fn test_filter_in_offset_zone() {
        // ---
        let brt = FixedOffset::west_opt(3 * 3600).unwrap();
        let agg = WindowAggregator::new(brt);
        let records = vec![
            // 2023-11-13 23:30 local
            rec("S1", ts(2023, 11, 14, 2, 30, 0), Some(1.0), None),
            // 2023-11-14 23:59:59 local
            rec("S1", ts(2023, 11, 15, 2, 59, 59), Some(2.0), None),
        ];
        let window = Window::single_day(date(2023, 11, 14));

        let filtered = agg.filter(&records, "S1", &window);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].temperature, Some(2.0));
    }

    #[test]
    fn test_inverted_window_fields_yield_nothing() {
        // ---
        let records = vec![rec("S1", ts(2023, 11, 14, 12, 0, 0), Some(1.0), None)];
        let window = Window {
            start: date(2023, 11, 15),
            end: date(2023, 11, 13),
        };
        assert!(WindowAggregator::utc().filter(&records, "S1", &window).is_empty());
    }

    #[test]
    fn test_summarize_empty() {
        // ---
        let summary = summarize(&[]);
        assert_eq!(summary, AggregateSummary::default());
        assert!(summary.is_empty());
    }

    #[test]
    fn test_summarize_ignores_absent() {
        // ---
        let records = vec![
            rec("S1", ts(2023, 11, 14, 8, 0, 0), Some(21.5), None),
            rec("S1", ts(2023, 11, 14, 9, 0, 0), None, Some(58.0)),
            rec("S1", ts(2023, 11, 14, 7, 0, 0), Some(-3.0), Some(61.0)),
        ];
        let summary = summarize(&records);

        assert_eq!(summary.temp_min, Some(-3.0));
        assert_eq!(summary.temp_max, Some(21.5));
        assert_eq!(summary.humidity_min, Some(58.0));
        assert_eq!(summary.humidity_max, Some(61.0));
        assert_eq!(summary.latest_timestamp, Some(ts(2023, 11, 14, 9, 0, 0)));
        assert_eq!(summary.latest_temperature, None);
        assert_eq!(summary.latest_humidity, Some(58.0));
    }

    #[test]
    fn test_summarize_all_absent_column() {
        // ---
        let records = vec![
            rec("S1", ts(2023, 11, 14, 8, 0, 0), None, Some(50.0)),
            rec("S1", ts(2023, 11, 14, 9, 0, 0), None, Some(52.0)),
        ];
        let summary = summarize(&records);

        assert_eq!(summary.temp_min, None);
        assert_eq!(summary.temp_max, None);
        assert_eq!(summary.humidity_min, Some(50.0));
        assert_eq!(summary.humidity_max, Some(52.0));
    }

    #[test]
    fn test_summarize_min_not_above_max() {
        // ---
        let values = [12.5, -1.0, 33.0, 0.0, 7.25];
        let records: Vec<NormalizedRecord> = values
            .iter()
            .enumerate()
            .map(|(i, v)| rec("S1", ts(2023, 11, 14, i as u32, 0, 0), Some(*v), Some(100.0 - v)))
            .collect();
        let summary = summarize(&records);

        assert!(summary.temp_min.unwrap() <= summary.temp_max.unwrap());
        assert!(summary.humidity_min.unwrap() <= summary.humidity_max.unwrap());
        assert_eq!(summary.temp_min, Some(-1.0));
        assert_eq!(summary.temp_max, Some(33.0));
    }

    #[test]
    fn test_latest_tie_takes_first() {
        // ---
        let at = ts(2023, 11, 14, 12, 0, 0);
        let records = vec![
            rec("S1", ts(2023, 11, 14, 11, 0, 0), Some(10.0), Some(10.0)),
            rec("S1", at, Some(20.0), Some(40.0)),
            rec("S1", at, Some(30.0), Some(45.0)),
        ];
        let summary = summarize(&records);

        assert_eq!(summary.latest_timestamp, Some(at));
        assert_eq!(summary.latest_temperature, Some(20.0));
        assert_eq!(summary.latest_humidity, Some(40.0));
    }

    #[test]
    fn test_sort_is_stable() {
        // ---
        let at = ts(2023, 11, 14, 12, 0, 0);
        let mut records = vec![
            rec("S1", at, Some(1.0), None),
            rec("S1", ts(2023, 11, 14, 10, 0, 0), Some(2.0), None),
            rec("S1", at, Some(3.0), None),
        ];
        sort_by_timestamp(&mut records);

        let temps: Vec<Option<f64>> = records.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![Some(2.0), Some(1.0), Some(3.0)]);
    }

    #[test]
    fn test_sensors_first_seen_order() {
        // ---
        let at = ts(2023, 11, 14, 12, 0, 0);
        let records = vec![
            rec("B", at, None, None),
            rec("A", at, None, None),
            rec("B", at, None, None),
        ];
        assert_eq!(sensors(&records), vec!["B".to_string(), "A".to_string()]);
        assert!(sensors(&[]).is_empty());
    }
}
