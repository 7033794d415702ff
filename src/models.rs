//! Data models shared by ingestion, aggregation and the HTTP layer.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WindowError;

// ---

/// One reading after validation at the ingestion boundary.
///
/// `timestamp` is always a valid UTC instant with second precision. Numeric
/// fields are finite or `None`; a missing or unparseable value is never
/// represented as `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    // ---
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

/// Inclusive calendar date range selected by the user.
///
/// Both ends are whole days. Against instants the range is applied as
/// `[start 00:00, (end + 1 day) 00:00)` in the configured zone, so readings
/// late on the `end` date are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    // ---
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    // ---
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Window running from the earliest to the latest record date in `zone`.
    ///
    /// Returns `None` when there are no records.
    pub fn spanning(records: &[NormalizedRecord], zone: FixedOffset) -> Option<Self> {
        // ---
        let first = records.iter().map(|r| r.timestamp).min()?;
        let last = records.iter().map(|r| r.timestamp).max()?;

        Some(Self {
            start: first.with_timezone(&zone).date_naive(),
            end: last.with_timezone(&zone).date_naive(),
        })
    }

    /// Half-open instant bounds `[from, until)` for this window in `zone`.
    pub fn bounds(&self, zone: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        // ---
        let from = local_midnight(self.start, zone).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let until = self
            .end
            .succ_opt()
            .and_then(|next| local_midnight(next, zone))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (from, until)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>, zone: FixedOffset) -> bool {
        let (from, until) = self.bounds(zone);
        timestamp >= from && timestamp < until
    }
}

fn local_midnight(day: NaiveDate, zone: FixedOffset) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&day.and_time(NaiveTime::MIN))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Metrics over a filtered window. Every field is `None` for an empty window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateSummary {
    // ---
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub humidity_min: Option<f64>,
    pub humidity_max: Option<f64>,
    pub latest_timestamp: Option<DateTime<Utc>>,
    pub latest_temperature: Option<f64>,
    pub latest_humidity: Option<f64>,
}

impl AggregateSummary {
    pub fn is_empty(&self) -> bool {
        self.latest_timestamp.is_none()
    }
}

/// Parallel series for a two-axis temperature/humidity chart.
///
/// Absent values stay `None` so the chart draws a gap instead of a zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    // ---
    pub times: Vec<DateTime<Utc>>,
    pub temperature: Vec<Option<f64>>,
    pub humidity: Vec<Option<f64>>,
}

impl ChartSeries {
    /// Build series in the order given; callers sort by timestamp first.
    pub fn from_records(records: &[NormalizedRecord]) -> Self {
        // ---
        let mut series = Self {
            times: Vec::with_capacity(records.len()),
            temperature: Vec::with_capacity(records.len()),
            humidity: Vec::with_capacity(records.len()),
        };
        for r in records {
            series.times.push(r.timestamp);
            series.temperature.push(r.temperature);
            series.humidity.push(r.humidity);
        }
        series
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}
