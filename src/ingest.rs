//! Ingestion: raw sensor payload → flat, validated [`NormalizedRecord`]s.
//!
//! Two upstream layouts exist and exactly one is in force per deployment:
//!
//! - **Tree** (Firebase-style REST): `{ sensor: { timestamp_key: { field: value } } }`
//! - **Rows** (spreadsheet query): `[[sensor, time, temperature, humidity], ...]`
//!   or the same columns as objects.
//!
//! Likewise the timestamp contract ([`TimestampFormat`]) is a single
//! configured choice; keys in any other format are rejected rather than
//! guessed. Everything loosely typed stops here: downstream code only sees
//! `DateTime<Utc>` and `Option<f64>`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_HUMIDITY_FIELD, DEFAULT_TEMPERATURE_FIELD};
use crate::error::IngestError;
use crate::models::NormalizedRecord;

/// Column names used by the row layout when rows are objects.
const ROW_SENSOR: &str = "sensor";
const ROW_TIME: &str = "time";
const ROW_TEMPERATURE: &str = "temperature";
const ROW_HUMIDITY: &str = "humidity";

// ---

/// How timestamp keys are written by the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// Integer seconds since the Unix epoch. Already an instant.
    EpochSeconds,
    /// `DD/MM/YYYY HH:MM:SS`, local time in the configured zone.
    DayFirst,
    /// `YYYY-MM-DD HH:MM:SS`, local time in the configured zone.
    Iso,
}

impl TimestampFormat {
    pub const DAY_FIRST_PATTERN: &'static str = "%d/%m/%Y %H:%M:%S";
    pub const ISO_PATTERN: &'static str = "%Y-%m-%d %H:%M:%S";

    /// Parse one timestamp key into a UTC instant.
    ///
    /// Returns `None` if `raw` does not follow this format.
    pub fn parse(&self, raw: &str, zone: FixedOffset) -> Option<DateTime<Utc>> {
        // ---
        let raw = raw.trim();
        match self {
            Self::EpochSeconds => {
                let secs = raw.parse::<i64>().ok()?;
                DateTime::from_timestamp(secs, 0)
            }
            Self::DayFirst => parse_local(raw, Self::DAY_FIRST_PATTERN, zone),
            Self::Iso => parse_local(raw, Self::ISO_PATTERN, zone),
        }
    }

    fn expectation(&self) -> &'static str {
        match self {
            Self::EpochSeconds => "expected integer epoch seconds",
            Self::DayFirst => "expected DD/MM/YYYY HH:MM:SS",
            Self::Iso => "expected YYYY-MM-DD HH:MM:SS",
        }
    }
}

fn parse_local(raw: &str, pattern: &str, zone: FixedOffset) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, pattern).ok()?;
    zone.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

impl FromStr for TimestampFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "epoch" | "epoch_seconds" => Ok(Self::EpochSeconds),
            "day_first" | "dd/mm/yyyy" => Ok(Self::DayFirst),
            "iso" | "yyyy-mm-dd" => Ok(Self::Iso),
            other => Err(format!(
                "expected one of epoch, day_first, iso; got '{other}'"
            )),
        }
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EpochSeconds => "epoch",
            Self::DayFirst => "day_first",
            Self::Iso => "iso",
        })
    }
}

/// Shape of the raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLayout {
    Tree,
    Rows,
}

impl FromStr for SourceLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tree" => Ok(Self::Tree),
            "rows" => Ok(Self::Rows),
            other => Err(format!("expected tree or rows; got '{other}'")),
        }
    }
}

impl fmt::Display for SourceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tree => "tree",
            Self::Rows => "rows",
        })
    }
}

/// Convert a raw measurement into a finite float.
///
/// Numbers and numeric strings parse; null, missing, empty, non-numeric,
/// boolean and non-finite values are all absent.
pub fn parse_measurement(value: Option<&Value>) -> Option<f64> {
    // ---
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Stateless converter from raw payloads to records.
///
/// Cheap to clone and safe to share across concurrent requests.
#[derive(Debug, Clone)]
pub struct Ingestor {
    // ---
    layout: SourceLayout,
    format: TimestampFormat,
    zone: FixedOffset,
    temperature_field: String,
    humidity_field: String,
}

impl Ingestor {
    /// Tree-layout ingestor with the default field names.
    pub fn new(format: TimestampFormat, zone: FixedOffset) -> Self {
        Self {
            layout: SourceLayout::Tree,
            format,
            zone,
            temperature_field: DEFAULT_TEMPERATURE_FIELD.to_string(),
            humidity_field: DEFAULT_HUMIDITY_FIELD.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.timestamp_format, config.timezone)
            .with_layout(config.layout)
            .with_fields(&config.temperature_field, &config.humidity_field)
    }

    pub fn utc(format: TimestampFormat) -> Self {
        Self::new(format, Utc.fix())
    }

    pub fn with_layout(mut self, layout: SourceLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_fields(mut self, temperature: &str, humidity: &str) -> Self {
        self.temperature_field = temperature.to_string();
        self.humidity_field = humidity.to_string();
        self
    }

    pub fn layout(&self) -> SourceLayout {
        self.layout
    }

    /// Normalize `raw` according to the configured layout.
    pub fn ingest(&self, raw: &Value) -> Result<Vec<NormalizedRecord>, IngestError> {
        match self.layout {
            SourceLayout::Tree => self.normalize(raw),
            SourceLayout::Rows => self.normalize_rows(raw),
        }
    }

    /// Flatten a `sensor → timestamp → reading` tree.
    ///
    /// Output follows payload order; duplicates pass through. Malformed
    /// entries are skipped and logged. Fails with `EmptySource` when `raw` is
    /// not a mapping or yields no usable record.
    pub fn normalize(&self, raw: &Value) -> Result<Vec<NormalizedRecord>, IngestError> {
        // ---
        let sensors = match raw.as_object() {
            Some(map) if !map.is_empty() => map,
            _ => return Err(IngestError::EmptySource),
        };

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (sensor_id, readings) in sensors {
            let Some(readings) = readings.as_object() else {
                skipped += 1;
                debug!("Skipping sensor '{}': readings are not a mapping", sensor_id);
                continue;
            };

            for (key, reading) in readings {
                match self.record_from_tree(sensor_id, key, reading) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        skipped += 1;
                        debug!("Skipping entry: {}", e);
                    }
                }
            }
        }

        self.finish(records, skipped, sensors.len())
    }

    /// Flatten tabular rows with columns `sensor, time, temperature, humidity`.
    pub fn normalize_rows(&self, raw: &Value) -> Result<Vec<NormalizedRecord>, IngestError> {
        // ---
        let rows = match raw.as_array() {
            Some(rows) if !rows.is_empty() => rows,
            _ => return Err(IngestError::EmptySource),
        };

        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;

        for (i, row) in rows.iter().enumerate() {
            match self.record_from_row(i, row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    debug!("Skipping row: {}", e);
                }
            }
        }

        self.finish(records, skipped, rows.len())
    }

    fn finish(
        &self,
        records: Vec<NormalizedRecord>,
        skipped: usize,
        entries: usize,
    ) -> Result<Vec<NormalizedRecord>, IngestError> {
        // ---
        if skipped > 0 {
            warn!("Skipped {} malformed entries while ingesting", skipped);
        }
        if records.is_empty() {
            return Err(IngestError::EmptySource);
        }
        info!(
            "Normalized {} records from {} top-level {} entries",
            records.len(),
            entries,
            self.layout
        );
        Ok(records)
    }

    fn record_from_tree(
        &self,
        sensor_id: &str,
        key: &str,
        reading: &Value,
    ) -> Result<NormalizedRecord, IngestError> {
        // ---
        let fields = reading.as_object().ok_or_else(|| IngestError::Parse {
            sensor: sensor_id.to_string(),
            key: key.to_string(),
            reason: "reading is not a mapping".to_string(),
        })?;
        let timestamp = self.parse_timestamp(sensor_id, key)?;

        Ok(NormalizedRecord {
            sensor_id: sensor_id.to_string(),
            timestamp,
            temperature: parse_measurement(fields.get(&self.temperature_field)),
            humidity: parse_measurement(fields.get(&self.humidity_field)),
        })
    }

    fn record_from_row(&self, index: usize, row: &Value) -> Result<NormalizedRecord, IngestError> {
        // ---
        let (sensor, time, temperature, humidity) = match row {
            Value::Array(cells) => (cells.first(), cells.get(1), cells.get(2), cells.get(3)),
            Value::Object(cols) => (
                cols.get(ROW_SENSOR),
                cols.get(ROW_TIME),
                cols.get(ROW_TEMPERATURE),
                cols.get(ROW_HUMIDITY),
            ),
            _ => (None, None, None, None),
        };

        let row_err = |sensor: &str, reason: &str| IngestError::Parse {
            sensor: sensor.to_string(),
            key: format!("row {index}"),
            reason: reason.to_string(),
        };

        let sensor_id = cell_text(sensor).ok_or_else(|| row_err("?", "missing sensor"))?;
        let time = cell_text(time).ok_or_else(|| row_err(&sensor_id, "missing time"))?;
        let timestamp = self.parse_timestamp(&sensor_id, &time)?;

        Ok(NormalizedRecord {
            sensor_id,
            timestamp,
            temperature: parse_measurement(temperature),
            humidity: parse_measurement(humidity),
        })
    }

    fn parse_timestamp(&self, sensor_id: &str, key: &str) -> Result<DateTime<Utc>, IngestError> {
        self.format
            .parse(key, self.zone)
            .ok_or_else(|| IngestError::Parse {
                sensor: sensor_id.to_string(),
                key: key.to_string(),
                reason: self.format.expectation().to_string(),
            })
    }
}

/// Text of a string or integer cell; other cell types are treated as missing.
fn cell_text(cell: Option<&Value>) -> Option<String> {
    match cell? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}
