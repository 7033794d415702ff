//! Configuration loader for the `codemetal-sensordash` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Nothing else in the crate reads the environment:
//! the source client and the ingestion pipeline receive an explicit [`Config`]
//! at construction time.
//!
use std::{env, fmt, time::Duration};

use anyhow::{anyhow, Result};
use chrono::{FixedOffset, Offset, Utc};

use crate::ingest::{SourceLayout, TimestampFormat};

/// Parse an optional environment variable into any `FromStr` type, with a default.
macro_rules! parse_env {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Default field name carrying the temperature inside a reading.
pub const DEFAULT_TEMPERATURE_FIELD: &str = "Temp: ";

/// Default field name carrying the relative humidity inside a reading.
pub const DEFAULT_HUMIDITY_FIELD: &str = "Umid: ";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Clone)]
pub struct Config {
    // ---
    /// JSON endpoint serving the raw reading payload.
    pub source_url: String,

    /// Optional auth token appended as `?auth=` (Firebase REST convention).
    pub source_auth: Option<String>,

    /// Shape of the payload served by `source_url`.
    pub layout: SourceLayout,

    /// The one timestamp contract the upstream source follows.
    pub timestamp_format: TimestampFormat,

    /// Zone used for local-time timestamp strings and window day boundaries.
    pub timezone: FixedOffset,

    /// Field name of the temperature value inside a reading.
    pub temperature_field: String,

    /// Field name of the humidity value inside a reading.
    pub humidity_field: String,

    /// How long a fetched payload is reused before refetching.
    pub cache_ttl_secs: u64,

    /// Timeout for a single upstream request.
    pub http_timeout_secs: u64,

    /// Port the HTTP server binds to.
    pub bind_port: u16,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `SENSOR_SOURCE_URL` – JSON endpoint serving raw readings
///
/// Optional:
/// - `SENSOR_SOURCE_AUTH` – auth token for the endpoint (default: none)
/// - `SOURCE_LAYOUT` – `tree` or `rows` (default: `tree`)
/// - `TIMESTAMP_FORMAT` – `epoch`, `day_first` or `iso` (default: `epoch`)
/// - `SENSOR_TIMEZONE` – `UTC` or a fixed offset like `-03:00` (default: `UTC`)
/// - `TEMPERATURE_FIELD` / `HUMIDITY_FIELD` – reading field names
/// - `CACHE_TTL_SECS` – payload memoization window (default: 600)
/// - `HTTP_TIMEOUT_SECS` – upstream request timeout (default: 30)
/// - `BIND_PORT` – HTTP listen port (default: 8080)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    load_from(|name| env::var(name).ok())
}

/// Load configuration through an arbitrary variable lookup.
///
/// `load_from_env` is this function over the process environment; tests pass
/// a map instead so they never mutate global state.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let source_url = require_env!(lookup, "SENSOR_SOURCE_URL");
    let source_auth = lookup("SENSOR_SOURCE_AUTH").filter(|v| !v.trim().is_empty());
    let layout = parse_env!(lookup, "SOURCE_LAYOUT", SourceLayout, SourceLayout::Tree);
    let timestamp_format = parse_env!(
        lookup,
        "TIMESTAMP_FORMAT",
        TimestampFormat,
        TimestampFormat::EpochSeconds
    );
    let timezone = match lookup("SENSOR_TIMEZONE") {
        Some(v) => parse_timezone(&v)?,
        None => utc_offset(),
    };
    let temperature_field =
        lookup("TEMPERATURE_FIELD").unwrap_or_else(|| DEFAULT_TEMPERATURE_FIELD.to_string());
    let humidity_field =
        lookup("HUMIDITY_FIELD").unwrap_or_else(|| DEFAULT_HUMIDITY_FIELD.to_string());
    let cache_ttl_secs = parse_env!(lookup, "CACHE_TTL_SECS", u64, 600);
    let http_timeout_secs = parse_env!(lookup, "HTTP_TIMEOUT_SECS", u64, 30);
    let bind_port = parse_env!(lookup, "BIND_PORT", u16, 8080);

    if http_timeout_secs == 0 {
        return Err(anyhow!("Invalid HTTP_TIMEOUT_SECS: must be greater than zero"));
    }

    Ok(Config {
        source_url,
        source_auth,
        layout,
        timestamp_format,
        timezone,
        temperature_field,
        humidity_field,
        cache_ttl_secs,
        http_timeout_secs,
        bind_port,
    })
}

/// Parse `UTC`/`Z` or a `+HH:MM` / `-HH:MM` offset.
fn parse_timezone(raw: &str) -> Result<FixedOffset> {
    // ---
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("utc") || raw == "Z" {
        return Ok(utc_offset());
    }
    raw.parse::<FixedOffset>()
        .map_err(|e| anyhow!("Invalid SENSOR_TIMEZONE '{}': expected UTC or +HH:MM ({})", raw, e))
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

// The auth token never reaches logs or panic messages.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("source_url", &self.source_url)
            .field("source_auth", &self.source_auth.as_ref().map(|_| "****"))
            .field("layout", &self.layout)
            .field("timestamp_format", &self.timestamp_format)
            .field("timezone", &self.timezone)
            .field("temperature_field", &self.temperature_field)
            .field("humidity_field", &self.humidity_field)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("bind_port", &self.bind_port)
            .finish()
    }
}

impl Config {
    /// Payload memoization window.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Upstream request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the source auth token while showing all other configuration
    /// values that were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_auth = match &self.source_auth {
            Some(_) => "****",
            None => "(none)",
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  SENSOR_SOURCE_URL  : {}", self.source_url);
        tracing::info!("  SENSOR_SOURCE_AUTH : {}", masked_auth);
        tracing::info!("  SOURCE_LAYOUT      : {}", self.layout);
        tracing::info!("  TIMESTAMP_FORMAT   : {}", self.timestamp_format);
        tracing::info!("  SENSOR_TIMEZONE    : {}", self.timezone);
        tracing::info!("  TEMPERATURE_FIELD  : {:?}", self.temperature_field);
        tracing::info!("  HUMIDITY_FIELD     : {:?}", self.humidity_field);
        tracing::info!("  CACHE_TTL_SECS     : {}", self.cache_ttl_secs);
        tracing::info!("  HTTP_TIMEOUT_SECS  : {}", self.http_timeout_secs);
        tracing::info!("  BIND_PORT          : {}", self.bind_port);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_from(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        // ---
        let cfg = load(&[("SENSOR_SOURCE_URL", "https://example.test/readings.json")]).unwrap();

        assert_eq!(cfg.source_url, "https://example.test/readings.json");
        assert_eq!(cfg.source_auth, None);
        assert_eq!(cfg.layout, SourceLayout::Tree);
        assert_eq!(cfg.timestamp_format, TimestampFormat::EpochSeconds);
        assert_eq!(cfg.timezone.local_minus_utc(), 0);
        assert_eq!(cfg.temperature_field, "Temp: ");
        assert_eq!(cfg.humidity_field, "Umid: ");
        assert_eq!(cfg.cache_ttl_secs, 600);
        assert_eq!(cfg.http_timeout_secs, 30);
        assert_eq!(cfg.bind_port, 8080);
    }

    #[test]
    fn test_missing_source_url() {
        // ---
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("SENSOR_SOURCE_URL"));

        let err = load(&[("SENSOR_SOURCE_URL", "  ")]).unwrap_err();
        assert!(err.to_string().contains("SENSOR_SOURCE_URL"));
    }

    #[test]
    fn test_overrides() {
        // ---
        let cfg = load(&[
            ("SENSOR_SOURCE_URL", "https://example.test/rows"),
            ("SENSOR_SOURCE_AUTH", "secret"),
            ("SOURCE_LAYOUT", "rows"),
            ("TIMESTAMP_FORMAT", "iso"),
            ("SENSOR_TIMEZONE", "-03:00"),
            ("TEMPERATURE_FIELD", "temperature"),
            ("HUMIDITY_FIELD", "humidity"),
            ("CACHE_TTL_SECS", "0"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("BIND_PORT", "9090"),
        ])
        .unwrap();

        assert_eq!(cfg.source_auth.as_deref(), Some("secret"));
        assert_eq!(cfg.layout, SourceLayout::Rows);
        assert_eq!(cfg.timestamp_format, TimestampFormat::Iso);
        assert_eq!(cfg.timezone.local_minus_utc(), -3 * 3600);
        assert_eq!(cfg.temperature_field, "temperature");
        assert_eq!(cfg.humidity_field, "humidity");
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(0));
        assert_eq!(cfg.http_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.bind_port, 9090);
    }

    #[test]
    fn test_timezone_variants() {
        // ---
        assert_eq!(parse_timezone("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_timezone("utc").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_timezone("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_timezone("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_timezone("-0300").unwrap().local_minus_utc(), -10_800);
        assert_eq!(parse_timezone(" -03:00 ").unwrap().local_minus_utc(), -10_800);
        assert_eq!(parse_timezone("+00:00").unwrap().local_minus_utc(), 0);
        assert!(parse_timezone("America/Sao_Paulo").is_err());
        assert!(parse_timezone("+25:00").is_err());
        assert!(parse_timezone("03:00").is_err());
    }

    #[test]
    fn test_debug_masks_auth_token() {
        // ---
        let cfg = load(&[
            ("SENSOR_SOURCE_URL", "https://example.test"),
            ("SENSOR_SOURCE_AUTH", "hunter2-token"),
        ])
        .unwrap();
        let printed = format!("{:?}", cfg);

        assert!(!printed.contains("hunter2-token"));
        assert!(printed.contains("****"));
        assert!(printed.contains("https://example.test"));

        let cfg = load(&[("SENSOR_SOURCE_URL", "https://example.test")]).unwrap();
        assert!(format!("{:?}", cfg).contains("source_auth: None"));
    }

    #[test]
    fn test_invalid_values() {
        // ---
        let base = ("SENSOR_SOURCE_URL", "https://example.test");

        let err = load(&[base, ("BIND_PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("BIND_PORT"));

        let err = load(&[base, ("TIMESTAMP_FORMAT", "unix-millis")]).unwrap_err();
        assert!(err.to_string().contains("TIMESTAMP_FORMAT"));

        let err = load(&[base, ("SOURCE_LAYOUT", "csv")]).unwrap_err();
        assert!(err.to_string().contains("SOURCE_LAYOUT"));

        let err = load(&[base, ("SENSOR_TIMEZONE", "Mars/Olympus")]).unwrap_err();
        assert!(err.to_string().contains("SENSOR_TIMEZONE"));

        let err = load(&[base, ("HTTP_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("HTTP_TIMEOUT_SECS"));
    }
}
