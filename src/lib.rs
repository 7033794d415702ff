//! Sensor dashboard backend.
//!
//! Turns a raw temperature/humidity payload into validated records, filters
//! them by sensor and inclusive date window, and summarizes the selection for
//! an external presentation layer.
//!
//! Module boundaries follow the Explicit Module Boundary Pattern (EMBP):
//! sibling modules import shared types from this crate root rather than from
//! each other's internals.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod source;

pub use aggregate::{summarize, WindowAggregator};
pub use config::Config;
pub use error::{AppError, IngestError, SourceError, WindowError};
pub use ingest::{Ingestor, SourceLayout, TimestampFormat};
pub use models::{AggregateSummary, ChartSeries, NormalizedRecord, Window};
pub use source::SourceClient;
