use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::aggregate::{self, summarize, WindowAggregator};
use crate::error::{AppResult, IngestError};
use crate::{AggregateSummary, ChartSeries, Config, Ingestor, SourceClient, Window};

// ---

pub fn router() -> Router<(SourceClient, Config)> {
    // ---
    Router::new().route("/dashboard", get(handler))
}

async fn handler(
    Query(params): Query<DashboardQuery>,
    State((source, config)): State<(SourceClient, Config)>,
) -> AppResult<Json<DashboardView>> {
    // ---
    info!("GET /dashboard - Starting pipeline");

    // Step 1: Fetch (or reuse) the raw payload
    debug!("GET /dashboard - Step 1");
    let raw = source.fetch().await?;

    // Step 2: Normalize, filter and summarize
    debug!("GET /dashboard - Step 2");
    let view = build_view(&raw, &config, &params)?;

    info!(
        "Pipeline complete, sensor {} window {}..={}: {} readings",
        view.sensor,
        view.window.start,
        view.window.end,
        view.record_count
    );
    Ok(Json(view))
}

/// Query parameters selecting the sensor and date window.
///
/// Omitted values fall back to the first sensor seen and the window
/// spanning all readings.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub sensor: Option<String>,
    /// Inclusive first day, `YYYY-MM-DD`
    pub start: Option<NaiveDate>,
    /// Inclusive last day, `YYYY-MM-DD`
    pub end: Option<NaiveDate>,
}

/// Everything the presentation layer needs for one render.
#[derive(Debug, Serialize)]
pub struct DashboardView {
    // ---
    pub sensor: String,
    pub sensors: Vec<String>,
    pub window: Window,
    pub record_count: usize,
    pub summary: AggregateSummary,
    pub series: ChartSeries,
}

/// Run the normalize → filter → summarize pipeline over one raw payload.
///
/// An empty selection is a valid view with an all-`None` summary. Only an
/// unusable payload or an inverted window is an error.
pub fn build_view(raw: &Value, config: &Config, params: &DashboardQuery) -> AppResult<DashboardView> {
    // ---
    let ingestor = Ingestor::from_config(config);
    let aggregator = WindowAggregator::new(config.timezone);

    let mut records = ingestor.ingest(raw)?;
    aggregate::sort_by_timestamp(&mut records);

    let sensors = aggregate::sensors(&records);
    let sensor = params
        .sensor
        .clone()
        .or_else(|| sensors.first().cloned())
        .ok_or(IngestError::EmptySource)?;

    let span = aggregator
        .default_window(&records)
        .ok_or(IngestError::EmptySource)?;
    // A lone bound outside the data span still yields a valid (empty) window
    let start = params
        .start
        .unwrap_or_else(|| params.end.map_or(span.start, |end| span.start.min(end)));
    let end = params
        .end
        .unwrap_or_else(|| params.start.map_or(span.end, |start| span.end.max(start)));
    let window = Window::new(start, end)?;

    let filtered = aggregator.filter(&records, &sensor, &window);
    debug!(
        "Filtered {} of {} readings for sensor {}",
        filtered.len(),
        records.len(),
        sensor
    );

    Ok(DashboardView {
        sensor,
        sensors,
        window,
        record_count: filtered.len(),
        summary: summarize(&filtered),
        series: ChartSeries::from_records(&filtered),
    })
}
