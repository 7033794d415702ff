//! Route gateway: merges every endpoint subrouter and attaches shared state.
use axum::Router;

use crate::{Config, SourceClient};

mod dashboard;
mod health;

pub use dashboard::{build_view, DashboardQuery, DashboardView};

// ---

pub fn router(source: SourceClient, config: Config) -> Router {
    // ---
    Router::new()
        .merge(dashboard::router())
        .merge(health::router())
        .with_state((source, config))
}
