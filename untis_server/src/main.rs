//! This binary serves a WebUntis timetable as an iCalendar feed.
//!
//! The path and query string are `/calendar.ics?weeks=<n>&start=<date>&end=<date>&klasse=<class>&token=<token>`,
//! every parameter being optional.

use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use untis_core::Config;

mod route;
mod state;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    let state = Arc::new(AppState::new(&config));
    let app = Router::new()
        .route("/calendar.ics", get(route::calendar::handler))
        .route("/calendar", get(route::calendar::handler))
        .route("/health", get(route::health::handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    info!(
        address = %config.bind_address,
        server = %config.untis.server,
        school = %config.untis.school,
        timezone = %config.timezone,
        "serving timetable feed"
    );
    axum::Server::bind(&config.bind_address)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
