use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use untis_core::{feed, reconcile_and_serialize, DateWindow, FeedError};

use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryParams {
    /// How many weeks to include, starting with the current one.
    weeks: Option<u32>,
    /// Start date overriding `weeks`, together with `end`.
    start: Option<NaiveDate>,
    /// Exclusive end date overriding `weeks`, together with `start`.
    end: Option<NaiveDate>,
    /// Class whose timetable is merged into the personal one.
    klasse: Option<String>,
    token: Option<String>,
}

/// Handle calendar requests.
///
/// Every query parameter is optional; `token` is required when an access token is configured.
pub async fn handler(
    State(state): State<Arc<AppState>>,
    Query(query_params): Query<QueryParams>,
) -> Result<Response, (StatusCode, String)> {
    authorize(state.access_token.as_deref(), query_params.token.as_deref())?;
    let today = Utc::now()
        .with_timezone(&state.settings.timezone)
        .date_naive();
    let window = DateWindow::resolve(
        today,
        query_params.start,
        query_params.end,
        query_params.weeks,
    )
    .map_err(error_response)?;
    let session = state.client.login().await.map_err(error_response)?;
    let result = reconcile_and_serialize(
        &session,
        &state.settings,
        window,
        query_params.klasse.as_deref(),
        Utc::now(),
    )
    .await;
    session.logout().await;
    let body = result.map_err(error_response)?;
    let response = ([(CONTENT_TYPE, feed::CONTENT_TYPE)], body).into_response();
    Ok(response)
}

/// Check the given token against the configured one without stopping at the first difference.
fn authorize(expected: Option<&str>, given: Option<&str>) -> Result<(), (StatusCode, String)> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match given {
        Some(given) if Sha256::digest(given.as_bytes()) == Sha256::digest(expected.as_bytes()) => {
            Ok(())
        }
        _ => Err((
            StatusCode::UNAUTHORIZED,
            String::from("Invalid or missing token"),
        )),
    }
}

fn error_response(err: FeedError) -> (StatusCode, String) {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else if err.is_provider_error() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, err.to_string())
}
