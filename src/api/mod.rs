use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::error;

use crate::columns::Column;
use crate::domain::{Breakdown, SiteHits, Stats, TimeSeries};
use crate::error::{Error, Result};
use crate::query::{QueryRequest, TimeWindow};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }
    }
}

fn respond<T: Serialize>(what: &str, result: Result<T>) -> Response {
    match result {
        Ok(data) => Json(ApiResponse::success(data)).into_response(),
        Err(e) => {
            if e.status().is_server_error() {
                error!("Error fetching {}: {}", what, e);
            }
            e.into_response()
        }
    }
}

/// GET /api/stats
pub async fn stats(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    respond("stats", fetch_stats(&state, &params).await)
}

async fn fetch_stats(state: &AppState, params: &HashMap<String, String>) -> Result<Stats> {
    let request = QueryRequest::from_params(params)?;
    let range = request
        .window
        .interval
        .resolve(state.now(), request.window.timezone)?;
    state
        .engine
        .get_stats(&request.site_id, &range, &request.filters)
        .await
}

/// GET /api/breakdown/{column}
pub async fn breakdown(
    State(state): State<AppState>,
    Path(column): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    respond("breakdown", fetch_breakdown(&state, &column, &params).await)
}

async fn fetch_breakdown(
    state: &AppState,
    column: &str,
    params: &HashMap<String, String>,
) -> Result<Breakdown> {
    let column = Column::from_name(column)
        .filter(|c| c.is_groupable())
        .ok_or_else(|| Error::InvalidColumn(column.to_string()))?;
    let request = QueryRequest::from_params(params)?;
    let range = request
        .window
        .interval
        .resolve(state.now(), request.window.timezone)?;
    state
        .engine
        .get_count_by(
            &request.site_id,
            column,
            &range,
            &request.filters,
            request.page,
        )
        .await
}

/// GET /api/timeseries
pub async fn timeseries(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    respond("time series", fetch_timeseries(&state, &params).await)
}

async fn fetch_timeseries(state: &AppState, params: &HashMap<String, String>) -> Result<TimeSeries> {
    let request = QueryRequest::from_params(params)?;
    let TimeWindow { interval, timezone } = request.window;
    let range = interval.resolve(state.now(), timezone)?;
    let granularity = interval.granularity();
    let buckets = state
        .engine
        .get_views_grouped_by_interval(
            &request.site_id,
            granularity,
            &range,
            timezone,
            &request.filters,
        )
        .await?;

    Ok(TimeSeries {
        granularity,
        timezone: timezone.name().to_string(),
        buckets,
    })
}

/// GET /api/sites
pub async fn sites(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    respond("sites", fetch_sites(&state, &params).await)
}

async fn fetch_sites(state: &AppState, params: &HashMap<String, String>) -> Result<Vec<SiteHits>> {
    let window = TimeWindow::from_params(params)?;
    let range = window.interval.resolve(state.now(), window.timezone)?;
    state.engine.get_sites_by_hits(&range).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, Some("test data"));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_error() {
        let response = ApiResponse::<String>::error("something went wrong");
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error, Some("something went wrong".to_string()));
    }

    #[test]
    fn test_api_response_skips_empty_fields() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 42}));
    }

    #[test]
    fn test_respond_maps_errors_to_status() {
        let ok = respond("test", Ok(1));
        assert_eq!(ok.status(), StatusCode::OK);

        let bad: Result<i32> = Err(Error::MissingParameter("site"));
        assert_eq!(respond("test", bad).status(), StatusCode::BAD_REQUEST);

        let down: Result<i32> = Err(Error::Store("unreachable".to_string()));
        assert_eq!(respond("test", down).status(), StatusCode::BAD_GATEWAY);
    }
}
