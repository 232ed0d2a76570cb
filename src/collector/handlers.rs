use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::request::{get_client_ip, get_country_header, get_user_agent, get_validator_token};
use crate::state::AppState;

use super::processor::{
    build_event, exchange, write_event, ClientInfo, CollectParams, Disposition,
};

// 1x1 transparent GIF
pub const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0xff, 0x00, 0xff, 0xff, 0xff,
    0x00, 0x00, 0x00, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

const EXPIRES_IN_THE_PAST: &str = "Mon, 01 Jan 1990 00:00:00 GMT";

/// Tracking status value: the server does not track across sites.
const TRACKING_STATUS: &str = "N";

#[derive(Debug, Serialize)]
pub struct CacheResponse {
    pub ht: u32,
}

/// Freshness headers shared by the pixel and the cache endpoint. The
/// validator token rides in `Last-Modified`.
fn freshness_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static(EXPIRES_IN_THE_PAST));
    headers.insert("tk", HeaderValue::from_static(TRACKING_STATUS));
    if let Ok(value) = HeaderValue::from_str(token) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    headers
}

fn country(state: &AppState, headers: &HeaderMap) -> String {
    get_country_header(headers)
        .or_else(|| get_client_ip(headers).and_then(|ip| state.geo.country(&ip)))
        .unwrap_or_default()
}

/// GET|HEAD /collect
pub async fn collect(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let params = CollectParams::from_query(&query);
    let visit = exchange(
        state.now(),
        get_validator_token(&headers).as_ref(),
        &state.day_boundary,
    );

    let client = ClientInfo {
        user_agent: get_user_agent(&headers),
        country: country(&state, &headers),
    };

    match build_event(&params, &visit, &client, state.settings.ignore_robots) {
        Disposition::Record(event) => {
            write_event(state.store.as_ref(), &event).await;
        }
        Disposition::Skip(reason) => debug!("Not recording view: {:?}", reason),
    }

    let mut response_headers = freshness_headers(&visit.hit_state.token.to_header());
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/gif"));

    (StatusCode::OK, response_headers, PIXEL_GIF).into_response()
}

/// GET /cache
///
/// Same validator exchange as the pixel, reported as JSON. Nothing is written.
pub async fn cache(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let visit = exchange(
        state.now(),
        get_validator_token(&headers).as_ref(),
        &state.day_boundary,
    );

    (
        StatusCode::OK,
        freshness_headers(&visit.hit_state.token.to_header()),
        Json(CacheResponse {
            ht: visit.hit_state.hits,
        }),
    )
        .into_response()
}

pub async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_is_a_gif() {
        assert!(PIXEL_GIF.starts_with(b"GIF89a"));
        assert_eq!(PIXEL_GIF.last(), Some(&0x3b));
    }

    #[test]
    fn test_freshness_headers() {
        let headers = freshness_headers("Thu, 18 Jan 2024 09:33:01 GMT");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], EXPIRES_IN_THE_PAST);
        assert_eq!(headers["tk"], "N");
        assert_eq!(
            headers[header::LAST_MODIFIED],
            "Thu, 18 Jan 2024 09:33:01 GMT"
        );
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let response = method_not_allowed().await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
