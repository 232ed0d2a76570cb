use axum::http::{header, HeaderMap};

use crate::hits::ValidatorToken;

/// Country header set by the CDN in front of the collector.
pub const COUNTRY_HEADER: &str = "cf-ipcountry";

/// Values the CDN uses when it could not place the client.
const UNKNOWN_COUNTRIES: [&str; 2] = ["XX", "T1"];

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Extract client IP from headers (supports common proxy headers)
pub fn get_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = header_str(headers, "x-forwarded-for") {
        // First entry is the client in a proxy chain
        if let Some(first) = xff.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
            return Some(first.to_string());
        }
    }

    ["x-real-ip", "cf-connecting-ip", "true-client-ip"]
        .into_iter()
        .find_map(|name| header_str(headers, name))
        .map(str::to_string)
}

pub fn get_user_agent(headers: &HeaderMap) -> String {
    header_str(headers, header::USER_AGENT.as_str())
        .unwrap_or_default()
        .to_string()
}

/// ISO country code from the CDN header, upper-cased. Unknown markers are dropped.
pub fn get_country_header(headers: &HeaderMap) -> Option<String> {
    header_str(headers, COUNTRY_HEADER)
        .map(str::to_uppercase)
        .filter(|code| !UNKNOWN_COUNTRIES.contains(&code.as_str()))
}

/// The validator token echoed by the client, if it sent a parseable one.
pub fn get_validator_token(headers: &HeaderMap) -> Option<ValidatorToken> {
    header_str(headers, header::IF_MODIFIED_SINCE.as_str()).and_then(ValidatorToken::from_header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_client_ip_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.195, 70.41.3.18, 150.172.238.178"),
        );
        assert_eq!(get_client_ip(&headers), Some("203.0.113.195".to_string()));
    }

    #[test]
    fn test_get_client_ip_fallback_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("104.28.1.1"));
        assert_eq!(get_client_ip(&headers), Some("104.28.1.1".to_string()));

        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.100"));
        assert_eq!(get_client_ip(&headers), Some("192.168.1.100".to_string()));
    }

    #[test]
    fn test_get_client_ip_none() {
        assert_eq!(get_client_ip(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        assert_eq!(get_client_ip(&headers), None);
    }

    #[test]
    fn test_get_user_agent() {
        let mut headers = HeaderMap::new();
        assert_eq!(get_user_agent(&headers), "");
        headers.insert(
            "user-agent",
            HeaderValue::from_static("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
        );
        assert_eq!(
            get_user_agent(&headers),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64)"
        );
    }

    #[test]
    fn test_country_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(get_country_header(&headers), None);

        headers.insert(COUNTRY_HEADER, HeaderValue::from_static("ca"));
        assert_eq!(get_country_header(&headers), Some("CA".to_string()));

        headers.insert(COUNTRY_HEADER, HeaderValue::from_static("XX"));
        assert_eq!(get_country_header(&headers), None);
    }

    #[test]
    fn test_validator_token_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(get_validator_token(&headers), None);

        headers.insert(
            "if-modified-since",
            HeaderValue::from_static("Thu, 18 Jan 2024 09:33:02 GMT"),
        );
        let token = get_validator_token(&headers).unwrap();
        assert_eq!(token.to_header(), "Thu, 18 Jan 2024 09:33:02 GMT");

        headers.insert("if-modified-since", HeaderValue::from_static("garbage"));
        assert_eq!(get_validator_token(&headers), None);
    }
}
