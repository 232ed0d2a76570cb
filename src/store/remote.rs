use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{AnalyticsStore, DataPoint, SqlDialect};
use crate::config::RemoteCredentials;
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Hosted analytics engine reached over HTTP.
///
/// Writes post a JSON data point to the configured write endpoint. Reads post
/// the SQL text as the request body to the account's SQL endpoint and return
/// the `data` array of the JSON response.
#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    sql_url: String,
    write_url: String,
    api_token: String,
    dataset: String,
}

impl RemoteStore {
    pub fn new(api_base_url: &str, dataset: &str, credentials: RemoteCredentials) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            sql_url: sql_url(api_base_url, &credentials.account_id),
            write_url: credentials.write_url,
            api_token: credentials.api_token,
            dataset: dataset.to_string(),
        })
    }

    pub fn sql_url(&self) -> &str {
        &self.sql_url
    }
}

fn sql_url(api_base_url: &str, account_id: &str) -> String {
    format!(
        "{}/accounts/{}/analytics_engine/sql",
        api_base_url.trim_end_matches('/'),
        account_id
    )
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::StoreTimeout
    } else {
        Error::Http(e)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Store(format!("analytics engine returned {status}: {body}")))
}

#[async_trait]
impl AnalyticsStore for RemoteStore {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::ClickHouse
    }

    fn dataset(&self) -> &str {
        &self.dataset
    }

    async fn write(&self, point: DataPoint) -> Result<()> {
        let resp = self
            .client
            .post(&self.write_url)
            .bearer_auth(&self.api_token)
            .json(&point)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp).await?;
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Value>> {
        debug!("SQL: {}", sql);
        let resp = self
            .client
            .post(&self.sql_url)
            .bearer_auth(&self.api_token)
            .body(sql.to_string())
            .send()
            .await
            .map_err(transport_error)?;

        let json: Value = check_status(resp)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        match json.get("data").and_then(|v| v.as_array()) {
            Some(rows) => Ok(rows.clone()),
            None => Err(Error::Store(
                "analytics engine response has no data array".to_string(),
            )),
        }
    }
}
