use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::config::AppConfig;
use crate::error::FeedError;
use crate::models::{Category, CategoryRow, Event, EventRow};
use crate::session::EventSource;

const USER_AGENT: &str = concat!("event-feed/", env!("CARGO_PKG_VERSION"));

/// Read-only client for the backend's REST tables.
pub struct BackendClient {
    base_url: Url,
    api_key: String,
    access_token: Option<String>,
    client: Client,
}

impl BackendClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        access_token: Option<String>,
    ) -> Result<Self, FeedError> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return Err(FeedError::General("backend URL is not configured".into()));
        }
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(FeedError::General("backend API key is not configured".into()));
        }

        // A trailing slash makes `join` append instead of replacing the last segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|err| FeedError::General(format!("invalid backend URL: {err}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| FeedError::General(format!("http client: {err}")))?;

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            access_token: access_token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, FeedError> {
        Self::new(
            config.backend_url.as_deref().unwrap_or_default(),
            config.api_key.as_deref().unwrap_or_default(),
            config.access_token.clone(),
        )
    }

    pub fn table_url(&self, table: &str, order: &str) -> Result<Url, FeedError> {
        let mut url = self
            .base_url
            .join(&format!("rest/v1/{table}"))
            .map_err(|err| FeedError::General(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", order);
        Ok(url)
    }

    async fn get_rows<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, FeedError> {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        let response = self
            .client
            .get(url.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|err| FeedError::General(format!("unexpected response from {url}: {err}")))
    }
}

impl EventSource for BackendClient {
    async fn fetch_events(&self) -> Result<Vec<Event>, FeedError> {
        let url = self.table_url("events", "date.asc")?;
        let rows: Vec<EventRow> = self.get_rows(url).await?;
        Ok(convert_rows(rows, "event"))
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, FeedError> {
        let url = self.table_url("categories", "name.asc")?;
        let rows: Vec<CategoryRow> = self.get_rows(url).await?;
        Ok(convert_rows(rows, "category"))
    }
}

pub fn classify_status(status: StatusCode, body: &str) -> FeedError {
    let detail = format!("status {status}: {}", body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FeedError::Permission(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => FeedError::Network(detail),
        s if s.is_server_error() => FeedError::Network(detail),
        _ => FeedError::General(detail),
    }
}

// Rows that fail validation are dropped so one bad record does not hide the feed.
fn convert_rows<R, T>(rows: Vec<R>, what: &str) -> Vec<T>
where
    T: TryFrom<R>,
    T::Error: std::fmt::Display,
{
    let total = rows.len();
    let converted: Vec<T> = rows
        .into_iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(value) => Some(value),
            Err(err) => {
                log::debug!("skipping {what} row: {err}");
                None
            }
        })
        .collect();
    if converted.len() < total {
        log::warn!("skipped {} of {total} {what} rows", total - converted.len());
    }
    converted
}
