use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::Config;
use crate::hires::models::{EventRecord, TimelineOptions, decode_grid};
use crate::hires::{ApiError, EventApi};
use crate::query::{GridQuery, TimelineQuery};

pub struct HiresClient {
    http_client: Client,
    base_url: String,
}

impl HiresClient {
    /// # Errors
    ///
    /// Returns `ApiError::Request` if the cookie is not a valid header value or
    /// the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.hires_api_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ApiError::Request(format!("Invalid cookie header: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.hires_api_timeout_seconds))
            .build()
            .map_err(|e| ApiError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.hires_api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(format!("Failed to get response text: {e}")))?;

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                path,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Decode(e.to_string())
        })
    }
}

impl EventApi for HiresClient {
    async fn locations(&self) -> Result<serde_json::Value, ApiError> {
        self.get_json("/form_locids", &[]).await
    }

    async fn grid(&self, query: &GridQuery) -> Result<Vec<EventRecord>, ApiError> {
        let body = self.get_json("/hiresgrid", &query.params()).await?;
        let rows = decode_grid(body)?;
        tracing::debug!(locid = %query.locid(), rows = rows.len(), "Fetched grid rows");
        Ok(rows)
    }

    async fn timeline(&self, query: &TimelineQuery) -> Result<TimelineOptions, ApiError> {
        let options: TimelineOptions = self.get_json("/timeline_viz", &query.params()).await?;
        tracing::debug!(
            locid = %query.locid,
            series = options.series.len(),
            bars = options.bar_count(),
            "Fetched timeline"
        );
        Ok(options)
    }
}
