//! Client side of the event log backend.

mod client;
mod models;

pub use client::HiresClient;
pub use models::{EventRecord, RangeBar, TimelineOptions, TimelineSeries, decode_grid};

use std::future::Future;
use std::sync::Arc;

use crate::query::{GridQuery, TimelineQuery};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

/// The three backend endpoints the viewer consumes.
pub trait EventApi: Send + Sync {
    /// `GET /form_locids`, undecoded because its shape is deployment-specific.
    fn locations(&self) -> impl Future<Output = Result<serde_json::Value, ApiError>> + Send;

    /// `GET /hiresgrid`
    fn grid(
        &self,
        query: &GridQuery,
    ) -> impl Future<Output = Result<Vec<EventRecord>, ApiError>> + Send;

    /// `GET /timeline_viz`
    fn timeline(
        &self,
        query: &TimelineQuery,
    ) -> impl Future<Output = Result<TimelineOptions, ApiError>> + Send;
}

impl<T: EventApi> EventApi for Arc<T> {
    async fn locations(&self) -> Result<serde_json::Value, ApiError> {
        self.as_ref().locations().await
    }

    async fn grid(&self, query: &GridQuery) -> Result<Vec<EventRecord>, ApiError> {
        self.as_ref().grid(query).await
    }

    async fn timeline(&self, query: &TimelineQuery) -> Result<TimelineOptions, ApiError> {
        self.as_ref().timeline(query).await
    }
}
