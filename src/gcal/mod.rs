//! External calendar integration. The provider is always an injected
//! [`CalendarApi`] capability, never an ambient global, so the sync logic
//! runs against a mock in tests.

pub mod client;
pub mod sync;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarApiError {
    /// The access token was rejected. The caller may attempt a single
    /// re-authorization and retry.
    #[error("calendar provider rejected the credentials")]
    AuthExpired,
    #[error("calendar provider quota exhausted")]
    QuotaExceeded,
    #[error("calendar provider returned {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("calendar request failed: {0}")]
    Transport(String),
}

/// Provider-side event representation, decoupled from both the wire format
/// and the local `CalendarEvent` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    /// Provider id; `None` on insert, assigned by the provider.
    pub id: Option<String>,
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Present for all-day events instead of a timed interval.
    pub all_day: Option<NaiveDate>,
    pub color_id: Option<String>,
}

#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RemoteEvent>, CalendarApiError>;

    /// Insert the event and return it with the provider-assigned id.
    async fn insert_event(&self, event: RemoteEvent) -> Result<RemoteEvent, CalendarApiError>;

    async fn update_event(&self, event: RemoteEvent) -> Result<RemoteEvent, CalendarApiError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarApiError>;

    /// Refresh credentials after an [`CalendarApiError::AuthExpired`].
    /// Called at most once per failed operation.
    async fn reauthorize(&self) -> Result<(), CalendarApiError>;
}

pub use client::GcalClient;
