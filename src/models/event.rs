//! Calendar event data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an event was authored. External events mirror a remote calendar
/// provider and are read-only locally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EventSource {
    Local,
    External,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Local => "local",
            EventSource::External => "external",
        }
    }

    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "local" => Ok(EventSource::Local),
            "external" => Ok(EventSource::External),
            other => Err(anyhow::anyhow!("unknown event source '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: EventSource,
    /// Provider-side event id for externally sourced events.
    pub external_id: Option<String>,
    /// Display colour class forwarded from the provider, if any.
    pub color_class: Option<String>,
}
