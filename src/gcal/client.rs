//! Google Calendar v3 events client. Only the event CRUD surface is wrapped;
//! obtaining tokens is the embedding application's problem.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{CalendarApi, CalendarApiError, RemoteEvent};

const BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Wire shape for an event boundary: a timed `dateTime` or an all-day `date`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct WireTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    start: WireTime,
    end: WireTime,
    #[serde(rename = "colorId", skip_serializing_if = "Option::is_none")]
    color_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEventList {
    #[serde(default)]
    items: Vec<WireEvent>,
}

fn to_wire(event: &RemoteEvent) -> WireEvent {
    let (start, end) = match event.all_day {
        Some(date) => (
            WireTime {
                date: Some(date),
                ..Default::default()
            },
            WireTime {
                date: date.succ_opt(),
                ..Default::default()
            },
        ),
        None => (
            WireTime {
                date_time: Some(event.start),
                ..Default::default()
            },
            WireTime {
                date_time: Some(event.end),
                ..Default::default()
            },
        ),
    };

    WireEvent {
        id: event.id.clone(),
        summary: Some(event.summary.clone()),
        description: Some(event.description.clone()),
        start,
        end,
        color_id: event.color_id.clone(),
    }
}

fn from_wire(event: WireEvent) -> Option<RemoteEvent> {
    let all_day = event.start.date;
    let (start, end) = match (event.start.date_time, event.end.date_time, all_day) {
        (Some(start), Some(end), _) => (start, end),
        (_, _, Some(date)) => {
            let start = date.and_hms_opt(0, 0, 0)?.and_utc();
            (start, start + chrono::Duration::days(1))
        }
        _ => return None,
    };

    Some(RemoteEvent {
        id: event.id,
        summary: event.summary.unwrap_or_default(),
        description: event.description.unwrap_or_default(),
        start,
        end,
        all_day,
        color_id: event.color_id,
    })
}

async fn map_failure(response: reqwest::Response) -> CalendarApiError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED => CalendarApiError::AuthExpired,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            CalendarApiError::QuotaExceeded
        }
        other => CalendarApiError::Provider {
            status: other.as_u16(),
            message,
        },
    }
}

/// HTTP client for one calendar of one account. The token is refreshed in
/// place by `reauthorize`, using the hook supplied at construction.
pub struct GcalClient {
    http: reqwest::Client,
    calendar_id: String,
    access_token: RwLock<String>,
    token_refresher: Box<dyn Fn() -> Option<String> + Send + Sync>,
}

impl GcalClient {
    pub fn new(
        calendar_id: impl Into<String>,
        access_token: impl Into<String>,
        token_refresher: Box<dyn Fn() -> Option<String> + Send + Sync>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            calendar_id: calendar_id.into(),
            access_token: RwLock::new(access_token.into()),
            token_refresher,
        }
    }

    fn events_url(&self) -> String {
        format!("{BASE_URL}/calendars/{}/events", self.calendar_id)
    }

    async fn bearer(&self) -> String {
        self.access_token.read().await.clone()
    }
}

#[async_trait]
impl CalendarApi for GcalClient {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RemoteEvent>, CalendarApiError> {
        let response = self
            .http
            .get(self.events_url())
            .bearer_auth(self.bearer().await)
            .query(&[
                ("timeMin", start.to_rfc3339()),
                ("timeMax", end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|err| CalendarApiError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(map_failure(response).await);
        }

        let list: WireEventList = response
            .json()
            .await
            .map_err(|err| CalendarApiError::Transport(err.to_string()))?;
        Ok(list.items.into_iter().filter_map(from_wire).collect())
    }

    async fn insert_event(&self, event: RemoteEvent) -> Result<RemoteEvent, CalendarApiError> {
        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(self.bearer().await)
            .json(&to_wire(&event))
            .send()
            .await
            .map_err(|err| CalendarApiError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(map_failure(response).await);
        }

        let created: WireEvent = response
            .json()
            .await
            .map_err(|err| CalendarApiError::Transport(err.to_string()))?;
        from_wire(created).ok_or_else(|| {
            CalendarApiError::Transport("provider returned an event without times".into())
        })
    }

    async fn update_event(&self, event: RemoteEvent) -> Result<RemoteEvent, CalendarApiError> {
        let id = event.id.clone().ok_or_else(|| {
            CalendarApiError::Transport("cannot update an event without an id".into())
        })?;

        let response = self
            .http
            .put(format!("{}/{id}", self.events_url()))
            .bearer_auth(self.bearer().await)
            .json(&to_wire(&event))
            .send()
            .await
            .map_err(|err| CalendarApiError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(map_failure(response).await);
        }

        let updated: WireEvent = response
            .json()
            .await
            .map_err(|err| CalendarApiError::Transport(err.to_string()))?;
        from_wire(updated).ok_or_else(|| {
            CalendarApiError::Transport("provider returned an event without times".into())
        })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarApiError> {
        let response = self
            .http
            .delete(format!("{}/{event_id}", self.events_url()))
            .bearer_auth(self.bearer().await)
            .send()
            .await
            .map_err(|err| CalendarApiError::Transport(err.to_string()))?;

        // Providers answer 410 for already-deleted events; treat as done.
        if response.status() == StatusCode::GONE || response.status().is_success() {
            return Ok(());
        }
        Err(map_failure(response).await)
    }

    async fn reauthorize(&self) -> Result<(), CalendarApiError> {
        match (self.token_refresher)() {
            Some(token) => {
                *self.access_token.write().await = token;
                Ok(())
            }
            None => {
                warn!("Calendar re-authorization hook produced no token");
                Err(CalendarApiError::AuthExpired)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_events_serialize_as_date_time() {
        let event = RemoteEvent {
            id: None,
            summary: "Standup".to_string(),
            description: String::new(),
            start: Utc::now(),
            end: Utc::now() + chrono::Duration::minutes(15),
            all_day: None,
            color_id: Some("5".to_string()),
        };

        let json = serde_json::to_value(to_wire(&event)).unwrap();
        assert!(json["start"]["dateTime"].is_string());
        assert!(json["start"].get("date").is_none());
        assert_eq!(json["colorId"], "5");
    }

    #[test]
    fn all_day_events_serialize_as_date_and_span_one_day() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let event = RemoteEvent {
            id: Some("e1".to_string()),
            summary: "Offsite".to_string(),
            description: String::new(),
            start,
            end: start + chrono::Duration::days(1),
            all_day: Some(date),
            color_id: None,
        };

        let json = serde_json::to_value(to_wire(&event)).unwrap();
        assert_eq!(json["start"]["date"], "2026-03-02");
        assert_eq!(json["end"]["date"], "2026-03-03");

        let round: WireEvent = serde_json::from_value(json).unwrap();
        let restored = from_wire(round).unwrap();
        assert_eq!(restored.all_day, Some(date));
        assert_eq!(restored.end - restored.start, chrono::Duration::days(1));
    }

    #[test]
    fn events_without_times_are_skipped() {
        let wire = WireEvent {
            id: Some("broken".to_string()),
            summary: None,
            description: None,
            start: WireTime::default(),
            end: WireTime::default(),
            color_id: None,
        };
        assert!(from_wire(wire).is_none());
    }
}
