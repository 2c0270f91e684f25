//! Mirrors state between the local store and the external provider: pulls
//! provider events into `calendar_events`, pushes scheduled tasks out as
//! provider events linked through `google_event_id`.

use std::future::Future;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::Database,
    models::{CalendarEvent, EventSource, Task},
};

use super::{CalendarApi, CalendarApiError, RemoteEvent};

/// Run a provider operation with the auth-expiry policy: on a rejected
/// token, exactly one `reauthorize` followed by one retry. Every other
/// failure surfaces immediately.
async fn with_reauth<T, F, Fut>(api: &dyn CalendarApi, op: F) -> Result<T, CalendarApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CalendarApiError>>,
{
    match op().await {
        Err(CalendarApiError::AuthExpired) => {
            warn!("Calendar credentials expired; attempting a single re-auth");
            api.reauthorize().await?;
            op().await
        }
        other => other,
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PullSummary {
    pub fetched: usize,
    pub pruned: usize,
}

/// Pull the provider's events inside the window into the local mirror,
/// upserting by external id and pruning mirrors deleted upstream.
pub async fn pull(
    api: &dyn CalendarApi,
    db: &Database,
    user_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<PullSummary> {
    let remote = with_reauth(api, || api.list_events(start, end))
        .await
        .context("failed to list provider events")?;

    let mut seen = Vec::with_capacity(remote.len());
    for event in &remote {
        let Some(external_id) = event.id.clone() else {
            continue;
        };
        let mirror = CalendarEvent {
            id: Uuid::new_v4().to_string(),
            title: event.summary.clone(),
            description: event.description.clone(),
            start: event.start,
            end: event.end,
            source: EventSource::External,
            external_id: Some(external_id.clone()),
            color_class: event.color_id.clone(),
        };
        db.upsert_external_event(user_id, &mirror).await?;
        seen.push(external_id);
    }

    let fetched = seen.len();
    let pruned = db.prune_external_events(user_id, start, end, seen).await?;
    info!("Calendar pull: {fetched} events mirrored, {pruned} pruned");

    Ok(PullSummary { fetched, pruned })
}

fn remote_from_task(task: &Task) -> Result<RemoteEvent> {
    let block = task
        .scheduled
        .ok_or_else(|| anyhow!("task {} has no calendar placement to push", task.id))?;
    Ok(RemoteEvent {
        id: task.google_event_id.clone(),
        summary: task.title.clone(),
        description: task.description.clone(),
        start: block.start,
        end: block.end,
        all_day: None,
        color_id: None,
    })
}

/// Mirror a scheduled task to the provider: insert on first push (recording
/// the provider id), update on reschedule.
pub async fn push_task(api: &dyn CalendarApi, db: &Database, task: &Task) -> Result<String> {
    let remote = remote_from_task(task)?;

    if task.google_event_id.is_some() {
        let updated = with_reauth(api, || api.update_event(remote.clone()))
            .await
            .context("failed to update provider event")?;
        updated
            .id
            .ok_or_else(|| anyhow!("provider returned an updated event without an id"))
    } else {
        let created = with_reauth(api, || api.insert_event(remote.clone()))
            .await
            .context("failed to insert provider event")?;
        let event_id = created
            .id
            .ok_or_else(|| anyhow!("provider returned a created event without an id"))?;
        db.set_google_event_id(&task.id, Some(event_id.clone()))
            .await?;
        Ok(event_id)
    }
}

/// Delete the provider-side copy of a task that was unscheduled or removed,
/// clearing the linkage.
pub async fn remove_task(api: &dyn CalendarApi, db: &Database, task: &Task) -> Result<()> {
    let Some(event_id) = task.google_event_id.clone() else {
        return Ok(());
    };

    with_reauth(api, || api.delete_event(&event_id))
        .await
        .context("failed to delete provider event")?;
    db.set_google_event_id(&task.id, None).await?;
    Ok(())
}
