use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::{
    db::{connection::Database, helpers::parse_datetime},
    models::{CalendarEvent, EventSource},
};

fn row_to_event(row: &Row) -> Result<CalendarEvent> {
    let start: String = row.get("start_time")?;
    let end: String = row.get("end_time")?;
    let source: String = row.get("source")?;

    Ok(CalendarEvent {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        start: parse_datetime(&start, "start_time")?,
        end: parse_datetime(&end, "end_time")?,
        source: EventSource::parse(&source)?,
        external_id: row.get("external_id")?,
        color_class: row.get("color_class")?,
    })
}

impl Database {
    pub async fn insert_event(&self, user_id: &str, event: &CalendarEvent) -> Result<()> {
        let user_id = user_id.to_string();
        let event = event.clone();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO calendar_events
                     (id, user_id, title, description, start_time, end_time, source,
                      external_id, color_class, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    event.id,
                    user_id,
                    event.title,
                    event.description,
                    event.start.to_rfc3339(),
                    event.end.to_rfc3339(),
                    event.source.as_str(),
                    event.external_id,
                    event.color_class,
                    now,
                    now,
                ],
            )
            .context("failed to insert calendar event")?;
            Ok(())
        })
        .await
    }

    pub async fn update_event(&self, event: &CalendarEvent) -> Result<()> {
        let event = event.clone();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn.execute(
                "UPDATE calendar_events SET
                     title = ?2, description = ?3, start_time = ?4, end_time = ?5,
                     color_class = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    event.id,
                    event.title,
                    event.description,
                    event.start.to_rfc3339(),
                    event.end.to_rfc3339(),
                    event.color_class,
                    now,
                ],
            )?;
            if updated == 0 {
                return Err(anyhow!("calendar event {} not found", event.id));
            }
            Ok(())
        })
        .await
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<()> {
        let event_id = event_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "DELETE FROM calendar_events WHERE id = ?1",
                params![event_id],
            )?;
            Ok(())
        })
        .await
    }

    /// Events overlapping the half-open window `[start, end)`.
    pub async fn events_in_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, description, start_time, end_time, source,
                        external_id, color_class
                 FROM calendar_events
                 WHERE user_id = ?1 AND start_time < ?3 AND end_time > ?2
                 ORDER BY start_time ASC",
            )?;
            let mut rows = stmt.query(params![
                user_id,
                start.to_rfc3339(),
                end.to_rfc3339()
            ])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_event(row)?);
            }
            Ok(events)
        })
        .await
    }

    /// Insert or refresh the local mirror of a provider event, keyed by its
    /// external id.
    pub async fn upsert_external_event(
        &self,
        user_id: &str,
        event: &CalendarEvent,
    ) -> Result<()> {
        let external_id = event
            .external_id
            .clone()
            .ok_or_else(|| anyhow!("external event is missing its provider id"))?;
        let user_id = user_id.to_string();
        let event = event.clone();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM calendar_events
                     WHERE user_id = ?1 AND external_id = ?2",
                    params![user_id, external_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|err| match err {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            match existing {
                Some(id) => {
                    conn.execute(
                        "UPDATE calendar_events SET
                             title = ?2, description = ?3, start_time = ?4,
                             end_time = ?5, color_class = ?6, updated_at = ?7
                         WHERE id = ?1",
                        params![
                            id,
                            event.title,
                            event.description,
                            event.start.to_rfc3339(),
                            event.end.to_rfc3339(),
                            event.color_class,
                            now,
                        ],
                    )?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO calendar_events
                             (id, user_id, title, description, start_time, end_time,
                              source, external_id, color_class, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        params![
                            event.id,
                            user_id,
                            event.title,
                            event.description,
                            event.start.to_rfc3339(),
                            event.end.to_rfc3339(),
                            EventSource::External.as_str(),
                            external_id,
                            event.color_class,
                            now,
                            now,
                        ],
                    )?;
                }
            }
            Ok(())
        })
        .await
    }

    /// Drop external mirrors inside the window whose provider ids are no
    /// longer present upstream.
    pub async fn prune_external_events(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        seen_external_ids: Vec<String>,
    ) -> Result<usize> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, external_id FROM calendar_events
                 WHERE user_id = ?1 AND source = 'external'
                   AND start_time < ?3 AND end_time > ?2",
            )?;
            let mut rows = stmt.query(params![
                user_id,
                start.to_rfc3339(),
                end.to_rfc3339()
            ])?;
            let mut stale = Vec::new();
            while let Some(row) = rows.next()? {
                let id: String = row.get(0)?;
                let external_id: Option<String> = row.get(1)?;
                let still_present = external_id
                    .map(|ext| seen_external_ids.contains(&ext))
                    .unwrap_or(false);
                if !still_present {
                    stale.push(id);
                }
            }
            drop(rows);
            drop(stmt);

            for id in &stale {
                conn.execute("DELETE FROM calendar_events WHERE id = ?1", params![id])?;
            }
            Ok(stale.len())
        })
        .await
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>> {
        let event_id = event_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, description, start_time, end_time, source,
                        external_id, color_class
                 FROM calendar_events WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![event_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_event(row)?)),
                None => Ok(None),
            }
        })
        .await
    }
}
