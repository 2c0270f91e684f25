use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::{
    db::connection::Database,
    models::{Label, LabelInput},
};

fn row_to_label(row: &Row) -> Result<Label> {
    Ok(Label {
        id: row.get("id")?,
        name: row.get("name")?,
        color: row.get("color")?,
    })
}

impl Database {
    /// Create a new label. The name must be non-empty and unique per user.
    pub async fn create_label(&self, user_id: &str, input: LabelInput) -> Result<Label> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let name = input.name.trim().to_string();
            if name.is_empty() {
                bail!("label name must not be empty");
            }

            let duplicate: i64 = conn.query_row(
                "SELECT COUNT(*) FROM task_labels WHERE user_id = ?1 AND name = ?2",
                params![user_id, name],
                |row| row.get(0),
            )?;
            if duplicate > 0 {
                bail!("a label named '{name}' already exists");
            }

            let now = Utc::now().to_rfc3339();
            let label = Label {
                id: Uuid::new_v4().to_string(),
                name,
                color: input.color,
            };
            conn.execute(
                "INSERT INTO task_labels (id, user_id, name, color, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![label.id, user_id, label.name, label.color, now, now],
            )
            .context("failed to insert label")?;

            Ok(label)
        })
        .await
    }

    pub async fn get_labels(&self, user_id: &str) -> Result<Vec<Label>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, color FROM task_labels
                 WHERE user_id = ?1
                 ORDER BY name ASC",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            let mut labels = Vec::new();
            while let Some(row) = rows.next()? {
                labels.push(row_to_label(row)?);
            }
            Ok(labels)
        })
        .await
    }

    /// Update a label's name and/or color.
    pub async fn update_label(
        &self,
        label_id: &str,
        name: Option<String>,
        color: Option<String>,
    ) -> Result<Label> {
        let label_id = label_id.to_string();
        self.execute(move |conn| {
            let mut updates = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(n) = name {
                if n.trim().is_empty() {
                    bail!("label name must not be empty");
                }
                updates.push("name = ?");
                params_vec.push(Box::new(n.trim().to_string()));
            }
            if let Some(c) = color {
                updates.push("color = ?");
                params_vec.push(Box::new(c));
            }

            if updates.is_empty() {
                return Err(anyhow!("no fields to update"));
            }

            updates.push("updated_at = ?");
            params_vec.push(Box::new(Utc::now().to_rfc3339()));

            let query = format!(
                "UPDATE task_labels SET {} WHERE id = ?",
                updates.join(", ")
            );
            params_vec.push(Box::new(label_id.clone()));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();
            let rows_affected = conn.execute(&query, params_refs.as_slice())?;
            if rows_affected == 0 {
                return Err(anyhow!("label not found"));
            }

            let mut stmt =
                conn.prepare("SELECT id, name, color FROM task_labels WHERE id = ?1")?;
            let mut rows = stmt.query(params![label_id])?;
            match rows.next()? {
                Some(row) => row_to_label(row),
                None => Err(anyhow!("label not found after update")),
            }
        })
        .await
    }

    /// Delete a label outright, detaching it from every task. Tasks survive;
    /// only the relations go.
    pub async fn delete_label(&self, label_id: &str) -> Result<()> {
        let label_id = label_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM task_label_relations WHERE label_id = ?1",
                params![label_id],
            )?;
            let deleted = tx.execute(
                "DELETE FROM task_labels WHERE id = ?1",
                params![label_id],
            )?;
            if deleted == 0 {
                return Err(anyhow!("label not found"));
            }
            tx.commit().context("failed to commit label delete")?;
            Ok(())
        })
        .await
    }
}
