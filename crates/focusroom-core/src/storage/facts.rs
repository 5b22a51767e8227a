//! Minimal task and note registry.
//!
//! Tasks and notes belong to collaborators; this table set only keeps what
//! validation, scoring and rollups read.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::database::{decode_opt_ts, decode_ts, encode_ts, Database};
use crate::error::{CoreError, Result};
use crate::facts::{NoteFact, TaskDirectory, TaskFact, TaskSummary};

const TASK_COLUMNS: &str = "id, user_id, title, created_at, due_at, completed_at";

fn row_to_task(row: &Row) -> rusqlite::Result<TaskFact> {
    let created_at: String = row.get(3)?;
    Ok(TaskFact {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        created_at: decode_ts(3, &created_at)?,
        due_at: decode_opt_ts(4, row.get(4)?)?,
        completed_at: decode_opt_ts(5, row.get(5)?)?,
    })
}

impl Database {
    pub fn add_task(
        &self,
        user_id: &str,
        title: &str,
        due_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Result<TaskFact> {
        let task = TaskFact {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at,
            due_at,
            completed_at: None,
        };
        self.conn().execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, NULL)"),
            params![
                task.id,
                task.user_id,
                task.title,
                encode_ts(task.created_at),
                task.due_at.map(encode_ts),
            ],
        )?;
        Ok(task)
    }

    /// Mark a task completed. Completing an already completed task keeps the
    /// original completion time.
    pub fn complete_task(
        &self,
        user_id: &str,
        task_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<TaskFact> {
        let conn = self.conn();
        conn.execute(
            "UPDATE tasks SET completed_at = COALESCE(completed_at, ?3)
             WHERE id = ?1 AND user_id = ?2",
            params![task_id, user_id, encode_ts(completed_at)],
        )?;
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2"),
                params![task_id, user_id],
                row_to_task,
            )
            .optional()?;
        task.ok_or_else(|| CoreError::task_not_found(task_id))
    }

    pub fn tasks_for_user(&self, user_id: &str) -> Result<Vec<TaskFact>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_task)?;
        let tasks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    pub fn add_note(&self, user_id: &str, created_at: DateTime<Utc>) -> Result<NoteFact> {
        let note = NoteFact {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at,
        };
        self.conn().execute(
            "INSERT INTO notes (id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![note.id, note.user_id, encode_ts(note.created_at)],
        )?;
        Ok(note)
    }

    pub fn notes_created_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NoteFact>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, created_at FROM notes
             WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![user_id, encode_ts(from), encode_ts(to)], |row| {
            let created_at: String = row.get(2)?;
            Ok(NoteFact {
                id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: decode_ts(2, &created_at)?,
            })
        })?;
        let notes = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }
}

impl TaskDirectory for Database {
    fn find_task(&self, task_id: &str, user_id: &str) -> Result<Option<TaskSummary>> {
        let conn = self.conn();
        let summary = conn
            .query_row(
                "SELECT id, title, completed_at IS NOT NULL FROM tasks
                 WHERE id = ?1 AND user_id = ?2",
                params![task_id, user_id],
                |row| {
                    Ok(TaskSummary {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        completed: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }
}
