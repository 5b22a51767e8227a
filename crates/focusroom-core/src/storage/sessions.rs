use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use super::database::{decode_opt_ts, decode_ts, encode_ts, Database};
use crate::error::Result;
use crate::facts::ActivityLog;
use crate::session::{InsertOutcome, Session, SessionStore};

const SESSION_COLUMNS: &str =
    "id, user_id, task_id, started_at, ended_at, planned_duration_min, duration_min, completed";

fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
    let started_at: String = row.get(3)?;
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task_id: row.get(2)?,
        started_at: decode_ts(3, &started_at)?,
        ended_at: decode_opt_ts(4, row.get(4)?)?,
        planned_duration_min: row.get(5)?,
        duration_min: row.get(6)?,
        completed: row.get(7)?,
    })
}

fn open_session_id(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM focus_sessions WHERE user_id = ?1 AND ended_at IS NULL",
        params![user_id],
        |row| row.get(0),
    )
    .optional()
}

fn query_sessions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Session>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, row_to_session)?;
    rows.collect()
}

impl SessionStore for Database {
    fn insert_open_session(&self, session: &Session) -> Result<InsertOutcome> {
        let conn = self.conn();
        let inserted = conn.execute(
            "INSERT INTO focus_sessions
                (id, user_id, task_id, started_at, ended_at, planned_duration_min, duration_min, completed)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, NULL, 0)",
            params![
                session.id,
                session.user_id,
                session.task_id,
                encode_ts(session.started_at),
                session.planned_duration_min,
            ],
        );
        match inserted {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                let active_session_id = open_session_id(&conn, &session.user_id)?
                    .unwrap_or_else(|| session.id.clone());
                Ok(InsertOutcome::Conflict { active_session_id })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn find_session(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM focus_sessions WHERE id = ?1"),
                params![session_id],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    fn open_sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let conn = self.conn();
        let sessions = query_sessions(
            &conn,
            &format!(
                "SELECT {SESSION_COLUMNS} FROM focus_sessions
                 WHERE user_id = ?1 AND ended_at IS NULL
                 ORDER BY started_at ASC"
            ),
            params![user_id],
        )?;
        Ok(sessions)
    }

    fn open_sessions_started_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Session>> {
        let conn = self.conn();
        let sessions = query_sessions(
            &conn,
            &format!(
                "SELECT {SESSION_COLUMNS} FROM focus_sessions
                 WHERE ended_at IS NULL AND started_at < ?1
                 ORDER BY started_at ASC"
            ),
            params![encode_ts(cutoff)],
        )?;
        Ok(sessions)
    }

    fn close_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        duration_min: u32,
        completed: bool,
    ) -> Result<bool> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE focus_sessions
             SET ended_at = ?2, duration_min = ?3, completed = ?4
             WHERE id = ?1 AND ended_at IS NULL",
            params![session_id, encode_ts(ended_at), duration_min, completed],
        )?;
        Ok(changed == 1)
    }

    fn sessions_started_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        let conn = self.conn();
        let sessions = query_sessions(
            &conn,
            &format!(
                "SELECT {SESSION_COLUMNS} FROM focus_sessions
                 WHERE user_id = ?1 AND started_at >= ?2 AND started_at < ?3
                 ORDER BY started_at DESC"
            ),
            params![user_id, encode_ts(from), encode_ts(to)],
        )?;
        Ok(sessions)
    }
}

impl ActivityLog for Database {
    fn session_facts(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        self.sessions_started_between(user_id, from, to)
    }

    fn task_facts(&self, user_id: &str) -> Result<Vec<crate::facts::TaskFact>> {
        self.tasks_for_user(user_id)
    }

    fn note_facts(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<crate::facts::NoteFact>> {
        self.notes_created_between(user_id, from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, h, m, 0).unwrap()
    }

    #[test]
    fn insert_and_find_roundtrip() {
        let db = Database::open_memory().unwrap();
        let session = Session::open("u1", Some("t1"), 25, at(9, 0));
        assert_eq!(db.insert_open_session(&session).unwrap(), InsertOutcome::Inserted);
        assert_eq!(db.find_session(&session.id).unwrap(), Some(session));
        assert!(db.find_session("missing").unwrap().is_none());
    }

    #[test]
    fn second_open_insert_reports_the_existing_session() {
        let db = Database::open_memory().unwrap();
        let first = Session::open("u1", None, 25, at(9, 0));
        db.insert_open_session(&first).unwrap();
        let second = Session::open("u1", None, 25, at(9, 5));
        assert_eq!(
            db.insert_open_session(&second).unwrap(),
            InsertOutcome::Conflict {
                active_session_id: first.id.clone()
            }
        );

        let other_user = Session::open("u2", None, 25, at(9, 5));
        assert_eq!(
            db.insert_open_session(&other_user).unwrap(),
            InsertOutcome::Inserted
        );
    }

    #[test]
    fn close_only_succeeds_once() {
        let db = Database::open_memory().unwrap();
        let session = Session::open("u1", None, 25, at(9, 0));
        db.insert_open_session(&session).unwrap();

        assert!(db.close_session(&session.id, at(9, 30), 30, true).unwrap());
        assert!(!db.close_session(&session.id, at(9, 45), 45, true).unwrap());

        let stored = db.find_session(&session.id).unwrap().unwrap();
        assert_eq!(stored.duration_min, Some(30));
        assert_eq!(stored.ended_at, Some(at(9, 30)));
        assert!(stored.completed);
    }

    #[test]
    fn range_queries_are_half_open_and_newest_first() {
        let db = Database::open_memory().unwrap();
        for (i, start) in [at(8, 0), at(9, 0), at(10, 0)].into_iter().enumerate() {
            let session = Session::open("u1", None, 25, start);
            db.insert_open_session(&session).unwrap();
            db.close_session(&session.id, start + Duration::minutes(20), 20, i != 1)
                .unwrap();
        }
        let sessions = db.sessions_started_between("u1", at(8, 0), at(10, 0)).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].started_at, at(9, 0));
        assert_eq!(sessions[1].started_at, at(8, 0));
    }

    #[test]
    fn stale_scan_spans_all_users() {
        let db = Database::open_memory().unwrap();
        db.insert_open_session(&Session::open("u1", None, 25, at(1, 0)))
            .unwrap();
        db.insert_open_session(&Session::open("u2", None, 25, at(2, 0)))
            .unwrap();
        db.insert_open_session(&Session::open("u3", None, 25, at(5, 0)))
            .unwrap();
        let stale = db.open_sessions_started_before(at(3, 0)).unwrap();
        let users: Vec<_> = stale.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(users, vec!["u1", "u2"]);
    }
}
