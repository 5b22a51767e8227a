use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::database::{decode_date, encode_date, Database};
use crate::error::{DatabaseError, Result};
use crate::streak::{ActivityType, Streak, StreakStore};

fn row_to_streak(row: &Row) -> rusqlite::Result<Streak> {
    let activity: String = row.get(2)?;
    let last_credited: String = row.get(5)?;
    Ok(Streak {
        id: row.get(0)?,
        user_id: row.get(1)?,
        activity_type: activity.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
        })?,
        current: row.get(3)?,
        longest: row.get(4)?,
        last_credited: decode_date(5, &last_credited)?,
    })
}

fn select_streak(
    conn: &Connection,
    user_id: &str,
    activity: ActivityType,
) -> rusqlite::Result<Option<Streak>> {
    conn.query_row(
        "SELECT id, user_id, activity_type, current_count, longest_count, last_credited
         FROM streaks WHERE user_id = ?1 AND activity_type = ?2",
        params![user_id, activity.as_str()],
        row_to_streak,
    )
    .optional()
}

impl StreakStore for Database {
    fn find_streak(&self, user_id: &str, activity: ActivityType) -> Result<Option<Streak>> {
        let conn = self.conn();
        Ok(select_streak(&conn, user_id, activity)?)
    }

    fn modify_streak(
        &self,
        user_id: &str,
        activity: ActivityType,
        apply: &mut dyn FnMut(Option<Streak>) -> Option<Streak>,
    ) -> Result<()> {
        let mut conn = self.conn();
        // IMMEDIATE takes the write lock up front so two writers cannot both
        // read the same row and then both write.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DatabaseError::from)?;

        let existing = select_streak(&tx, user_id, activity)?;
        if let Some(next) = apply(existing) {
            if next.current > next.longest {
                return Err(DatabaseError::QueryFailed(format!(
                    "refusing to store streak {} with current {} above longest {}",
                    next.id, next.current, next.longest
                ))
                .into());
            }
            tx.execute(
                "INSERT INTO streaks
                    (id, user_id, activity_type, current_count, longest_count, last_credited)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, activity_type) DO UPDATE SET
                    current_count = excluded.current_count,
                    longest_count = excluded.longest_count,
                    last_credited = excluded.last_credited",
                params![
                    next.id,
                    next.user_id,
                    next.activity_type.as_str(),
                    next.current,
                    next.longest,
                    encode_date(next.last_credited),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    #[test]
    fn modify_creates_then_updates_in_place() {
        let db = Database::open_memory().unwrap();
        db.modify_streak("u1", ActivityType::FocusSession, &mut |existing| {
            assert!(existing.is_none());
            Some(Streak::start("u1", ActivityType::FocusSession, day(1)))
        })
        .unwrap();
        let created = db.find_streak("u1", ActivityType::FocusSession).unwrap().unwrap();

        db.modify_streak("u1", ActivityType::FocusSession, &mut |existing| {
            let mut streak = existing.unwrap();
            streak.credit(day(2));
            Some(streak)
        })
        .unwrap();
        let updated = db.find_streak("u1", ActivityType::FocusSession).unwrap().unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.current, 2);
        assert_eq!(updated.last_credited, day(2));
    }

    #[test]
    fn returning_none_writes_nothing() {
        let db = Database::open_memory().unwrap();
        db.modify_streak("u1", ActivityType::TaskCompletion, &mut |_| None)
            .unwrap();
        assert!(db
            .find_streak("u1", ActivityType::TaskCompletion)
            .unwrap()
            .is_none());
    }

    #[test]
    fn current_above_longest_is_rejected() {
        let db = Database::open_memory().unwrap();
        let result = db.modify_streak("u1", ActivityType::FocusSession, &mut |_| {
            let mut streak = Streak::start("u1", ActivityType::FocusSession, day(1));
            streak.current = 3;
            Some(streak)
        });
        assert!(result.is_err());
        assert!(db.find_streak("u1", ActivityType::FocusSession).unwrap().is_none());
    }
}
