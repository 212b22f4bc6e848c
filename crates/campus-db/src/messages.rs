use rusqlite::Connection;

use crate::models::HistoryRow;
use crate::{Database, OptionalExt, Result};

impl Database {
    /// Every message the user sent or received, oldest (lowest id) first.
    pub fn fetch_history(&self, user_id: i64) -> Result<Vec<HistoryRow>> {
        self.with_conn(|conn| query_history(conn, user_id))
    }

    /// Resolve a username or a decimal user id to a user id.
    /// A username match wins over an id match.
    pub fn resolve_recipient(&self, identifier: &str) -> Result<Option<i64>> {
        let numeric_id = identifier.trim().parse::<i64>().ok();
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM users
                 WHERE username = ?1 OR id = ?2
                 ORDER BY (username = ?1) DESC
                 LIMIT 1",
                rusqlite::params![identifier, numeric_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Append a message and return its id. The sender is not validated.
    pub fn append_message(&self, sender_id: i64, receiver_id: i64, content: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (sender_id, receiver_id, content) VALUES (?1, ?2, ?3)",
                rusqlite::params![sender_id, receiver_id, content],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }
}

fn query_history(conn: &Connection, user_id: i64) -> Result<Vec<HistoryRow>> {
    // LEFT JOIN so messages from unknown senders still appear
    let mut stmt = conn.prepare(
        "SELECT m.id, m.sender_id, m.receiver_id, m.content,
                COALESCE(s.username, 'unknown'),
                COALESCE(r.username, 'unknown'),
                m.receiver_id = ?1
         FROM messages m
         LEFT JOIN users s ON s.id = m.sender_id
         LEFT JOIN users r ON r.id = m.receiver_id
         WHERE m.sender_id = ?1 OR m.receiver_id = ?1
         ORDER BY m.id ASC",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(HistoryRow {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                content: row.get(3)?,
                sender_name: row.get(4)?,
                receiver_name: row.get(5)?,
                is_receiver: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
