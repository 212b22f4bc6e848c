use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS colleges (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL UNIQUE,
            olympic_sport   TEXT,
            location        TEXT,
            address         TEXT,
            founding_year   INTEGER,
            image           TEXT,
            phone_number    TEXT,
            email           TEXT,
            website         TEXT,
            cost_details    TEXT,
            admissions      TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            username        TEXT NOT NULL UNIQUE,
            email           TEXT NOT NULL,
            password        TEXT NOT NULL,
            first_name      TEXT NOT NULL,
            last_name       TEXT NOT NULL,
            user_type       TEXT NOT NULL CHECK (user_type IN ('student', 'staff', 'admin')),
            avatar          TEXT,
            olympic_sport   TEXT,
            olympic_medal   TEXT,
            college_id      INTEGER REFERENCES colleges(id) ON DELETE SET NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- No foreign key on sender_id: senders are not validated on append.
        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id       INTEGER NOT NULL,
            receiver_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content         TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(sender_id, id);

        CREATE INDEX IF NOT EXISTS idx_messages_receiver
            ON messages(receiver_id, id);

        CREATE TABLE IF NOT EXISTS college_ratings (
            college_id      INTEGER NOT NULL REFERENCES colleges(id) ON DELETE CASCADE,
            user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            rating          REAL NOT NULL CHECK (rating >= 0 AND rating <= 5),
            PRIMARY KEY (college_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS favorite_colleges (
            user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            college_id      INTEGER NOT NULL REFERENCES colleges(id) ON DELETE CASCADE,
            date_added      TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, college_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
