use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

// Plain CREATE statements: running this twice fails on the existing tables.
const SCHEMA: &str = "
    CREATE TABLE users (
        id          TEXT PRIMARY KEY NOT NULL,
        username    TEXT
    );

    CREATE UNIQUE INDEX username_idx ON users (username);

    CREATE TABLE messages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        sender      TEXT,
        recipient   TEXT,
        payload     TEXT,
        sent_at     TEXT,
        read_at     TEXT DEFAULT NULL
    );

    CREATE INDEX recipient_idx ON messages (recipient);
";

pub fn bootstrap(conn: &mut Connection) -> Result<(), StoreError> {
    // Dropping the transaction without commit rolls back every statement.
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.commit()?;

    info!("Store schema created");
    Ok(())
}
