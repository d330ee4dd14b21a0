use rusqlite::types::ToSql;
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use tracing::{debug, warn};

use crate::models::{MessageRow, MessageSummary, NewMessage};
use crate::{SqliteStore, Store, StoreError, migrations};

/// Upper bound on bound parameters per statement (SQLITE_MAX_VARIABLE_NUMBER).
const MAX_PARAMS: usize = 32766;
const MESSAGE_COLUMNS: usize = 4;

impl Store for SqliteStore {
    fn bootstrap(&self) -> Result<(), StoreError> {
        self.with_conn(migrations::bootstrap)
    }

    // -- Users --

    fn find_recipient(&self, username: &str) -> Result<String, StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id FROM users WHERE username = ?1", [username], |row| {
                row.get(0)
            })
            .or_not_found()
        })
    }

    fn register_user(&self, user_id: &str, username: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (id, username) VALUES (?1, ?2)",
                (user_id, username),
            ) {
                Ok(_) => Ok(()),
                Err(e) if is_constraint_violation(&e) => {
                    debug!("User {} / {} already registered", user_id, username);
                    Err(StoreError::Conflict)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    // -- Messages --

    fn list_messages(&self, user_id: &str) -> Result<Vec<MessageSummary>, StoreError> {
        self.with_conn(|conn| query_inbox(conn, user_id))
    }

    fn get_message(&self, id: i64) -> Result<MessageRow, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT m.id, u.username, m.payload, m.sent_at
                 FROM messages m
                 JOIN users u ON m.sender = u.id
                 WHERE m.id = ?1",
                [id],
                |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        sender: row.get(1)?,
                        payload: row.get(2)?,
                        sent_at: row.get(3)?,
                    })
                },
            )
            .or_not_found()
        })
    }

    fn save_messages(&self, messages: &[NewMessage]) -> Result<(), StoreError> {
        if messages.is_empty() {
            return Ok(());
        }

        self.with_conn(|conn| {
            // Take the write lock up front so pool slots wait on the busy timeout
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for chunk in messages.chunks(MAX_PARAMS / MESSAGE_COLUMNS) {
                insert_messages(&tx, chunk)?;
            }
            tx.commit()?;
            Ok(())
        })
    }
}

fn query_inbox(conn: &Connection, user_id: &str) -> Result<Vec<MessageSummary>, StoreError> {
    // Inner join: messages whose sender is not a registered user are not listed
    let mut stmt = conn.prepare(
        "SELECT m.id, u.username, m.sent_at
         FROM messages m
         JOIN users u ON m.sender = u.id
         WHERE m.recipient = ?1
         ORDER BY m.id",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(MessageSummary {
                id: row.get(0)?,
                sender: row.get(1)?,
                sent_at: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// One multi-row INSERT for the whole chunk.
fn insert_messages(conn: &Connection, messages: &[NewMessage]) -> Result<(), StoreError> {
    let placeholders: Vec<String> = (0..messages.len())
        .map(|i| {
            let base = i * MESSAGE_COLUMNS;
            format!("(?{}, ?{}, ?{}, ?{})", base + 1, base + 2, base + 3, base + 4)
        })
        .collect();
    let sql = format!(
        "INSERT INTO messages (sender, recipient, payload, sent_at) VALUES {}",
        placeholders.join(", ")
    );

    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(messages.len() * MESSAGE_COLUMNS);
    for m in messages {
        params.push(&m.sender);
        params.push(&m.recipient);
        params.push(&m.payload);
        params.push(&m.sent_at);
    }

    let inserted = conn.execute(&sql, params.as_slice())?;
    if inserted != messages.len() {
        warn!("Inserted {} rows for a batch of {}", inserted, messages.len());
    }
    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Maps an empty single-row result to [`StoreError::NotFound`].
trait NotFoundExt<T> {
    fn or_not_found(self) -> Result<T, StoreError>;
}

impl<T> NotFoundExt<T> for Result<T, rusqlite::Error> {
    fn or_not_found(self) -> Result<T, StoreError> {
        match self {
            Ok(val) => Ok(val),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
