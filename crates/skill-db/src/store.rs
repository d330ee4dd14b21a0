use crate::StoreError;
use crate::models::{MessageRow, MessageSummary, NewMessage};

/// Persistence capabilities the skill relies on.
///
/// Calls are blocking round-trips; async callers should run them on the
/// blocking pool. Implementations must be safe to share across threads.
pub trait Store: Send + Sync {
    /// Create users and messages tables with their indexes in one
    /// transaction. Only valid against a fresh database.
    fn bootstrap(&self) -> Result<(), StoreError>;

    /// Resolve a username to its user id.
    fn find_recipient(&self, username: &str) -> Result<String, StoreError>;

    /// Inbox of `user_id` in arrival order, without payloads.
    fn list_messages(&self, user_id: &str) -> Result<Vec<MessageSummary>, StoreError>;

    fn get_message(&self, id: i64) -> Result<MessageRow, StoreError>;

    /// Persist a batch atomically. Each record supplies its own recipient
    /// and timestamp.
    fn save_messages(&self, messages: &[NewMessage]) -> Result<(), StoreError>;

    fn save_message(&self, message: &NewMessage) -> Result<(), StoreError> {
        self.save_messages(std::slice::from_ref(message))
    }

    /// Fails with [`StoreError::Conflict`] if the id or username is taken.
    fn register_user(&self, user_id: &str, username: &str) -> Result<(), StoreError>;
}
