//! CRUD operations for [`Message`] records, including the transactional
//! send path.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use myhub_shared::UserId;

use crate::conversations::row_to_conversation;
use crate::database::{parse_timestamp, Store};
use crate::error::{Result, StoreError};
use crate::models::{ConversationStatus, Message};

impl Store {
    // ------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------

    /// Persist a message and refresh the owning conversation's summary.
    ///
    /// The ownership and open-status checks, the insert, and the summary
    /// update all run inside one transaction, so a conversation cannot be
    /// closed or deleted between the permission check and the write.
    ///
    /// Errors: [`StoreError::NotFound`] when the conversation id has no
    /// row, [`StoreError::NotOwner`] when a non-admin sender does not own
    /// it, [`StoreError::Closed`] when its status is `closed`.
    pub fn send_message(&self, message: &Message) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let conversation = tx
            .query_row(
                "SELECT id, user_id, user_name, user_avatar, last_message,
                        last_message_at, status, created_at, updated_at
                 FROM conversations WHERE id = ?1",
                params![message.conversation_id.to_string()],
                row_to_conversation,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        if !message.is_admin && conversation.user_id != message.sender_id {
            return Err(StoreError::NotOwner);
        }
        if conversation.status == ConversationStatus::Closed {
            return Err(StoreError::Closed);
        }

        tx.execute(
            "INSERT INTO messages
                 (id, conversation_id, sender_id, sender_name, sender_avatar, content, is_admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id.to_string(),
                message.conversation_id.to_string(),
                message.sender_id.as_str(),
                message.sender_name,
                message.sender_avatar,
                message.content,
                message.is_admin,
                message.created_at.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "UPDATE conversations
             SET last_message = ?2, last_message_at = ?3, updated_at = ?3
             WHERE id = ?1",
            params![
                message.conversation_id.to_string(),
                message.content,
                message.created_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// List a conversation's messages oldest-first. Callers are expected to
    /// have checked conversation visibility already.
    pub fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, sender_id, sender_name, sender_avatar, content, is_admin, created_at
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id.to_string()], row_to_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Messages sent since the given instant, for polling clients.
    pub fn list_messages_since(
        &self,
        conversation_id: Uuid,
        since: chrono::DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, sender_id, sender_name, sender_avatar, content, is_admin, created_at
             FROM messages
             WHERE conversation_id = ?1 AND created_at > ?2
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(
            params![conversation_id.to_string(), since.to_rfc3339()],
            row_to_message,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let conversation_str: String = row.get(1)?;
    let sender_id: String = row.get(2)?;
    let created_at: String = row.get(7)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let conversation_id = Uuid::parse_str(&conversation_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Message {
        id,
        conversation_id,
        sender_id: UserId::from(sender_id),
        sender_name: row.get(3)?,
        sender_avatar: row.get(4)?,
        content: row.get(5)?,
        is_admin: row.get(6)?,
        created_at: parse_timestamp(&created_at, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn open_store(dir: &tempfile::TempDir) -> Store {
        Store::open(&dir.path().join("test.db")).unwrap()
    }

    fn message(conversation_id: Uuid, sender: &str, content: &str, is_admin: bool) -> Message {
        Message::new(
            conversation_id,
            UserId::from(sender),
            sender.to_string(),
            None,
            content.to_string(),
            is_admin,
        )
    }

    #[test]
    fn send_and_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let conversation = store
            .get_or_create_conversation(&UserId::from("1"), "one", None)
            .unwrap();

        let first = message(conversation.id, "1", "hello", false);
        store.send_message(&first).unwrap();
        let mut second = message(conversation.id, "1", "again", false);
        second.created_at = first.created_at + Duration::milliseconds(10);
        store.send_message(&second).unwrap();

        let listed = store.list_messages(conversation.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].content, "hello");
        assert_eq!(listed[1].content, "again");

        // The conversation summary follows the latest message.
        let refreshed = store.get_conversation(conversation.id).unwrap();
        assert_eq!(refreshed.last_message.as_deref(), Some("again"));
        assert_eq!(refreshed.last_message_at, second.created_at);
    }

    #[test]
    fn send_to_missing_conversation_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let err = store
            .send_message(&message(Uuid::new_v4(), "1", "hello", false))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn foreign_sender_is_rejected_admin_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let conversation = store
            .get_or_create_conversation(&UserId::from("1"), "one", None)
            .unwrap();

        let err = store
            .send_message(&message(conversation.id, "2", "intruding", false))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotOwner));

        store
            .send_message(&message(conversation.id, "2", "admin reply", true))
            .unwrap();
        assert_eq!(store.list_messages(conversation.id).unwrap().len(), 1);
    }

    #[test]
    fn closed_conversation_rejects_sends() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let conversation = store
            .get_or_create_conversation(&UserId::from("1"), "one", None)
            .unwrap();
        store
            .set_conversation_status(conversation.id, ConversationStatus::Closed)
            .unwrap();

        let owner_err = store
            .send_message(&message(conversation.id, "1", "hello?", false))
            .unwrap_err();
        assert!(matches!(owner_err, StoreError::Closed));

        // Closed means closed for the admin too; reopen first.
        let admin_err = store
            .send_message(&message(conversation.id, "9", "hi", true))
            .unwrap_err();
        assert!(matches!(admin_err, StoreError::Closed));
    }

    #[test]
    fn deleting_conversation_removes_messages() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let conversation = store
            .get_or_create_conversation(&UserId::from("1"), "one", None)
            .unwrap();
        store
            .send_message(&message(conversation.id, "1", "hello", false))
            .unwrap();

        assert!(store.delete_conversation(conversation.id).unwrap());
        assert!(store.list_messages(conversation.id).unwrap().is_empty());
        assert!(matches!(
            store.get_conversation(conversation.id),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn deleting_user_cascades_to_conversation_and_messages() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let owner = UserId::from("1");
        store.upsert_login(&owner, "one", None, None).unwrap();
        let conversation = store
            .get_or_create_conversation(&owner, "one", None)
            .unwrap();
        store
            .send_message(&message(conversation.id, "1", "hello", false))
            .unwrap();
        store
            .send_message(&message(conversation.id, "9", "reply", true))
            .unwrap();

        assert!(store.delete_user(&owner).unwrap());
        assert!(store.list_conversations().unwrap().is_empty());
        assert!(store.list_messages(conversation.id).unwrap().is_empty());
        assert!(matches!(store.get_user(&owner), Err(StoreError::NotFound)));
    }

    #[test]
    fn list_messages_since_filters_older() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let conversation = store
            .get_or_create_conversation(&UserId::from("1"), "one", None)
            .unwrap();

        let first = message(conversation.id, "1", "old", false);
        store.send_message(&first).unwrap();
        let mut second = message(conversation.id, "1", "new", false);
        second.created_at = first.created_at + Duration::seconds(1);
        store.send_message(&second).unwrap();

        let recent = store
            .list_messages_since(conversation.id, first.created_at)
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "new");
    }
}
