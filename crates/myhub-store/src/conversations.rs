//! CRUD operations for [`Conversation`] records.

use chrono::Utc;
use rusqlite::{params, Transaction};
use uuid::Uuid;

use myhub_shared::UserId;

use crate::database::{parse_timestamp, Store};
use crate::error::{Result, StoreError};
use crate::models::{Conversation, ConversationStatus};

impl Store {
    // ------------------------------------------------------------------
    // Get-or-create
    // ------------------------------------------------------------------

    /// Fetch the caller's conversation, creating it on first use.
    ///
    /// Runs in a transaction so two concurrent first calls cannot race past
    /// the existence check; the unique constraint on `user_id` backs the
    /// one-conversation-per-user rule either way.
    pub fn get_or_create_conversation(
        &self,
        user_id: &UserId,
        user_name: &str,
        user_avatar: Option<&str>,
    ) -> Result<Conversation> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let Some(existing) = query_conversation_for_owner(&tx, user_id)? {
            tx.commit()?;
            return Ok(existing);
        }

        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            user_name: user_name.to_string(),
            user_avatar: user_avatar.map(str::to_string),
            last_message: None,
            last_message_at: Utc::now(),
            status: ConversationStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        tx.execute(
            "INSERT INTO conversations
                 (id, user_id, user_name, user_avatar, last_message, last_message_at, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?8)",
            params![
                conversation.id.to_string(),
                conversation.user_id.as_str(),
                conversation.user_name,
                conversation.user_avatar,
                conversation.last_message_at.to_rfc3339(),
                conversation.status.as_str(),
                conversation.created_at.to_rfc3339(),
                conversation.updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        tracing::info!(id = %conversation.id, user = %user_id, "conversation created");
        Ok(conversation)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single conversation by UUID.
    pub fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.conn()?
            .query_row(
                &format!("{SELECT_CONVERSATION} WHERE id = ?1"),
                params![id.to_string()],
                row_to_conversation,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List every conversation, most recent activity first. Admin view.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("{SELECT_CONVERSATION} ORDER BY last_message_at DESC"))?;
        let rows = stmt.query_map([], row_to_conversation)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// List the conversations owned by one user (at most one, by constraint).
    pub fn list_conversations_for_owner(&self, user_id: &UserId) -> Result<Vec<Conversation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_CONVERSATION} WHERE user_id = ?1 ORDER BY last_message_at DESC"
        ))?;
        let rows = stmt.query_map(params![user_id.as_str()], row_to_conversation)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Toggle a conversation open or closed. Returns `false` when the id
    /// has no row.
    pub fn set_conversation_status(&self, id: Uuid, status: ConversationStatus) -> Result<bool> {
        let affected = self.conn()?.execute(
            "UPDATE conversations SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), status.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a conversation and its messages. Returns `true` if a row was
    /// deleted.
    pub fn delete_conversation(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // Explicit child delete first; the FK cascade would also cover this.
        tx.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            params![id.to_string()],
        )?;
        let affected = tx.execute(
            "DELETE FROM conversations WHERE id = ?1",
            params![id.to_string()],
        )?;

        tx.commit()?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SELECT_CONVERSATION: &str = "SELECT id, user_id, user_name, user_avatar, last_message,
        last_message_at, status, created_at, updated_at
 FROM conversations";

/// Fetch a conversation by owner inside an open transaction.
pub(crate) fn query_conversation_for_owner(
    tx: &Transaction<'_>,
    user_id: &UserId,
) -> Result<Option<Conversation>> {
    match tx.query_row(
        &format!("{SELECT_CONVERSATION} WHERE user_id = ?1"),
        params![user_id.as_str()],
        row_to_conversation,
    ) {
        Ok(conversation) => Ok(Some(conversation)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(other) => Err(StoreError::Sqlite(other)),
    }
}

/// Map a `rusqlite::Row` to a [`Conversation`].
pub(crate) fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let id_str: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let last_message_at: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status = ConversationStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown conversation status: {status_str}").into(),
        )
    })?;

    Ok(Conversation {
        id,
        user_id: UserId::from(user_id),
        user_name: row.get(2)?,
        user_avatar: row.get(3)?,
        last_message: row.get(4)?,
        last_message_at: parse_timestamp(&last_message_at, 5)?,
        status,
        created_at: parse_timestamp(&created_at, 7)?,
        updated_at: parse_timestamp(&updated_at, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store(dir: &tempfile::TempDir) -> Store {
        Store::open(&dir.path().join("test.db")).unwrap()
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let owner = UserId::from("42");

        let first = store
            .get_or_create_conversation(&owner, "blake", None)
            .unwrap();
        let second = store
            .get_or_create_conversation(&owner, "blake", None)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.list_conversations().unwrap().len(), 1);
    }

    #[test]
    fn owner_listing_excludes_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let mine = store
            .get_or_create_conversation(&UserId::from("1"), "one", None)
            .unwrap();
        store
            .get_or_create_conversation(&UserId::from("2"), "two", None)
            .unwrap();

        let listed = store
            .list_conversations_for_owner(&UserId::from("1"))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        assert_eq!(store.list_conversations().unwrap().len(), 2);
    }

    #[test]
    fn status_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let conversation = store
            .get_or_create_conversation(&UserId::from("1"), "one", None)
            .unwrap();

        assert!(store
            .set_conversation_status(conversation.id, ConversationStatus::Closed)
            .unwrap());
        assert_eq!(
            store.get_conversation(conversation.id).unwrap().status,
            ConversationStatus::Closed
        );

        assert!(store
            .set_conversation_status(conversation.id, ConversationStatus::Open)
            .unwrap());
        assert_eq!(
            store.get_conversation(conversation.id).unwrap().status,
            ConversationStatus::Open
        );
    }

    #[test]
    fn set_status_on_missing_conversation_reports_no_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        assert!(!store
            .set_conversation_status(Uuid::new_v4(), ConversationStatus::Closed)
            .unwrap());
    }

    #[test]
    fn get_missing_conversation_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        assert!(matches!(
            store.get_conversation(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }
}
