//! CRUD operations for [`User`] records.

use chrono::Utc;
use rusqlite::params;

use myhub_shared::UserId;

use crate::database::{parse_timestamp, Store};
use crate::error::{Result, StoreError};
use crate::models::User;

impl Store {
    // ------------------------------------------------------------------
    // Login upsert
    // ------------------------------------------------------------------

    /// Record a successful login: create the user on first sight, otherwise
    /// refresh name, avatar, address, and `last_login`. The block flag is
    /// never touched here.
    pub fn upsert_login(
        &self,
        user_id: &UserId,
        user_name: &str,
        user_avatar: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<User> {
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO users (user_id, user_name, user_avatar, ip_address, is_blocked, last_login, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                 user_name   = excluded.user_name,
                 user_avatar = excluded.user_avatar,
                 ip_address  = excluded.ip_address,
                 last_login  = excluded.last_login,
                 updated_at  = excluded.updated_at",
            params![user_id.as_str(), user_name, user_avatar, ip_address, now],
        )?;
        self.get_user(user_id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by Discord snowflake.
    pub fn get_user(&self, user_id: &UserId) -> Result<User> {
        self.conn()?
            .query_row(
                "SELECT user_id, user_name, user_avatar, ip_address, is_blocked, block_reason,
                        last_login, created_at, updated_at
                 FROM users WHERE user_id = ?1",
                params![user_id.as_str()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Whether the user is currently blocked. Unknown users are not blocked.
    pub fn is_blocked(&self, user_id: &UserId) -> Result<bool> {
        match self.conn()?.query_row(
            "SELECT is_blocked FROM users WHERE user_id = ?1",
            params![user_id.as_str()],
            |row| row.get::<_, bool>(0),
        ) {
            Ok(blocked) => Ok(blocked),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    /// List every known user, most recent login first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, user_name, user_avatar, ip_address, is_blocked, block_reason,
                    last_login, created_at, updated_at
             FROM users
             ORDER BY last_login DESC",
        )?;

        let rows = stmt.query_map([], row_to_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Moderation
    // ------------------------------------------------------------------

    /// Block a user with the given reason. Returns `true` if a row changed.
    pub fn block_user(&self, user_id: &UserId, reason: &str) -> Result<bool> {
        let affected = self.conn()?.execute(
            "UPDATE users SET is_blocked = 1, block_reason = ?2, updated_at = ?3
             WHERE user_id = ?1",
            params![user_id.as_str(), reason, Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    /// Clear the block flag and reason. Returns `true` if a row changed.
    pub fn unblock_user(&self, user_id: &UserId) -> Result<bool> {
        let affected = self.conn()?.execute(
            "UPDATE users SET is_blocked = 0, block_reason = NULL, updated_at = ?2
             WHERE user_id = ?1",
            params![user_id.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    /// Delete a user together with their conversation and messages.
    ///
    /// The deletes run in one transaction, ordered to satisfy referential
    /// constraints: messages the user sent anywhere, their conversation
    /// (cascading its remaining messages), then the user row itself.
    pub fn delete_user(&self, user_id: &UserId) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM messages WHERE sender_id = ?1",
            params![user_id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM conversations WHERE user_id = ?1",
            params![user_id.as_str()],
        )?;
        let affected = tx.execute(
            "DELETE FROM users WHERE user_id = ?1",
            params![user_id.as_str()],
        )?;

        tx.commit()?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let user_id: String = row.get(0)?;
    let last_login: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(User {
        user_id: UserId::from(user_id),
        user_name: row.get(1)?,
        user_avatar: row.get(2)?,
        ip_address: row.get(3)?,
        is_blocked: row.get(4)?,
        block_reason: row.get(5)?,
        last_login: parse_timestamp(&last_login, 6)?,
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
    fn upsert_creates_then_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = UserId::from("100");

        let created = store
            .upsert_login(&id, "blake", None, Some("203.0.113.9"))
            .unwrap();
        assert_eq!(created.user_name, "blake");
        assert!(!created.is_blocked);

        let updated = store
            .upsert_login(&id, "blake2", Some("https://cdn.example/a.png"), Some("203.0.113.10"))
            .unwrap();
        assert_eq!(updated.user_name, "blake2");
        assert_eq!(updated.ip_address.as_deref(), Some("203.0.113.10"));
        assert_eq!(updated.created_at, created.created_at);

        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn upsert_preserves_block_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = UserId::from("100");

        store.upsert_login(&id, "blake", None, None).unwrap();
        assert!(store.block_user(&id, "spam").unwrap());
        assert!(store.is_blocked(&id).unwrap());

        // Logging in again must not clear the block.
        store.upsert_login(&id, "blake", None, None).unwrap();
        assert!(store.is_blocked(&id).unwrap());

        assert!(store.unblock_user(&id).unwrap());
        assert!(!store.is_blocked(&id).unwrap());
        assert_eq!(store.get_user(&id).unwrap().block_reason, None);
    }

    #[test]
    fn unknown_user_is_not_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        assert!(!store.is_blocked(&UserId::from("missing")).unwrap());
    }

    #[test]
    fn list_users_orders_by_last_login_desc() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.upsert_login(&UserId::from("1"), "first", None, None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.upsert_login(&UserId::from("2"), "second", None, None).unwrap();

        let users = store.list_users().unwrap();
        assert_eq!(users[0].user_name, "second");
        assert_eq!(users[1].user_name, "first");
    }

    #[test]
    fn get_missing_user_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        assert!(matches!(
            store.get_user(&UserId::from("missing")),
            Err(StoreError::NotFound)
        ));
    }
}
