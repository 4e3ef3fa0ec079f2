//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `users`, `conversations`, and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY NOT NULL,   -- Discord snowflake
    user_name    TEXT NOT NULL,
    user_avatar  TEXT,
    ip_address   TEXT,
    is_blocked   INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    block_reason TEXT,
    last_login   TEXT NOT NULL,               -- ISO-8601 / RFC-3339
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_is_blocked ON users(is_blocked);
CREATE INDEX IF NOT EXISTS idx_users_ip_address ON users(ip_address);

-- ----------------------------------------------------------------
-- Conversations (one per user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    user_id         TEXT NOT NULL UNIQUE,       -- owning Discord snowflake
    user_name       TEXT NOT NULL,
    user_avatar     TEXT,
    last_message    TEXT,
    last_message_at TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'open',  -- 'open' | 'closed'
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_user_id ON conversations(user_id);
CREATE INDEX IF NOT EXISTS idx_conversations_status  ON conversations(status);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    conversation_id TEXT NOT NULL,              -- FK -> conversations(id)
    sender_id       TEXT NOT NULL,
    sender_name     TEXT NOT NULL,
    sender_avatar   TEXT,
    content         TEXT NOT NULL,
    is_admin        INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    created_at      TEXT NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_id ON messages(conversation_id);
CREATE INDEX IF NOT EXISTS idx_messages_created_at      ON messages(created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
