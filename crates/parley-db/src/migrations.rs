use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN IMMEDIATE;

            CREATE TABLE IF NOT EXISTS users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                photo_url   TEXT,
                created_at  TEXT NOT NULL
            );

            -- pair_key is set only for private conversations: the two member
            -- ids sorted and joined. UNIQUE makes a duplicate private chat
            -- between the same pair impossible. NULLs do not collide.
            CREATE TABLE IF NOT EXISTS conversations (
                id          TEXT PRIMARY KEY,
                name        TEXT,
                is_group    INTEGER NOT NULL CHECK (is_group IN (0, 1)),
                photo_url   TEXT,
                pair_key    TEXT UNIQUE,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS group_members (
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id),
                joined_at       TEXT NOT NULL,
                PRIMARY KEY (conversation_id, user_id)
            );

            CREATE INDEX IF NOT EXISTS idx_group_members_user
                ON group_members(user_id, conversation_id);

            CREATE TABLE IF NOT EXISTS messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id       TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                reply_to        TEXT REFERENCES messages(id) ON DELETE SET NULL,
                forwarded_from  TEXT REFERENCES users(id),
                sent_at         TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'sent'
                                CHECK (status IN ('pending', 'sent', 'delivered', 'read')),
                delivered_at    TEXT,
                read_at         TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, sent_at, id);

            CREATE TABLE IF NOT EXISTS message_reactions (
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                reaction    TEXT NOT NULL,
                reacted_at  TEXT NOT NULL,
                PRIMARY KEY (message_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS read_receipts (
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                read_at     TEXT NOT NULL,
                PRIMARY KEY (message_id, user_id)
            );

            INSERT INTO schema_version (version)
                SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version WHERE version = 1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
