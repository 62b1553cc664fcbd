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
        info!("Running migration v1 (users, collections, tags, stashes)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                username            TEXT NOT NULL UNIQUE,
                email               TEXT NOT NULL COLLATE NOCASE UNIQUE,
                password            TEXT NOT NULL,
                email_verified      INTEGER NOT NULL DEFAULT 0,
                email_verified_at   TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE TABLE collections (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                description TEXT,
                created_at  TEXT NOT NULL,
                UNIQUE(user_id, name)
            );

            CREATE TABLE tags (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE stashes (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title           TEXT,
                body            TEXT NOT NULL,
                checklist       TEXT,
                preview         TEXT NOT NULL,
                collection_id   INTEGER REFERENCES collections(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_stashes_user
                ON stashes(user_id, created_at);

            -- Tags are never cascaded away: orphans are pruned explicitly.
            CREATE TABLE stash_tags (
                stash_id    TEXT NOT NULL REFERENCES stashes(id) ON DELETE CASCADE,
                tag_id      INTEGER NOT NULL REFERENCES tags(id),
                PRIMARY KEY (stash_id, tag_id)
            );

            CREATE INDEX idx_stash_tags_tag
                ON stash_tags(tag_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (relay sessions)");
        conn.execute_batch(
            "
            CREATE TABLE relay_sessions (
                id          TEXT PRIMARY KEY,
                code        TEXT NOT NULL UNIQUE,
                owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                prompt      TEXT,
                is_closed   INTEGER NOT NULL DEFAULT 0,
                max_entries INTEGER NOT NULL DEFAULT 8,
                created_at  TEXT NOT NULL,
                closed_at   TEXT
            );

            CREATE TABLE relay_entries (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL REFERENCES relay_sessions(id) ON DELETE CASCADE,
                author_name TEXT NOT NULL,
                body        TEXT NOT NULL,
                position    INTEGER NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(session_id, position)
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
