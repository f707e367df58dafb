//! Database schema and migrations for Strongbox.
//!
//! Timestamps are INTEGER Unix milliseconds. Byte counts are INTEGER.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Users and sessions
    r#"
CREATE TABLE users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    tier          TEXT NOT NULL DEFAULT 'FREE' CHECK (tier IN ('FREE', 'PRO', 'PREMIUM')),
    storage_used  INTEGER NOT NULL DEFAULT 0 CHECK (storage_used >= 0),
    created_at    INTEGER NOT NULL
);

CREATE TABLE sessions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    token       TEXT NOT NULL UNIQUE,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    expires_at  INTEGER NOT NULL,
    created_at  INTEGER NOT NULL
);

CREATE INDEX idx_sessions_user_id ON sessions(user_id);
CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
"#,
    // v2: Folder tree and file metadata
    r#"
CREATE TABLE folders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    parent_id   INTEGER REFERENCES folders(id) ON DELETE CASCADE,  -- NULL for root level
    owner_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);

-- Sibling names are unique per owner; root level is parent 0
CREATE UNIQUE INDEX idx_folders_sibling_name ON folders(owner_id, COALESCE(parent_id, 0), name);
CREATE INDEX idx_folders_parent_id ON folders(parent_id);

CREATE TABLE files (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL,
    size             INTEGER NOT NULL CHECK (size >= 0),
    mime_type        TEXT NOT NULL,
    encryption_salt  TEXT NOT NULL,
    object_key       TEXT NOT NULL DEFAULT '',   -- empty while the upload is pending
    folder_id        INTEGER REFERENCES folders(id) ON DELETE CASCADE,
    owner_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL
);

CREATE INDEX idx_files_owner_folder ON files(owner_id, folder_id);
CREATE INDEX idx_files_folder_id ON files(folder_id);
CREATE INDEX idx_files_created_at ON files(created_at);
"#,
    // v3: Share links
    r#"
CREATE TABLE shares (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    token           TEXT NOT NULL UNIQUE,
    file_id         INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    expires_at      INTEGER NOT NULL,
    max_downloads   INTEGER CHECK (max_downloads IS NULL OR max_downloads >= 1),
    download_count  INTEGER NOT NULL DEFAULT 0,
    created_at      INTEGER NOT NULL,
    CHECK (max_downloads IS NULL OR download_count <= max_downloads)
);

CREATE INDEX idx_shares_file_id ON shares(file_id);
CREATE INDEX idx_shares_expires_at ON shares(expires_at);
"#,
    // v4: Append-only tier transition log
    r#"
CREATE TABLE subscription_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    from_tier   TEXT NOT NULL,
    to_tier     TEXT NOT NULL,
    changed_at  INTEGER NOT NULL
);

CREATE INDEX idx_subscription_history_user_id ON subscription_history(user_id);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_files_table_tracks_pending_uploads() {
        let v2 = MIGRATIONS[1];
        assert!(v2.contains("CREATE TABLE files"));
        assert!(v2.contains("object_key       TEXT NOT NULL DEFAULT ''"));
    }

    #[test]
    fn test_cascades_declared() {
        let all = MIGRATIONS.join("\n");
        assert!(all.contains("parent_id   INTEGER REFERENCES folders(id) ON DELETE CASCADE"));
        assert!(all.contains("folder_id        INTEGER REFERENCES folders(id) ON DELETE CASCADE"));
        assert!(all.contains("file_id         INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE"));
    }
}
