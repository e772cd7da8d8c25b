//! SQLite schema for the search index.
//!
//! `emails_fts` is an external-content FTS5 table over `emails`. It is never
//! written directly: the three triggers below mirror every insert, update and
//! delete on `emails` inside the same transaction.

/// Bumped whenever the table layout changes; stored in `index_metadata`.
pub const SCHEMA_VERSION: u32 = 1;

/// Tables, indexes, FTS shadow, triggers and the metadata table.
pub const CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS emails (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id          TEXT NOT NULL DEFAULT '',
    file_path           TEXT NOT NULL UNIQUE,
    from_address        TEXT NOT NULL DEFAULT '' COLLATE NOCASE,
    from_name           TEXT NOT NULL DEFAULT '',
    to_addresses        TEXT NOT NULL DEFAULT '[]',
    cc_addresses        TEXT NOT NULL DEFAULT '[]',
    bcc_addresses       TEXT NOT NULL DEFAULT '[]',
    subject             TEXT NOT NULL DEFAULT '' COLLATE NOCASE,
    date_sent           INTEGER,
    date_received       INTEGER,
    folder              TEXT NOT NULL DEFAULT '' COLLATE NOCASE,
    account             TEXT NOT NULL DEFAULT '' COLLATE NOCASE,
    has_attachments     INTEGER NOT NULL DEFAULT 0,
    attachment_names    TEXT NOT NULL DEFAULT '[]',
    body_preview        TEXT NOT NULL DEFAULT '',
    body_text           TEXT,
    indexed_at          INTEGER NOT NULL,
    last_modified_ticks INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_emails_from ON emails(from_address);
CREATE INDEX IF NOT EXISTS idx_emails_date_sent ON emails(date_sent);
CREATE INDEX IF NOT EXISTS idx_emails_folder ON emails(folder);
CREATE INDEX IF NOT EXISTS idx_emails_account ON emails(account);
CREATE INDEX IF NOT EXISTS idx_emails_message_id ON emails(message_id);

CREATE VIRTUAL TABLE IF NOT EXISTS emails_fts USING fts5(
    subject,
    body_text,
    from_address,
    to_addresses,
    content='emails',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS emails_ai AFTER INSERT ON emails BEGIN
    INSERT INTO emails_fts(rowid, subject, body_text, from_address, to_addresses)
    VALUES (new.id, new.subject, new.body_text, new.from_address, new.to_addresses);
END;

CREATE TRIGGER IF NOT EXISTS emails_ad AFTER DELETE ON emails BEGIN
    INSERT INTO emails_fts(emails_fts, rowid, subject, body_text, from_address, to_addresses)
    VALUES ('delete', old.id, old.subject, old.body_text, old.from_address, old.to_addresses);
END;

CREATE TRIGGER IF NOT EXISTS emails_au AFTER UPDATE ON emails BEGIN
    INSERT INTO emails_fts(emails_fts, rowid, subject, body_text, from_address, to_addresses)
    VALUES ('delete', old.id, old.subject, old.body_text, old.from_address, old.to_addresses);
    INSERT INTO emails_fts(rowid, subject, body_text, from_address, to_addresses)
    VALUES (new.id, new.subject, new.body_text, new.from_address, new.to_addresses);
END;

CREATE TABLE IF NOT EXISTS index_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Drops every object created by [`CREATE`]. Triggers go with their table.
pub const DROP: &str = r#"
DROP TABLE IF EXISTS emails_fts;
DROP TABLE IF EXISTS emails;
DROP TABLE IF EXISTS index_metadata;
"#;
