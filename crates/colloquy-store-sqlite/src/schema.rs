//! SQL schema for the Colloquy SQLite store.
//!
//! Executed once at connection startup. The UNIQUE constraints here are the
//! actual race preventers for the subsystem's invariants; application code
//! is only a thin map-the-violation-to-a-conflict wrapper around them.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY,
    email        TEXT NOT NULL,
    display_name TEXT NOT NULL,
    is_active    INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS groups (
    group_id    TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT,
    is_public   INTEGER NOT NULL DEFAULT 0,
    invite_code TEXT NOT NULL UNIQUE,  -- globally unique; regenerable
    created_by  TEXT NOT NULL REFERENCES users(user_id),
    created_at  TEXT NOT NULL
);

-- One row per (group, user); the UNIQUE pair constraint is what makes
-- concurrent duplicate joins observe a conflict instead of a second row.
CREATE TABLE IF NOT EXISTS memberships (
    membership_id TEXT PRIMARY KEY,
    group_id      TEXT NOT NULL REFERENCES groups(group_id),
    user_id       TEXT NOT NULL REFERENCES users(user_id),
    role          TEXT NOT NULL,    -- 'member' | 'mentor' | 'admin'
    joined_at     TEXT NOT NULL,
    UNIQUE (group_id, user_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    group_id   TEXT NOT NULL REFERENCES groups(group_id),
    title      TEXT NOT NULL,
    status     TEXT NOT NULL,       -- 'active' | 'completed' | 'cancelled'
    created_by TEXT NOT NULL REFERENCES users(user_id),
    started_at TEXT NOT NULL,
    ended_at   TEXT
);

CREATE TABLE IF NOT EXISTS session_participants (
    session_id TEXT NOT NULL REFERENCES sessions(session_id),
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    joined_at  TEXT NOT NULL,
    PRIMARY KEY (session_id, user_id)
);

-- Lossy presence side table; rows are pruned on a retention window and
-- never consulted for authorization.
CREATE TABLE IF NOT EXISTS session_presence (
    session_id   TEXT NOT NULL REFERENCES sessions(session_id),
    user_id      TEXT NOT NULL REFERENCES users(user_id),
    status       TEXT NOT NULL,     -- 'online' | 'offline'
    last_seen_at TEXT NOT NULL,
    PRIMARY KEY (session_id, user_id)
);

-- membership_id and reply_to are deliberately weak references (no FK):
-- attribution history survives a member leaving, and replies never form an
-- enforced chain that bulk deletes would have to maintain.
CREATE TABLE IF NOT EXISTS messages (
    message_id    TEXT PRIMARY KEY,
    session_id    TEXT NOT NULL REFERENCES sessions(session_id),
    membership_id TEXT NOT NULL,
    message_type  TEXT NOT NULL,    -- 'user' | 'assistant' | 'system'
    content       TEXT NOT NULL,
    sent_at       TEXT NOT NULL,
    edited_at     TEXT,
    reply_to      TEXT
);

CREATE TABLE IF NOT EXISTS papers (
    paper_id   TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    authors    TEXT NOT NULL DEFAULT '[]',  -- JSON array
    doi        TEXT,
    tags       TEXT NOT NULL DEFAULT '[]',  -- JSON array
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS session_papers (
    session_id TEXT NOT NULL REFERENCES sessions(session_id),
    paper_id   TEXT NOT NULL REFERENCES papers(paper_id),
    added_by   TEXT NOT NULL REFERENCES users(user_id),
    added_at   TEXT NOT NULL,
    PRIMARY KEY (session_id, paper_id)
);

-- One document per paper; re-submission resets the row in place.
CREATE TABLE IF NOT EXISTS rag_documents (
    paper_id     TEXT PRIMARY KEY REFERENCES papers(paper_id),
    status       TEXT NOT NULL,     -- 'pending'|'processing'|'completed'|'failed'
    chunk_count  INTEGER,
    vector_ids   TEXT NOT NULL DEFAULT '[]',  -- JSON array
    last_error   TEXT,
    submitted_at TEXT NOT NULL,
    processed_at TEXT
);

-- Cached rollup; counts are recomputed inside every write transaction
-- that can change them (attach/detach, status update, enable).
CREATE TABLE IF NOT EXISTS session_rag_status (
    session_id       TEXT PRIMARY KEY REFERENCES sessions(session_id),
    is_enabled       INTEGER NOT NULL DEFAULT 0,
    enabled_by       TEXT REFERENCES users(user_id),
    enabled_at       TEXT,
    disabled_at      TEXT,
    total_papers     INTEGER NOT NULL DEFAULT 0,
    processed_papers INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS memberships_group_idx   ON memberships(group_id);
CREATE INDEX IF NOT EXISTS memberships_user_idx    ON memberships(user_id);
CREATE INDEX IF NOT EXISTS sessions_group_idx      ON sessions(group_id);
CREATE INDEX IF NOT EXISTS messages_session_idx    ON messages(session_id);
CREATE INDEX IF NOT EXISTS session_papers_paper_idx ON session_papers(paper_id);

PRAGMA user_version = 1;
";
