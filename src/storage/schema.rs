//! # Database Schema
//!
//! SQL schema definitions for the quadchat database.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐    ┌─────────────────┐      ┌─────────────────┐    │
//! │  │     users       │    │ friend_requests │      │   friendships   │    │
//! │  ├─────────────────┤    ├─────────────────┤      ├─────────────────┤    │
//! │  │ id              │◄───│ sender_id       │      │ user_lo         │    │
//! │  │ display_name    │    │ receiver_id     │─────►│ user_hi         │    │
//! │  │ email           │    │ message         │      │ created_at      │    │
//! │  │ created_at      │    │ status          │      └─────────────────┘    │
//! │  └─────────────────┘    │ created_at      │                             │
//! │                         └─────────────────┘                             │
//! │                                                                         │
//! │  ┌─────────────────┐    ┌─────────────────┐                             │
//! │  │    messages     │    │  read_markers   │                             │
//! │  ├─────────────────┤    ├─────────────────┤                             │
//! │  │ id              │    │ reader_id       │                             │
//! │  │ seq             │    │ other_id        │                             │
//! │  │ sender_id       │    │ last_read_seq   │                             │
//! │  │ receiver_id     │    │ updated_at      │                             │
//! │  │ content         │    └─────────────────┘                             │
//! │  │ message_type    │                                                    │
//! │  │ created_at      │                                                    │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Friendships are stored as a normalized unordered pair (`user_lo <
//! user_hi`), so `(a, b)` and `(b, a)` hit the same row. The message `seq`
//! column is the insertion-order tiebreaker that backs the ascending
//! chronological ordering contract, and the boundary that read markers
//! point at.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- User directory
-- The identity provider is external; these rows are the reference data the
-- core needs for hydrating requests/conversations and for search.
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    email TEXT NOT NULL,
    -- When this user was registered
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_display_name ON users(display_name COLLATE NOCASE);

-- Friend requests table
-- Requests are never deleted; accepted/rejected rows are retained as history.
CREATE TABLE IF NOT EXISTS friend_requests (
    id TEXT PRIMARY KEY,
    -- Who sent the request
    sender_id TEXT NOT NULL,
    -- Who the request is for
    receiver_id TEXT NOT NULL,
    -- Optional message with the request
    message TEXT,
    -- Status: terminal once accepted or rejected
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'accepted', 'rejected')),
    -- When the request was created
    created_at INTEGER NOT NULL,
    FOREIGN KEY (sender_id) REFERENCES users(id),
    FOREIGN KEY (receiver_id) REFERENCES users(id)
);
CREATE INDEX IF NOT EXISTS idx_friend_requests_receiver ON friend_requests(receiver_id, status);
CREATE INDEX IF NOT EXISTS idx_friend_requests_sender ON friend_requests(sender_id, status);

-- Friendships table
-- A symmetric, unordered edge: rows are normalized so user_lo < user_hi.
-- Written only by the friend-request accept transition.
CREATE TABLE IF NOT EXISTS friendships (
    user_lo TEXT NOT NULL,
    user_hi TEXT NOT NULL,
    -- When the friendship was established (accept time)
    created_at INTEGER NOT NULL,
    PRIMARY KEY (user_lo, user_hi),
    CHECK (user_lo < user_hi),
    FOREIGN KEY (user_lo) REFERENCES users(id),
    FOREIGN KEY (user_hi) REFERENCES users(id)
);
CREATE INDEX IF NOT EXISTS idx_friendships_hi ON friendships(user_hi);

-- Messages table
-- Append-only: no edit, no delete. seq is the insertion-order tiebreaker
-- for the ascending (created_at, seq) ordering contract.
CREATE TABLE IF NOT EXISTS messages (
    id TEXT NOT NULL UNIQUE,
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    content TEXT NOT NULL,
    -- Message type: 'text' in the current scope
    message_type TEXT NOT NULL DEFAULT 'text',
    -- When the message was sent (Unix timestamp ms)
    created_at INTEGER NOT NULL,
    FOREIGN KEY (sender_id) REFERENCES users(id),
    FOREIGN KEY (receiver_id) REFERENCES users(id)
);
CREATE INDEX IF NOT EXISTS idx_messages_pair ON messages(sender_id, receiver_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver_id, sender_id, seq);

-- Read markers table
-- Explicit keyed boundary per (reader, other) pair, below which incoming
-- messages from `other` count as read. Advanced only by an explicit
-- mark-read action, never by a background refresh.
CREATE TABLE IF NOT EXISTS read_markers (
    reader_id TEXT NOT NULL,
    other_id TEXT NOT NULL,
    -- Highest message seq the reader has seen from other_id
    last_read_seq INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (reader_id, other_id),
    FOREIGN KEY (reader_id) REFERENCES users(id),
    FOREIGN KEY (other_id) REFERENCES users(id)
);
"#;

/// Migration SQL from schema version 1 → 2
///
/// Version 1 derived read-state from a per-message flag. Version 2 replaces
/// it with the explicit read_markers table keyed by (reader, other), which
/// makes unread counting an index lookup instead of a history scan.
pub const MIGRATE_V1_TO_V2: &str = r#"
CREATE TABLE IF NOT EXISTS read_markers (
    reader_id TEXT NOT NULL,
    other_id TEXT NOT NULL,
    last_read_seq INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (reader_id, other_id),
    FOREIGN KEY (reader_id) REFERENCES users(id),
    FOREIGN KEY (other_id) REFERENCES users(id)
);

-- Seed markers from the legacy per-message is_read flag: the boundary for
-- each pair is the highest seq the reader had already marked read.
INSERT OR IGNORE INTO read_markers (reader_id, other_id, last_read_seq, updated_at)
SELECT receiver_id, sender_id, MAX(seq), CAST(strftime('%s', 'now') AS INTEGER) * 1000
FROM messages WHERE is_read = 1
GROUP BY receiver_id, sender_id;

-- Update schema version
UPDATE schema_version SET version = 2;
"#;

/// SQL to drop all tables (for testing/reset)
pub const DROP_TABLES: &str = r#"
DROP TABLE IF EXISTS read_markers;
DROP TABLE IF EXISTS messages;
DROP TABLE IF EXISTS friendships;
DROP TABLE IF EXISTS friend_requests;
DROP TABLE IF EXISTS users;
DROP TABLE IF EXISTS schema_version;
"#;
