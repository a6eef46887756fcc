//! # Database
//!
//! SQLite wrapper implementing the persistence contract the core requires:
//! record-level reads and writes for users, friend requests, friendships,
//! messages, and read markers.
//!
//! Two invariants are enforced here rather than in the services, because
//! they need a transaction boundary:
//!
//! - Duplicate-pending prevention: the pending-pair check and the request
//!   insert happen in one transaction.
//! - Atomic accept: the status flip and the friendship-edge insert happen in
//!   one transaction; no observable state has one without the other.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use super::schema;
use crate::error::{Error, Result};

/// Normalize an unordered user pair so `(a, b)` and `(b, a)` address the
/// same friendship row.
pub(crate) fn normalize_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The main database handle
///
/// Wraps a SQLite connection and provides high-level methods for the five
/// entity types. Cheap to clone via `Arc` in the services.
pub struct Database {
    /// The underlying SQLite connection
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| Error::Database(format!("Failed to open database: {}", e)))?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::Database(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        // Check current schema version
        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .ok();

        match version {
            None => {
                // Fresh database, create all tables
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::Database(format!("Failed to create tables: {}", e)))?;

                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| Error::Database(format!("Failed to set schema version: {}", e)))?;

                tracing::info!("Database schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v < schema::SCHEMA_VERSION => {
                tracing::info!(
                    "Database schema version {} is older than current {}, running migrations",
                    v,
                    schema::SCHEMA_VERSION
                );

                if v < 2 {
                    tracing::info!("Running migration v1 → v2 (explicit read markers)");
                    conn.execute_batch(schema::MIGRATE_V1_TO_V2)
                        .map_err(|e| Error::Database(format!("Migration v1→v2 failed: {}", e)))?;
                }

                tracing::info!(
                    "All migrations complete (now at version {})",
                    schema::SCHEMA_VERSION
                );
            }
            Some(v) => {
                tracing::debug!("Database schema version: {}", v);
            }
        }

        Ok(())
    }

    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    /// Insert a user into the directory
    pub fn insert_user(&self, user: &UserRecord) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO users (id, display_name, email, created_at) VALUES (?, ?, ?, ?)",
            params![user.id, user.display_name, user.email, user.created_at],
        )
        .map_err(|e| Error::Database(format!("Failed to insert user: {}", e)))?;

        Ok(())
    }

    /// Get a user by id
    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT id, display_name, email, created_at FROM users WHERE id = ?",
            params![id],
            |row| {
                Ok(UserRecord {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    email: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get user: {}", e)))
    }

    /// Case-insensitive substring search over display name and email
    pub fn search_users(&self, query: &str) -> Result<Vec<UserRecord>> {
        let conn = self.conn.lock();
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));

        let mut stmt = conn
            .prepare(
                "SELECT id, display_name, email, created_at FROM users
                 WHERE display_name LIKE ?1 ESCAPE '\\' COLLATE NOCASE
                    OR email LIKE ?1 ESCAPE '\\' COLLATE NOCASE
                 ORDER BY display_name COLLATE NOCASE",
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![pattern], |row| {
                Ok(UserRecord {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    email: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(|e| Error::Database(format!("Failed to search users: {}", e)))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row.map_err(|e| Error::Database(format!("Failed to read user: {}", e)))?);
        }

        Ok(users)
    }

    /// Get all users, ordered by display name
    pub fn all_users(&self) -> Result<Vec<UserRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, display_name, email, created_at FROM users
                 ORDER BY display_name COLLATE NOCASE",
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(UserRecord {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    email: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(|e| Error::Database(format!("Failed to query users: {}", e)))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row.map_err(|e| Error::Database(format!("Failed to read user: {}", e)))?);
        }

        Ok(users)
    }

    // ========================================================================
    // FRIEND REQUEST OPERATIONS
    // ========================================================================

    /// Insert a friend request, enforcing the pair invariants
    ///
    /// The duplicate-pending check (either direction) and the already-friends
    /// check run in the same transaction as the insert, so a request can
    /// never slip in next to an existing pending one.
    pub fn insert_friend_request(&self, request: &FriendRequestRecord) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let pending: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM friend_requests
                 WHERE status = 'pending'
                   AND ((sender_id = ?1 AND receiver_id = ?2)
                     OR (sender_id = ?2 AND receiver_id = ?1))",
                params![request.sender_id, request.receiver_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("Failed to check pending requests: {}", e)))?;

        if pending > 0 {
            return Err(Error::DuplicateRequest);
        }

        let (lo, hi) = normalize_pair(&request.sender_id, &request.receiver_id);
        let friends: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM friendships WHERE user_lo = ? AND user_hi = ?",
                params![lo, hi],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("Failed to check friendship: {}", e)))?;

        if friends > 0 {
            return Err(Error::AlreadyFriends);
        }

        tx.execute(
            "INSERT INTO friend_requests (id, sender_id, receiver_id, message, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                request.id,
                request.sender_id,
                request.receiver_id,
                request.message,
                request.status,
                request.created_at,
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to insert friend request: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("Failed to commit friend request: {}", e)))?;

        Ok(())
    }

    /// Get a friend request by id
    pub fn get_friend_request(&self, id: &str) -> Result<Option<FriendRequestRecord>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT id, sender_id, receiver_id, message, status, created_at
             FROM friend_requests WHERE id = ?",
            params![id],
            |row| {
                Ok(FriendRequestRecord {
                    id: row.get(0)?,
                    sender_id: row.get(1)?,
                    receiver_id: row.get(2)?,
                    message: row.get(3)?,
                    status: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get friend request: {}", e)))
    }

    /// List friend requests by role, newest first
    ///
    /// `received` selects requests addressed to the user; otherwise requests
    /// the user sent. Optionally restricted to a single status.
    pub fn list_friend_requests(
        &self,
        user_id: &str,
        received: bool,
        status: Option<&str>,
    ) -> Result<Vec<FriendRequestRecord>> {
        let conn = self.conn.lock();
        let column = if received { "receiver_id" } else { "sender_id" };
        let sql = match status {
            Some(_) => format!(
                "SELECT id, sender_id, receiver_id, message, status, created_at
                 FROM friend_requests WHERE {} = ?1 AND status = ?2
                 ORDER BY created_at DESC, id",
                column
            ),
            None => format!(
                "SELECT id, sender_id, receiver_id, message, status, created_at
                 FROM friend_requests WHERE {} = ?1
                 ORDER BY created_at DESC, id",
                column
            ),
        };

        let mut stmt = stmt_prepare(&conn, &sql)?;

        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(FriendRequestRecord {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                message: row.get(3)?,
                status: row.get(4)?,
                created_at: row.get(5)?,
            })
        };

        let rows = match status {
            Some(s) => stmt
                .query_map(params![user_id, s], map_row)
                .map_err(|e| Error::Database(format!("Failed to query requests: {}", e)))?,
            None => stmt
                .query_map(params![user_id], map_row)
                .map_err(|e| Error::Database(format!("Failed to query requests: {}", e)))?,
        };

        let mut requests = Vec::new();
        for row in rows {
            requests
                .push(row.map_err(|e| Error::Database(format!("Failed to read request: {}", e)))?);
        }

        Ok(requests)
    }

    /// Atomically accept a pending request and create the friendship edge
    ///
    /// The status flip guards on `status = 'pending'`, so a request resolved
    /// by a concurrent caller surfaces as `AlreadyResolved` instead of a
    /// double accept. Both writes commit together or not at all.
    pub fn accept_friend_request(&self, request_id: &str) -> Result<FriendshipRecord> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let request = tx
            .query_row(
                "SELECT sender_id, receiver_id FROM friend_requests WHERE id = ?",
                params![request_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(|e| Error::Database(format!("Failed to load request: {}", e)))?;

        let (sender_id, receiver_id) = request.ok_or(Error::RequestNotFound)?;

        let updated = tx
            .execute(
                "UPDATE friend_requests SET status = 'accepted' WHERE id = ? AND status = 'pending'",
                params![request_id],
            )
            .map_err(|e| Error::Database(format!("Failed to update request: {}", e)))?;

        if updated == 0 {
            return Err(Error::AlreadyResolved);
        }

        let (lo, hi) = normalize_pair(&sender_id, &receiver_id);
        let now = crate::time::now_timestamp_millis();

        tx.execute(
            "INSERT INTO friendships (user_lo, user_hi, created_at) VALUES (?, ?, ?)",
            params![lo, hi, now],
        )
        .map_err(|e| Error::Database(format!("Failed to create friendship: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("Failed to commit accept: {}", e)))?;

        Ok(FriendshipRecord {
            user_lo: lo.to_string(),
            user_hi: hi.to_string(),
            created_at: now,
        })
    }

    /// Reject a pending request
    pub fn reject_friend_request(&self, request_id: &str) -> Result<()> {
        let conn = self.conn.lock();

        let updated = conn
            .execute(
                "UPDATE friend_requests SET status = 'rejected' WHERE id = ? AND status = 'pending'",
                params![request_id],
            )
            .map_err(|e| Error::Database(format!("Failed to update request: {}", e)))?;

        if updated == 0 {
            return Err(Error::AlreadyResolved);
        }

        Ok(())
    }

    // ========================================================================
    // FRIENDSHIP OPERATIONS
    // ========================================================================

    /// Check whether a friendship edge links the pair (symmetric)
    pub fn friendship_exists(&self, a: &str, b: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let (lo, hi) = normalize_pair(a, b);

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM friendships WHERE user_lo = ? AND user_hi = ?",
                params![lo, hi],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("Failed to check friendship: {}", e)))?;

        Ok(count > 0)
    }

    /// Get a friendship edge for the pair, if any
    pub fn get_friendship(&self, a: &str, b: &str) -> Result<Option<FriendshipRecord>> {
        let conn = self.conn.lock();
        let (lo, hi) = normalize_pair(a, b);

        conn.query_row(
            "SELECT user_lo, user_hi, created_at FROM friendships
             WHERE user_lo = ? AND user_hi = ?",
            params![lo, hi],
            |row| {
                Ok(FriendshipRecord {
                    user_lo: row.get(0)?,
                    user_hi: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get friendship: {}", e)))
    }

    /// List a user's friends as directory rows
    pub fn list_friends_of(&self, user_id: &str) -> Result<Vec<UserRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT u.id, u.display_name, u.email, u.created_at
                 FROM friendships f
                 JOIN users u ON u.id = CASE WHEN f.user_lo = ?1 THEN f.user_hi ELSE f.user_lo END
                 WHERE f.user_lo = ?1 OR f.user_hi = ?1",
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(UserRecord {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    email: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(|e| Error::Database(format!("Failed to query friends: {}", e)))?;

        let mut friends = Vec::new();
        for row in rows {
            friends
                .push(row.map_err(|e| Error::Database(format!("Failed to read friend: {}", e)))?);
        }

        Ok(friends)
    }

    // ========================================================================
    // MESSAGE OPERATIONS
    // ========================================================================

    /// Append a message, returning its assigned sequence number
    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        message_type: &str,
        created_at: i64,
    ) -> Result<i64> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO messages (id, sender_id, receiver_id, content, message_type, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![id, sender_id, receiver_id, content, message_type, created_at],
        )
        .map_err(|e| Error::Database(format!("Failed to insert message: {}", e)))?;

        Ok(conn.last_insert_rowid())
    }

    /// List all messages between a pair, ascending by (created_at, seq)
    ///
    /// The ORDER BY is the ordering contract; callers must never need to
    /// re-sort.
    pub fn list_messages_between(&self, a: &str, b: &str) -> Result<Vec<MessageRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, seq, sender_id, receiver_id, content, message_type, created_at
                 FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at ASC, seq ASC",
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![a, b], |row| {
                Ok(MessageRecord {
                    id: row.get(0)?,
                    seq: row.get(1)?,
                    sender_id: row.get(2)?,
                    receiver_id: row.get(3)?,
                    content: row.get(4)?,
                    message_type: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })
            .map_err(|e| Error::Database(format!("Failed to query messages: {}", e)))?;

        let mut messages = Vec::new();
        for row in rows {
            messages
                .push(row.map_err(|e| Error::Database(format!("Failed to read message: {}", e)))?);
        }

        Ok(messages)
    }

    /// Get the most recent message between a pair, if any
    pub fn latest_message_between(&self, a: &str, b: &str) -> Result<Option<MessageRecord>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT id, seq, sender_id, receiver_id, content, message_type, created_at
             FROM messages
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)
             ORDER BY created_at DESC, seq DESC LIMIT 1",
            params![a, b],
            |row| {
                Ok(MessageRecord {
                    id: row.get(0)?,
                    seq: row.get(1)?,
                    sender_id: row.get(2)?,
                    receiver_id: row.get(3)?,
                    content: row.get(4)?,
                    message_type: row.get(5)?,
                    created_at: row.get(6)?,
                })
            },
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get latest message: {}", e)))
    }

    // ========================================================================
    // READ MARKER OPERATIONS
    // ========================================================================

    /// Get the read marker for a (reader, other) pair
    pub fn get_read_marker(&self, reader_id: &str, other_id: &str) -> Result<Option<ReadMarkerRecord>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT reader_id, other_id, last_read_seq, updated_at
             FROM read_markers WHERE reader_id = ? AND other_id = ?",
            params![reader_id, other_id],
            |row| {
                Ok(ReadMarkerRecord {
                    reader_id: row.get(0)?,
                    other_id: row.get(1)?,
                    last_read_seq: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get read marker: {}", e)))
    }

    /// Advance the read marker to the latest message seq visible for the pair
    ///
    /// Idempotent: re-running with no new messages rewrites the same
    /// boundary. Returns the new boundary.
    pub fn mark_read(&self, reader_id: &str, other_id: &str) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let boundary: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) FROM messages
                 WHERE sender_id = ?1 AND receiver_id = ?2",
                params![other_id, reader_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("Failed to compute read boundary: {}", e)))?;

        let now = crate::time::now_timestamp_millis();

        tx.execute(
            "INSERT INTO read_markers (reader_id, other_id, last_read_seq, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (reader_id, other_id)
             DO UPDATE SET last_read_seq = MAX(last_read_seq, ?3), updated_at = ?4",
            params![reader_id, other_id, boundary, now],
        )
        .map_err(|e| Error::Database(format!("Failed to advance read marker: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("Failed to commit read marker: {}", e)))?;

        Ok(boundary)
    }

    /// Count messages from `other_id` past the reader's marker
    ///
    /// A missing marker row means nothing has been read yet: every incoming
    /// message counts.
    pub fn unread_count(&self, reader_id: &str, other_id: &str) -> Result<u32> {
        let conn = self.conn.lock();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE sender_id = ?2 AND receiver_id = ?1
                   AND seq > COALESCE(
                       (SELECT last_read_seq FROM read_markers
                        WHERE reader_id = ?1 AND other_id = ?2),
                       0)",
                params![reader_id, other_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("Failed to count unread: {}", e)))?;

        Ok(count as u32)
    }
}

fn stmt_prepare<'a>(conn: &'a Connection, sql: &str) -> Result<rusqlite::Statement<'a>> {
    conn.prepare(sql)
        .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))
}

// ============================================================================
// RECORD TYPES
// ============================================================================

/// A user directory row
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Opaque, stable user id
    pub id: String,
    /// Display name
    pub display_name: String,
    /// Email address (used by search)
    pub email: String,
    /// Registration timestamp (ms)
    pub created_at: i64,
}

/// A friend request row
#[derive(Debug, Clone)]
pub struct FriendRequestRecord {
    /// Unique request id
    pub id: String,
    /// Who sent the request
    pub sender_id: String,
    /// Who the request is for
    pub receiver_id: String,
    /// Optional message with the request
    pub message: Option<String>,
    /// 'pending', 'accepted', or 'rejected'
    pub status: String,
    /// Creation timestamp (ms)
    pub created_at: i64,
}

/// A friendship edge row (normalized: user_lo < user_hi)
#[derive(Debug, Clone)]
pub struct FriendshipRecord {
    /// Lexically smaller user id
    pub user_lo: String,
    /// Lexically larger user id
    pub user_hi: String,
    /// When the friendship was established (ms)
    pub created_at: i64,
}

/// A message row
#[derive(Debug, Clone)]
pub struct MessageRecord {
    /// Unique message id
    pub id: String,
    /// Insertion-order sequence number (ordering tiebreaker, marker boundary)
    pub seq: i64,
    /// Who sent the message
    pub sender_id: String,
    /// Who it is addressed to
    pub receiver_id: String,
    /// Message body
    pub content: String,
    /// Message type string ('text')
    pub message_type: String,
    /// Send timestamp (ms)
    pub created_at: i64,
}

/// A read marker row
#[derive(Debug, Clone)]
pub struct ReadMarkerRecord {
    /// The reader who owns this marker
    pub reader_id: String,
    /// The peer whose messages the marker covers
    pub other_id: String,
    /// Highest message seq the reader has marked read
    pub last_read_seq: i64,
    /// Last time the marker was advanced (ms)
    pub updated_at: i64,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open(None).unwrap()
    }

    fn add_user(db: &Database, id: &str, name: &str) {
        db.insert_user(&UserRecord {
            id: id.to_string(),
            display_name: name.to_string(),
            email: format!("{}@campus.edu", id),
            created_at: crate::time::now_timestamp_millis(),
        })
        .unwrap();
    }

    fn pending_request(db: &Database, id: &str, sender: &str, receiver: &str) {
        db.insert_friend_request(&FriendRequestRecord {
            id: id.to_string(),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            message: None,
            status: "pending".to_string(),
            created_at: crate::time::now_timestamp_millis(),
        })
        .unwrap();
    }

    #[test]
    fn test_open_in_memory() {
        let db = test_db();
        assert!(db.all_users().unwrap().is_empty());
    }

    #[test]
    fn test_user_roundtrip() {
        let db = test_db();
        add_user(&db, "u1", "Alice");

        let user = db.get_user("u1").unwrap().unwrap();
        assert_eq!(user.display_name, "Alice");
        assert!(db.get_user("nope").unwrap().is_none());
    }

    #[test]
    fn test_search_users_case_insensitive() {
        let db = test_db();
        add_user(&db, "u1", "Alice Anderson");
        add_user(&db, "u2", "Bob Brown");

        let hits = db.search_users("alice").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "u1");

        // Email matches too
        let hits = db.search_users("u2@campus").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "u2");
    }

    #[test]
    fn test_duplicate_pending_rejected_both_directions() {
        let db = test_db();
        add_user(&db, "a", "Alice");
        add_user(&db, "b", "Bob");
        pending_request(&db, "r1", "a", "b");

        // Same direction
        let err = db
            .insert_friend_request(&FriendRequestRecord {
                id: "r2".to_string(),
                sender_id: "a".to_string(),
                receiver_id: "b".to_string(),
                message: None,
                status: "pending".to_string(),
                created_at: 0,
            })
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRequest));

        // Reverse direction
        let err = db
            .insert_friend_request(&FriendRequestRecord {
                id: "r3".to_string(),
                sender_id: "b".to_string(),
                receiver_id: "a".to_string(),
                message: None,
                status: "pending".to_string(),
                created_at: 0,
            })
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRequest));
    }

    #[test]
    fn test_accept_is_atomic() {
        let db = test_db();
        add_user(&db, "a", "Alice");
        add_user(&db, "b", "Bob");
        pending_request(&db, "r1", "a", "b");

        let friendship = db.accept_friend_request("r1").unwrap();
        assert_eq!(friendship.user_lo, "a");
        assert_eq!(friendship.user_hi, "b");

        // Both effects are visible together
        let request = db.get_friend_request("r1").unwrap().unwrap();
        assert_eq!(request.status, "accepted");
        assert!(db.friendship_exists("a", "b").unwrap());
        assert!(db.friendship_exists("b", "a").unwrap());

        // Terminal: accepting again is AlreadyResolved
        let err = db.accept_friend_request("r1").unwrap_err();
        assert!(matches!(err, Error::AlreadyResolved));
    }

    #[test]
    fn test_reject_creates_no_edge() {
        let db = test_db();
        add_user(&db, "a", "Alice");
        add_user(&db, "b", "Bob");
        pending_request(&db, "r1", "a", "b");

        db.reject_friend_request("r1").unwrap();

        let request = db.get_friend_request("r1").unwrap().unwrap();
        assert_eq!(request.status, "rejected");
        assert!(!db.friendship_exists("a", "b").unwrap());

        let err = db.reject_friend_request("r1").unwrap_err();
        assert!(matches!(err, Error::AlreadyResolved));
    }

    #[test]
    fn test_accept_unknown_request() {
        let db = test_db();
        let err = db.accept_friend_request("missing").unwrap_err();
        assert!(matches!(err, Error::RequestNotFound));
    }

    #[test]
    fn test_list_requests_by_role() {
        let db = test_db();
        add_user(&db, "a", "Alice");
        add_user(&db, "b", "Bob");
        add_user(&db, "c", "Cara");
        pending_request(&db, "r1", "a", "b");
        pending_request(&db, "r2", "c", "b");

        let received = db.list_friend_requests("b", true, Some("pending")).unwrap();
        assert_eq!(received.len(), 2);

        let sent = db.list_friend_requests("a", false, None).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, "r1");

        assert!(db.list_friend_requests("a", true, None).unwrap().is_empty());
    }

    #[test]
    fn test_message_ordering_with_equal_timestamps() {
        let db = test_db();
        add_user(&db, "a", "Alice");
        add_user(&db, "b", "Bob");

        // Same created_at for all three; seq must break the tie
        db.insert_message("m1", "a", "b", "first", "text", 1000).unwrap();
        db.insert_message("m2", "b", "a", "second", "text", 1000).unwrap();
        db.insert_message("m3", "a", "b", "third", "text", 1000).unwrap();

        let messages = db.list_messages_between("a", "b").unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);

        // Symmetric query returns the same order
        let reversed = db.list_messages_between("b", "a").unwrap();
        assert_eq!(reversed.len(), 3);
        assert_eq!(reversed[0].content, "first");
    }

    #[test]
    fn test_latest_message() {
        let db = test_db();
        add_user(&db, "a", "Alice");
        add_user(&db, "b", "Bob");

        assert!(db.latest_message_between("a", "b").unwrap().is_none());

        db.insert_message("m1", "a", "b", "old", "text", 1000).unwrap();
        db.insert_message("m2", "b", "a", "new", "text", 2000).unwrap();

        let latest = db.latest_message_between("a", "b").unwrap().unwrap();
        assert_eq!(latest.content, "new");
    }

    #[test]
    fn test_mark_read_idempotent() {
        let db = test_db();
        add_user(&db, "a", "Alice");
        add_user(&db, "b", "Bob");

        db.insert_message("m1", "b", "a", "hi", "text", 1000).unwrap();
        db.insert_message("m2", "b", "a", "there", "text", 2000).unwrap();
        assert_eq!(db.unread_count("a", "b").unwrap(), 2);

        let boundary = db.mark_read("a", "b").unwrap();
        assert_eq!(db.unread_count("a", "b").unwrap(), 0);

        // Second call with no new messages: same boundary, still zero
        let boundary2 = db.mark_read("a", "b").unwrap();
        assert_eq!(boundary, boundary2);
        assert_eq!(db.unread_count("a", "b").unwrap(), 0);
    }

    #[test]
    fn test_unread_counts_incoming_only() {
        let db = test_db();
        add_user(&db, "a", "Alice");
        add_user(&db, "b", "Bob");

        db.insert_message("m1", "a", "b", "from alice", "text", 1000).unwrap();
        db.insert_message("m2", "b", "a", "from bob", "text", 2000).unwrap();

        // Alice's own message does not count against her
        assert_eq!(db.unread_count("a", "b").unwrap(), 1);
        assert_eq!(db.unread_count("b", "a").unwrap(), 1);
    }

    #[test]
    fn test_markers_are_per_pair_and_per_reader() {
        let db = test_db();
        add_user(&db, "a", "Alice");
        add_user(&db, "b", "Bob");
        add_user(&db, "c", "Cara");

        db.insert_message("m1", "b", "a", "hi", "text", 1000).unwrap();
        db.insert_message("m2", "c", "a", "hey", "text", 1000).unwrap();

        db.mark_read("a", "b").unwrap();

        // Marking the (a, b) pair read leaves (a, c) untouched
        assert_eq!(db.unread_count("a", "b").unwrap(), 0);
        assert_eq!(db.unread_count("a", "c").unwrap(), 1);

        // Bob's marker towards Alice is independent of Alice's
        assert_eq!(db.unread_count("b", "a").unwrap(), 0);
    }

    #[test]
    fn test_list_friends_of() {
        let db = test_db();
        add_user(&db, "a", "Alice");
        add_user(&db, "b", "Bob");
        add_user(&db, "c", "Cara");
        pending_request(&db, "r1", "a", "b");
        pending_request(&db, "r2", "c", "a");
        db.accept_friend_request("r1").unwrap();
        db.accept_friend_request("r2").unwrap();

        let mut names: Vec<String> = db
            .list_friends_of("a")
            .unwrap()
            .into_iter()
            .map(|u| u.display_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Bob", "Cara"]);

        assert_eq!(db.list_friends_of("b").unwrap().len(), 1);
    }

    #[test]
    fn test_migration_v1_to_v2() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        let path_str = path.to_str().unwrap();

        // Build a version-1 database by hand: per-message is_read flag, no
        // read_markers table.
        {
            let conn = Connection::open(path_str).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE schema_version (version INTEGER PRIMARY KEY);
                INSERT INTO schema_version (version) VALUES (1);
                CREATE TABLE users (
                    id TEXT PRIMARY KEY,
                    display_name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE friend_requests (
                    id TEXT PRIMARY KEY,
                    sender_id TEXT NOT NULL,
                    receiver_id TEXT NOT NULL,
                    message TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE friendships (
                    user_lo TEXT NOT NULL,
                    user_hi TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    PRIMARY KEY (user_lo, user_hi)
                );
                CREATE TABLE messages (
                    id TEXT NOT NULL UNIQUE,
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    sender_id TEXT NOT NULL,
                    receiver_id TEXT NOT NULL,
                    content TEXT NOT NULL,
                    message_type TEXT NOT NULL DEFAULT 'text',
                    created_at INTEGER NOT NULL,
                    is_read INTEGER NOT NULL DEFAULT 0
                );
                INSERT INTO users VALUES ('a', 'Alice', 'a@campus.edu', 0);
                INSERT INTO users VALUES ('b', 'Bob', 'b@campus.edu', 0);
                INSERT INTO messages (id, sender_id, receiver_id, content, message_type, created_at, is_read)
                VALUES ('m1', 'b', 'a', 'read one', 'text', 1000, 1);
                INSERT INTO messages (id, sender_id, receiver_id, content, message_type, created_at, is_read)
                VALUES ('m2', 'b', 'a', 'unread one', 'text', 2000, 0);
                "#,
            )
            .unwrap();
        }

        let db = Database::open(Some(path_str)).unwrap();

        // The migration seeds the marker at the highest read seq
        let marker = db.get_read_marker("a", "b").unwrap().unwrap();
        assert_eq!(marker.last_read_seq, 1);
        assert_eq!(db.unread_count("a", "b").unwrap(), 1);
    }
}
