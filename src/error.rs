//! # Error Handling
//!
//! All fallible operations in this crate return [`Result`], whose error arm
//! is the single [`Error`] enum below.
//!
//! ## Error Taxonomy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR TAXONOMY                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Validation (100-199)     - Rejected before any write                   │
//! │  ├── SelfRequest          - Friend request addressed to yourself        │
//! │  ├── UnknownUser          - Participant missing from the directory      │
//! │  └── EmptyMessage         - Whitespace-only message content             │
//! │                                                                         │
//! │  Conflict (200-299)       - Stale client view; refresh, don't retry     │
//! │  ├── DuplicateRequest     - A pending request already links the pair    │
//! │  ├── AlreadyFriends       - Friendship edge already exists              │
//! │  └── AlreadyResolved      - Request left the pending state earlier      │
//! │                                                                         │
//! │  Authorization (300-399)  - Fatal to the attempted action               │
//! │  └── Forbidden            - Responder is not the request's receiver     │
//! │                                                                         │
//! │  Precondition (400-499)   - Surfaced as a hard failure                  │
//! │  └── NotFriends           - Messaging requires a friendship edge        │
//! │                                                                         │
//! │  Lookup (500-599)                                                       │
//! │  └── RequestNotFound      - No friend request with that id              │
//! │                                                                         │
//! │  Storage (600-699)        - The only recoverable class: the sync loop   │
//! │  └── Database             - retries on the next timer tick              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for quadchat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the messaging and social-graph core
///
/// Variants are grouped by how a client should react: validation and
/// authorization failures are final, conflicts mean the client's view is
/// stale and should be refreshed, and storage errors are transient from the
/// sync loop's perspective.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors (100-199)
    // ========================================================================

    /// Friend request addressed to the sender themselves
    #[error("Cannot send a friend request to yourself.")]
    SelfRequest,

    /// A referenced user does not exist in the directory
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// Message content is empty after trimming
    #[error("Message content must not be empty.")]
    EmptyMessage,

    // ========================================================================
    // Conflict Errors (200-299)
    // ========================================================================

    /// A pending friend request already links the pair (in either direction)
    #[error("A friend request is already pending between these users.")]
    DuplicateRequest,

    /// A friendship edge already exists between the pair
    #[error("Already friends with this user.")]
    AlreadyFriends,

    /// The friend request has already been accepted or rejected
    #[error("This friend request has already been resolved.")]
    AlreadyResolved,

    // ========================================================================
    // Authorization Errors (300-399)
    // ========================================================================

    /// Someone other than the receiver tried to respond to a request
    #[error("Only the receiver of a friend request may respond to it.")]
    Forbidden,

    // ========================================================================
    // Precondition Errors (400-499)
    // ========================================================================

    /// Attempted to message a user without a friendship edge
    #[error("Not friends with this user.")]
    NotFriends,

    // ========================================================================
    // Lookup Errors (500-599)
    // ========================================================================

    /// Friend request not found
    #[error("Friend request not found.")]
    RequestNotFound,

    // ========================================================================
    // Storage Errors (600-699)
    // ========================================================================

    /// Database error
    #[error("Database error: {0}")]
    Database(String),
}

impl Error {
    /// Get the stable numeric code for this error
    ///
    /// Codes are organized by category:
    /// - 100-199: Validation
    /// - 200-299: Conflict
    /// - 300-399: Authorization
    /// - 400-499: Precondition
    /// - 500-599: Lookup
    /// - 600-699: Storage
    pub fn code(&self) -> i32 {
        match self {
            // Validation (100-199)
            Error::SelfRequest => 100,
            Error::UnknownUser(_) => 101,
            Error::EmptyMessage => 102,

            // Conflict (200-299)
            Error::DuplicateRequest => 200,
            Error::AlreadyFriends => 201,
            Error::AlreadyResolved => 202,

            // Authorization (300-399)
            Error::Forbidden => 300,

            // Precondition (400-499)
            Error::NotFriends => 400,

            // Lookup (500-599)
            Error::RequestNotFound => 500,

            // Storage (600-699)
            Error::Database(_) => 600,
        }
    }

    /// Check if this error is recoverable by retrying later
    ///
    /// The sync loop keys its fail-soft policy off this: a recoverable
    /// failure during a background poll is logged and retried on the next
    /// tick without clearing already-displayed data.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Database(_))
    }

    /// Check if this error indicates a stale client view
    ///
    /// Conflicts are not retried blindly; the correct client response is to
    /// refresh the affected list.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::DuplicateRequest | Error::AlreadyFriends | Error::AlreadyResolved
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Database(format!("Serialization error: {}", err))
    }
}

// ============================================================================
// TESTS
// ============================================================================
