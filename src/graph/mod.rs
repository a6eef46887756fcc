//! # Friendship Graph
//!
//! The symmetric friendship relation. Edges are created only by accepting a
//! friend request; this module is read-only over them. Each edge is stored
//! once with its endpoints in lexical order, so symmetry holds by
//! construction rather than by keeping two rows in sync.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::directory::User;
use crate::error::Result;
use crate::storage::{Database, FriendshipRecord};

/// An undirected friendship edge
///
/// Endpoints are normalized (`user_lo < user_hi`), so the same pair always
/// produces the same edge regardless of who initiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub user_lo: String,
    pub user_hi: String,
    /// When the request was accepted (Unix ms)
    pub created_at: i64,
}

impl Friendship {
    pub(crate) fn from_record(record: FriendshipRecord) -> Self {
        Self {
            user_lo: record.user_lo,
            user_hi: record.user_hi,
            created_at: record.created_at,
        }
    }

    /// Whether the edge touches the given user
    pub fn involves(&self, user_id: &str) -> bool {
        self.user_lo == user_id || self.user_hi == user_id
    }

    /// The endpoint that is not `user_id`, if the edge touches them
    pub fn other(&self, user_id: &str) -> Option<&str> {
        if self.user_lo == user_id {
            Some(&self.user_hi)
        } else if self.user_hi == user_id {
            Some(&self.user_lo)
        } else {
            None
        }
    }
}

/// Read-only view over the friendship relation
pub struct FriendshipGraph {
    db: Arc<Database>,
}

impl FriendshipGraph {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Whether the two users are friends. Symmetric in its arguments.
    pub fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        self.db.friendship_exists(a, b)
    }

    /// The edge between the pair, if any
    pub fn get(&self, a: &str, b: &str) -> Result<Option<Friendship>> {
        Ok(self.db.get_friendship(a, b)?.map(Friendship::from_record))
    }

    /// All of a user's friends, hydrated as directory users
    pub fn list_friends(&self, user_id: &str) -> Result<Vec<User>> {
        Ok(self
            .db
            .list_friends_of(user_id)?
            .into_iter()
            .map(User::from)
            .collect())
    }
}
