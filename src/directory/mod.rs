//! # User Directory
//!
//! Registry of known users. Everything else in the crate resolves user ids
//! through this module: requests validate both endpoints against it, and the
//! friends list and conversation list hydrate their entries from it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::{Database, UserRecord};

/// A user known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque, stable identifier
    pub id: String,
    /// Name shown in rosters and conversation lists
    pub display_name: String,
    /// Email address (searchable)
    pub email: String,
    /// When the user registered (Unix ms)
    pub created_at: i64,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            display_name: record.display_name,
            email: record.email,
            created_at: record.created_at,
        }
    }
}

/// Service for registering and looking up users
pub struct DirectoryService {
    db: Arc<Database>,
}

impl DirectoryService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a user with a generated id
    pub fn register(&self, display_name: &str, email: &str) -> Result<User> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
            created_at: crate::time::now_timestamp_millis(),
        };

        self.db.insert_user(&UserRecord {
            id: user.id.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        })?;

        tracing::info!("Registered user {} ({})", user.display_name, user.id);

        Ok(user)
    }

    /// Look up a user by id
    pub fn get(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.db.get_user(user_id)?.map(User::from))
    }

    /// Look up a user, failing if unknown
    ///
    /// Used by other services to validate endpoints before writing.
    pub fn require(&self, user_id: &str) -> Result<User> {
        self.get(user_id)?
            .ok_or_else(|| Error::UnknownUser(user_id.to_string()))
    }

    /// Case-insensitive substring search over display name and email
    ///
    /// A blank query matches nothing rather than everything.
    pub fn search(&self, query: &str) -> Result<Vec<User>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let users = self.db.search_users(query)?;
        tracing::debug!("Search '{}' matched {} users", query, users.len());
        Ok(users.into_iter().map(User::from).collect())
    }

    /// All registered users, ordered by display name
    pub fn all(&self) -> Result<Vec<User>> {
        Ok(self.db.all_users()?.into_iter().map(User::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> DirectoryService {
        DirectoryService::new(Arc::new(Database::open(None).unwrap()))
    }

    #[test]
    fn test_register_and_get() {
        let directory = service();
        let alice = directory.register("Alice", "alice@campus.edu").unwrap();

        let found = directory.get(&alice.id).unwrap().unwrap();
        assert_eq!(found, alice);
        assert!(directory.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_require_unknown_user() {
        let directory = service();
        let err = directory.require("ghost").unwrap_err();
        assert!(matches!(err, Error::UnknownUser(id) if id == "ghost"));
    }

    #[test]
    fn test_search_matches_name_and_email() {
        let directory = service();
        directory.register("Alice Anderson", "aa@campus.edu").unwrap();
        directory.register("Bob Brown", "bob@campus.edu").unwrap();

        assert_eq!(directory.search("ALICE").unwrap().len(), 1);
        assert_eq!(directory.search("bob@").unwrap().len(), 1);
        assert!(directory.search("zelda").unwrap().is_empty());
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        let directory = service();
        directory.register("Alice", "alice@campus.edu").unwrap();
        directory.register("Bob", "bob@campus.edu").unwrap();

        // A blank query must not fall through to the LIKE '%%' pattern and
        // dump the whole directory
        for query in ["", "   ", "\t\n"] {
            assert!(directory.search(query).unwrap().is_empty());
        }
    }

    #[test]
    fn test_all_ordered_by_name() {
        let directory = service();
        directory.register("carol", "c@campus.edu").unwrap();
        directory.register("Alice", "a@campus.edu").unwrap();
        directory.register("bob", "b@campus.edu").unwrap();

        let names: Vec<String> = directory
            .all()
            .unwrap()
            .into_iter()
            .map(|u| u.display_name)
            .collect();
        assert_eq!(names, vec!["Alice", "bob", "carol"]);
    }
}
