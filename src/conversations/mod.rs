//! # Conversations
//!
//! Derived inbox view: one entry per friend, carrying the latest message and
//! the unread count. Nothing here is stored; it is assembled on demand from
//! the friendship graph and the message store, so it can never drift out of
//! sync with them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::directory::User;
use crate::error::Result;
use crate::messages::Message;
use crate::storage::Database;

/// One inbox entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// The friend on the other side
    pub friend: User,
    /// Most recent message either way, if any traffic exists
    pub last_message: Option<Message>,
    /// Messages from the friend past the viewer's read marker
    pub unread_count: u32,
}

/// Service assembling the conversation list
pub struct ConversationService {
    graph: crate::graph::FriendshipGraph,
    store: crate::messages::MessageStore,
}

impl ConversationService {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            graph: crate::graph::FriendshipGraph::new(db.clone()),
            store: crate::messages::MessageStore::new(db),
        }
    }

    /// The viewer's conversation list, one entry per friend
    ///
    /// Deterministic order: entries with traffic first, most recent last
    /// message on top (seq breaks timestamp ties), then message-less friends
    /// alphabetically by display name. Assembling the list reads markers but
    /// never moves them.
    pub fn list_conversations(&self, viewer_id: &str) -> Result<Vec<Conversation>> {
        let friends = self.graph.list_friends(viewer_id)?;

        let mut conversations = Vec::with_capacity(friends.len());
        for friend in friends {
            let last_message = self.store.latest_between(viewer_id, &friend.id)?;
            let unread_count = self.store.unread_count(viewer_id, &friend.id)?;
            conversations.push(Conversation {
                friend,
                last_message,
                unread_count,
            });
        }

        conversations.sort_by(|a, b| match (&a.last_message, &b.last_message) {
            (Some(ma), Some(mb)) => (mb.created_at, mb.seq).cmp(&(ma.created_at, ma.seq)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a
                .friend
                .display_name
                .to_lowercase()
                .cmp(&b.friend.display_name.to_lowercase()),
        });

        tracing::debug!(
            "Assembled {} conversations for {}",
            conversations.len(),
            viewer_id
        );

        Ok(conversations)
    }
}
