//! # quadchat
//!
//! Messaging and social-graph core: friend requests, a symmetric friendship
//! graph, an append-only direct-message store with explicit read markers,
//! a derived conversation view, and a client-side polling sync loop.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        ChatCore                         │
//! ├─────────────────────────────────────────────────────────┤
//! │  directory   │ user registry and search                 │
//! │  requests    │ friend-request lifecycle                 │
//! │  graph       │ symmetric friendship edges               │
//! │  messages    │ append-only messages + read markers      │
//! │  conversations │ derived inbox view                     │
//! ├─────────────────────────────────────────────────────────┤
//! │  storage     │ SQLite persistence                       │
//! ├─────────────────────────────────────────────────────────┤
//! │  sync        │ polling loop over any ChatBackend        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use quadchat::{ChatCore, MessageType, RequestAction};
//!
//! # fn main() -> quadchat::Result<()> {
//! let core = ChatCore::open(None)?; // in-memory
//!
//! let alice = core.directory.register("Alice", "alice@campus.edu")?;
//! let bob = core.directory.register("Bob", "bob@campus.edu")?;
//!
//! let request = core.requests.send_request(&alice.id, &bob.id, None)?;
//! core.requests.respond(&request.id, &bob.id, RequestAction::Accept)?;
//!
//! core.messages.send(&alice.id, &bob.id, "hey!", MessageType::Text)?;
//! let inbox = core.conversations.list_conversations(&bob.id)?;
//! assert_eq!(inbox[0].unread_count, 1);
//! # Ok(())
//! # }
//! ```

pub mod conversations;
pub mod directory;
pub mod error;
pub mod graph;
pub mod messages;
pub mod requests;
pub mod storage;
pub mod sync;
pub mod time;

pub use conversations::{Conversation, ConversationService};
pub use directory::{DirectoryService, User};
pub use error::{Error, Result};
pub use graph::{Friendship, FriendshipGraph};
pub use messages::{Message, MessageStore, MessageType};
pub use requests::{
    FriendRequest, FriendRequestService, RequestAction, RequestOutcome, RequestStatus,
    DEFAULT_REQUEST_MESSAGE,
};
pub use storage::Database;
pub use sync::{
    search_with_fallback, ChatBackend, Debouncer, SyncConfig, SyncEvent, SyncHandle, SyncLoop,
};

use async_trait::async_trait;
use std::sync::Arc;

/// All services wired over one database
///
/// The services share the underlying connection; constructing the core is
/// the only wiring an embedder needs.
pub struct ChatCore {
    db: Arc<Database>,
    pub directory: DirectoryService,
    pub requests: FriendRequestService,
    pub graph: FriendshipGraph,
    pub messages: MessageStore,
    pub conversations: ConversationService,
}

impl ChatCore {
    /// Open a core over a database file, or in memory when `path` is `None`
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db = Arc::new(Database::open(path)?);

        Ok(Self {
            directory: DirectoryService::new(db.clone()),
            requests: FriendRequestService::new(db.clone()),
            graph: FriendshipGraph::new(db.clone()),
            messages: MessageStore::new(db.clone()),
            conversations: ConversationService::new(db.clone()),
            db,
        })
    }

    /// The shared database handle
    pub fn database(&self) -> Arc<Database> {
        self.db.clone()
    }
}

/// In-process backend: the sync loop polls the local services directly
#[async_trait]
impl ChatBackend for ChatCore {
    async fn conversations(&self, viewer_id: &str) -> Result<Vec<Conversation>> {
        self.conversations.list_conversations(viewer_id)
    }

    async fn pending_requests(&self, viewer_id: &str) -> Result<Vec<FriendRequest>> {
        self.requests.pending_received(viewer_id)
    }

    async fn messages_with(&self, viewer_id: &str, friend_id: &str) -> Result<Vec<Message>> {
        self.messages.list_between(viewer_id, friend_id)
    }

    async fn mark_read(&self, viewer_id: &str, friend_id: &str) -> Result<i64> {
        self.messages.mark_read(viewer_id, friend_id)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        self.directory.search(query)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        self.directory.all()
    }
}
