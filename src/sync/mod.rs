//! # Sync Loop
//!
//! Client-side polling that keeps a chat view current without a push
//! channel.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SyncLoop                            │
//! │                                                             │
//! │  roster task (every 30s)       focus task (every 10s)       │
//! │  ├─ conversations              └─ messages for the one      │
//! │  └─ pending requests              open conversation         │
//! │                                                             │
//! └────────────┬────────────────────────────────────────────────┘
//!              │ SyncEvent (mpsc)
//!              ▼
//!        consumer (UI, bot, test harness)
//! ```
//!
//! Ground rules:
//!
//! - Background polls never touch read markers. The only mark-read in the
//!   whole loop is the explicit one in [`SyncHandle::open_conversation`],
//!   which runs exactly once per open.
//! - Fail-soft: a failed poll logs a warning and emits nothing, leaving the
//!   consumer on its last known good state. The loop keeps running.
//! - Opening a conversation retargets the focus task immediately; closing it
//!   stops message polling until the next open. Timer cancellation is
//!   deterministic (the pending sleep is dropped, not raced).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::conversations::Conversation;
use crate::directory::User;
use crate::error::Result;
use crate::messages::Message;
use crate::requests::FriendRequest;

/// The data surface the sync loop polls
///
/// Implemented by [`ChatCore`](crate::ChatCore) for in-process use; tests
/// substitute mocks, and a remote client can put a transport behind it.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// The viewer's conversation list
    async fn conversations(&self, viewer_id: &str) -> Result<Vec<Conversation>>;
    /// Pending friend requests awaiting the viewer
    async fn pending_requests(&self, viewer_id: &str) -> Result<Vec<FriendRequest>>;
    /// Full message history with one friend
    async fn messages_with(&self, viewer_id: &str, friend_id: &str) -> Result<Vec<Message>>;
    /// Advance the viewer's read marker for the pair
    async fn mark_read(&self, viewer_id: &str, friend_id: &str) -> Result<i64>;
    /// Server-side user search
    async fn search_users(&self, query: &str) -> Result<Vec<User>>;
    /// The full user directory (fallback filtering)
    async fn all_users(&self) -> Result<Vec<User>>;
}

/// Events pushed to the sync consumer
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Fresh conversation list (roster poll)
    Conversations(Vec<Conversation>),
    /// Fresh pending-request list (roster poll)
    PendingRequests(Vec<FriendRequest>),
    /// Fresh history for one conversation (open or focus poll)
    Messages {
        friend_id: String,
        messages: Vec<Message>,
    },
}

/// Timing knobs for the sync loop
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Poll period for the open conversation's messages
    pub message_interval: Duration,
    /// Poll period for conversations and pending requests
    pub roster_interval: Duration,
    /// Quiet period before a search is issued
    pub search_debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            message_interval: Duration::from_secs(10),
            roster_interval: Duration::from_secs(30),
            search_debounce: Duration::from_millis(300),
        }
    }
}

/// The running sync loop
pub struct SyncLoop;

impl SyncLoop {
    /// Start polling for a viewer
    ///
    /// Both polls fire once immediately, then on their intervals. Returns
    /// the control handle and the event stream; dropping the handle stops
    /// the loop.
    pub fn spawn(
        backend: Arc<dyn ChatBackend>,
        viewer_id: impl Into<String>,
        config: SyncConfig,
    ) -> (SyncHandle, mpsc::UnboundedReceiver<SyncEvent>) {
        let viewer_id = viewer_id.into();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (focus_tx, focus_rx) = watch::channel::<Option<String>>(None);

        let roster = tokio::spawn(roster_task(
            backend.clone(),
            viewer_id.clone(),
            events_tx.clone(),
            config.roster_interval,
        ));
        let focus = tokio::spawn(focus_task(
            backend.clone(),
            viewer_id.clone(),
            events_tx.clone(),
            focus_rx,
            config.message_interval,
        ));

        tracing::info!("Sync loop started for {}", viewer_id);

        let handle = SyncHandle {
            backend,
            viewer_id,
            events: events_tx,
            focus: focus_tx,
            tasks: vec![roster, focus],
        };

        (handle, events_rx)
    }
}

/// Control handle for a running [`SyncLoop`]
pub struct SyncHandle {
    backend: Arc<dyn ChatBackend>,
    viewer_id: String,
    events: mpsc::UnboundedSender<SyncEvent>,
    focus: watch::Sender<Option<String>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    /// Open a conversation: fetch its history, mark it read, start the
    /// focused message poll
    ///
    /// This is the only place the sync layer advances a read marker, and it
    /// does so once per call. The history is both returned and emitted as a
    /// [`SyncEvent::Messages`].
    pub async fn open_conversation(&self, friend_id: &str) -> Result<Vec<Message>> {
        let messages = self.backend.messages_with(&self.viewer_id, friend_id).await?;
        self.backend.mark_read(&self.viewer_id, friend_id).await?;

        let _ = self.events.send(SyncEvent::Messages {
            friend_id: friend_id.to_string(),
            messages: messages.clone(),
        });
        let _ = self.focus.send(Some(friend_id.to_string()));

        tracing::debug!("Opened conversation with {}", friend_id);

        Ok(messages)
    }

    /// Close the open conversation, stopping the focused message poll
    pub fn close_conversation(&self) {
        let _ = self.focus.send(None);
        tracing::debug!("Closed conversation");
    }

    /// Stop the loop
    pub fn shutdown(mut self) {
        self.stop_tasks();
        tracing::info!("Sync loop stopped for {}", self.viewer_id);
    }

    fn stop_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

/// Poll conversations and pending requests on one shared cadence
async fn roster_task(
    backend: Arc<dyn ChatBackend>,
    viewer_id: String,
    events: mpsc::UnboundedSender<SyncEvent>,
    interval: Duration,
) {
    loop {
        match backend.conversations(&viewer_id).await {
            Ok(conversations) => {
                let _ = events.send(SyncEvent::Conversations(conversations));
            }
            Err(e) => tracing::warn!("Conversation poll failed: {}", e),
        }

        match backend.pending_requests(&viewer_id).await {
            Ok(requests) => {
                let _ = events.send(SyncEvent::PendingRequests(requests));
            }
            Err(e) => tracing::warn!("Pending-request poll failed: {}", e),
        }

        tokio::time::sleep(interval).await;
    }
}

/// Poll message history for whichever conversation is focused
///
/// Never calls mark_read; read state belongs to explicit opens. A focus
/// change drops the pending sleep, so retargeting takes effect immediately
/// instead of after the old timer fires.
async fn focus_task(
    backend: Arc<dyn ChatBackend>,
    viewer_id: String,
    events: mpsc::UnboundedSender<SyncEvent>,
    mut focus: watch::Receiver<Option<String>>,
    interval: Duration,
) {
    loop {
        let focused = focus.borrow_and_update().clone();

        match focused {
            None => {
                // Nothing open; park until the focus changes
                if focus.changed().await.is_err() {
                    break;
                }
            }
            Some(friend_id) => {
                tokio::select! {
                    changed = focus.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {
                        match backend.messages_with(&viewer_id, &friend_id).await {
                            Ok(messages) => {
                                let _ = events.send(SyncEvent::Messages {
                                    friend_id: friend_id.clone(),
                                    messages,
                                });
                            }
                            Err(e) => tracing::warn!("Message poll failed: {}", e),
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// SEARCH
// ============================================================================

/// Coalesce bursts of calls into one trailing execution
///
/// Each call cancels the previous pending one, so only the last call in a
/// burst runs, after the configured quiet period.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `work` to run after the quiet period, cancelling any
    /// previously scheduled work
    pub fn call<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let delay = self.delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        }));
    }

    /// Cancel any scheduled work without replacing it
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Search users, falling back to client-side filtering
///
/// A blank query returns nothing. When the backend search comes back empty
/// for a non-blank query, the full directory is fetched and filtered locally
/// by the same case-insensitive substring rule. The viewer is excluded from
/// results either way.
pub async fn search_with_fallback(
    backend: &dyn ChatBackend,
    viewer_id: &str,
    query: &str,
) -> Result<Vec<User>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let mut results = backend.search_users(query).await?;

    if results.is_empty() {
        tracing::debug!("Search '{}' empty, falling back to local filter", query);
        let needle = query.to_lowercase();
        results = backend
            .all_users()
            .await?
            .into_iter()
            .filter(|u| {
                u.display_name.to_lowercase().contains(&needle)
                    || u.email.to_lowercase().contains(&needle)
            })
            .collect();
    }

    results.retain(|u| u.id != viewer_id);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scriptable backend for timer tests
    struct MockBackend {
        users: Vec<User>,
        messages: Vec<Message>,
        conversation_polls: AtomicU32,
        message_polls: AtomicU32,
        mark_read_calls: AtomicU32,
        fail_conversations: std::sync::atomic::AtomicBool,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                users: Vec::new(),
                messages: Vec::new(),
                conversation_polls: AtomicU32::new(0),
                message_polls: AtomicU32::new(0),
                mark_read_calls: AtomicU32::new(0),
                fail_conversations: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn with_users(users: Vec<User>) -> Self {
            Self {
                users,
                ..Self::new()
            }
        }
    }

    fn user(id: &str, name: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            display_name: name.to_string(),
            email: email.to_string(),
            created_at: 0,
        }
    }

    #[async_trait]
    impl ChatBackend for MockBackend {
        async fn conversations(&self, _viewer_id: &str) -> Result<Vec<Conversation>> {
            self.conversation_polls.fetch_add(1, Ordering::SeqCst);
            if self.fail_conversations.load(Ordering::SeqCst) {
                return Err(crate::error::Error::Database("connection lost".to_string()));
            }
            Ok(Vec::new())
        }

        async fn pending_requests(&self, _viewer_id: &str) -> Result<Vec<FriendRequest>> {
            Ok(Vec::new())
        }

        async fn messages_with(
            &self,
            _viewer_id: &str,
            _friend_id: &str,
        ) -> Result<Vec<Message>> {
            self.message_polls.fetch_add(1, Ordering::SeqCst);
            Ok(self.messages.clone())
        }

        async fn mark_read(&self, _viewer_id: &str, _friend_id: &str) -> Result<i64> {
            self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        async fn search_users(&self, query: &str) -> Result<Vec<User>> {
            // Simulates a server matching display names only
            Ok(self
                .users
                .iter()
                .filter(|u| u.display_name.contains(query))
                .cloned()
                .collect())
        }

        async fn all_users(&self) -> Result<Vec<User>> {
            Ok(self.users.clone())
        }
    }

    async fn settle() {
        // Let spawned tasks observe the latest state
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn config() -> SyncConfig {
        SyncConfig::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_roster_polls_on_interval() {
        let backend = Arc::new(MockBackend::new());
        let (handle, mut events) = SyncLoop::spawn(backend.clone(), "viewer", config());

        settle().await;
        assert_eq!(backend.conversation_polls.load(Ordering::SeqCst), 1);
        assert!(matches!(events.try_recv(), Ok(SyncEvent::Conversations(_))));
        assert!(matches!(events.try_recv(), Ok(SyncEvent::PendingRequests(_))));

        // Nothing more until the interval elapses
        tokio::time::advance(Duration::from_secs(29)).await;
        settle().await;
        assert_eq!(backend.conversation_polls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(backend.conversation_polls.load(Ordering::SeqCst), 2);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_marks_read_exactly_once() {
        let backend = Arc::new(MockBackend::new());
        let (handle, _events) = SyncLoop::spawn(backend.clone(), "viewer", config());
        settle().await;

        handle.open_conversation("friend").await.unwrap();
        assert_eq!(backend.mark_read_calls.load(Ordering::SeqCst), 1);

        // Background message polls must not touch the marker
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(10)).await;
            settle().await;
        }
        // open fetch + three ticks
        assert_eq!(backend.message_polls.load(Ordering::SeqCst), 4);
        assert_eq!(backend.mark_read_calls.load(Ordering::SeqCst), 1);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_message_polling() {
        let backend = Arc::new(MockBackend::new());
        let (handle, _events) = SyncLoop::spawn(backend.clone(), "viewer", config());
        settle().await;

        handle.open_conversation("friend").await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        let polled = backend.message_polls.load(Ordering::SeqCst);
        assert!(polled >= 2); // open fetch + at least one tick

        handle.close_conversation();
        settle().await;

        // The pending timer is cancelled, not left to fire once more
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(backend.message_polls.load(Ordering::SeqCst), polled);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_retargets_immediately() {
        let backend = Arc::new(MockBackend::new());
        let (handle, mut events) = SyncLoop::spawn(backend.clone(), "viewer", config());
        settle().await;
        while events.try_recv().is_ok() {}

        handle.open_conversation("first").await.unwrap();
        handle.open_conversation("second").await.unwrap();
        settle().await;

        // Both opens emitted history for their own friend
        let mut opened = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::Messages { friend_id, .. } = event {
                opened.push(friend_id);
            }
        }
        assert_eq!(opened, vec!["first", "second"]);

        // Subsequent ticks poll only the second conversation
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        let mut polled = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::Messages { friend_id, .. } = event {
                polled.push(friend_id);
            }
        }
        assert_eq!(polled, vec!["second"]);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_is_soft() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_conversations.store(true, Ordering::SeqCst);
        let (handle, mut events) = SyncLoop::spawn(backend.clone(), "viewer", config());
        settle().await;

        // Failed poll: no Conversations event, but requests still flow and
        // the loop stays alive
        assert!(matches!(events.try_recv(), Ok(SyncEvent::PendingRequests(_))));
        assert!(events.try_recv().is_err());

        backend.fail_conversations.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert!(matches!(events.try_recv(), Ok(SyncEvent::Conversations(_))));

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_runs_only_last_call() {
        let counter = Arc::new(AtomicU32::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(300));

        for _ in 0..5 {
            let counter = counter.clone();
            debouncer.call(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            settle().await;
        }

        tokio::time::advance(Duration::from_millis(300)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_cancel() {
        let counter = Arc::new(AtomicU32::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(300));

        {
            let counter = counter.clone();
            debouncer.call(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        settle().await;
        debouncer.cancel();

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_blank_query_is_empty() {
        let backend = MockBackend::with_users(vec![user("u1", "Alice", "a@campus.edu")]);
        for query in ["", "   "] {
            assert!(search_with_fallback(&backend, "me", query)
                .await
                .unwrap()
                .is_empty());
        }
    }

    #[tokio::test]
    async fn test_search_excludes_viewer() {
        let backend = MockBackend::with_users(vec![
            user("me", "Alice Prime", "me@campus.edu"),
            user("u2", "Alice Second", "other@campus.edu"),
        ]);

        let results = search_with_fallback(&backend, "me", "Alice").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "u2");
    }

    #[tokio::test]
    async fn test_search_falls_back_to_local_filter() {
        // The mock's server search matches display names only; an email
        // query forces the fallback path.
        let backend = MockBackend::with_users(vec![
            user("u1", "Alice", "alice@campus.edu"),
            user("u2", "Bob", "bob@campus.edu"),
        ]);

        let results = search_with_fallback(&backend, "me", "bob@campus")
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "u2");

        // Case-insensitive on the fallback path too
        let results = search_with_fallback(&backend, "me", "ALICE@").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "u1");
    }

    #[tokio::test]
    async fn test_search_no_match_anywhere() {
        let backend = MockBackend::with_users(vec![user("u1", "Alice", "a@campus.edu")]);
        assert!(search_with_fallback(&backend, "me", "zelda")
            .await
            .unwrap()
            .is_empty());
    }
}
