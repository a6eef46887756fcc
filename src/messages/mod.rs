//! # Message Store
//!
//! Append-only direct messages between friends plus per-pair read markers.
//!
//! Ordering is total and stable: messages sort by `(created_at, seq)`, where
//! `seq` is the database-assigned insertion order. Two messages sent in the
//! same millisecond never flip.
//!
//! Read state lives outside the messages: each `(reader, peer)` pair owns a
//! marker holding the highest `seq` the reader has marked read. Unread is
//! then a count of the peer's messages past that marker. Markers only move
//! through [`MessageStore::mark_read`], an explicit act the caller ties to
//! actually viewing a conversation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::{Database, MessageRecord};

/// The kind of content a message carries
///
/// Only plain text today; the wire representation leaves room for more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageType::Text),
            _ => None,
        }
    }
}

/// A direct message between two friends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id
    pub id: String,
    /// Insertion-order sequence number; ordering tiebreaker and read-marker
    /// boundary
    pub seq: i64,
    /// Who sent the message
    pub sender_id: String,
    /// Who it is addressed to
    pub receiver_id: String,
    /// Message body
    pub content: String,
    /// Content kind
    pub message_type: MessageType,
    /// Send timestamp (Unix ms)
    pub created_at: i64,
}

impl Message {
    fn from_record(record: MessageRecord) -> Result<Self> {
        let message_type = MessageType::parse(&record.message_type).ok_or_else(|| {
            Error::Database(format!(
                "Corrupt message type '{}' for {}",
                record.message_type, record.id
            ))
        })?;

        Ok(Self {
            id: record.id,
            seq: record.seq,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            content: record.content,
            message_type,
            created_at: record.created_at,
        })
    }
}

/// Service for sending, listing, and marking messages read
pub struct MessageStore {
    db: Arc<Database>,
}

impl MessageStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Send a message from one friend to another
    ///
    /// Requires an existing friendship edge and non-blank content. Content
    /// is stored as given (no trimming); blankness is judged after trim.
    pub fn send(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }

        if !self.db.friendship_exists(sender_id, receiver_id)? {
            return Err(Error::NotFriends);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let created_at = crate::time::now_timestamp_millis();
        let seq = self.db.insert_message(
            &id,
            sender_id,
            receiver_id,
            content,
            message_type.as_str(),
            created_at,
        )?;

        tracing::debug!("Message {} (seq {}) {} -> {}", id, seq, sender_id, receiver_id);

        Ok(Message {
            id,
            seq,
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            message_type,
            created_at,
        })
    }

    /// Full history between two users, oldest first
    ///
    /// Symmetric in its arguments; both directions of traffic interleave in
    /// `(created_at, seq)` order.
    pub fn list_between(&self, a: &str, b: &str) -> Result<Vec<Message>> {
        self.db
            .list_messages_between(a, b)?
            .into_iter()
            .map(Message::from_record)
            .collect()
    }

    /// The most recent message between the pair, if any
    pub fn latest_between(&self, a: &str, b: &str) -> Result<Option<Message>> {
        match self.db.latest_message_between(a, b)? {
            Some(record) => Ok(Some(Message::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Mark everything `other_id` has sent the reader as read
    ///
    /// Advances the reader's marker for the pair to the current latest seq
    /// and returns it. Idempotent; never moves the marker backwards.
    pub fn mark_read(&self, reader_id: &str, other_id: &str) -> Result<i64> {
        let boundary = self.db.mark_read(reader_id, other_id)?;
        tracing::debug!(
            "Read marker for ({}, {}) advanced to seq {}",
            reader_id,
            other_id,
            boundary
        );
        Ok(boundary)
    }

    /// Messages from `other_id` the reader has not yet marked read
    pub fn unread_count(&self, reader_id: &str, other_id: &str) -> Result<u32> {
        self.db.unread_count(reader_id, other_id)
    }
}
