//! # Friend Requests
//!
//! The request lifecycle that gates every friendship:
//!
//! ```text
//!                    ┌──────────┐
//!     send_request   │          │  respond(Accept)   ┌──────────┐
//!    ───────────────▶│ Pending  │───────────────────▶│ Accepted │──▶ friendship edge
//!                    │          │                    └──────────┘
//!                    │          │  respond(Reject)   ┌──────────┐
//!                    │          │───────────────────▶│ Rejected │    (no edge)
//!                    └──────────┘                    └──────────┘
//! ```
//!
//! Accepted and Rejected are terminal. At most one pending request exists
//! per user pair, in either direction, and accepting flips the status and
//! creates the edge atomically.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graph::Friendship;
use crate::storage::{Database, FriendRequestRecord};

/// Default greeting attached to a request when the sender writes nothing
pub const DEFAULT_REQUEST_MESSAGE: &str = "Hi! I would like to connect with you.";

/// Lifecycle status of a friend request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Awaiting a response from the receiver
    Pending,
    /// Accepted; a friendship edge exists (terminal)
    Accepted,
    /// Declined by the receiver (terminal)
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }

    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// The receiver's decision on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Accept,
    Reject,
}

/// A friend request between two users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    /// Unique request id
    pub id: String,
    /// Who sent it
    pub sender_id: String,
    /// Who it is addressed to
    pub receiver_id: String,
    /// Optional greeting from the sender
    pub message: Option<String>,
    /// Current lifecycle status
    pub status: RequestStatus,
    /// When the request was sent (Unix ms)
    pub created_at: i64,
}

impl FriendRequest {
    fn from_record(record: FriendRequestRecord) -> Result<Self> {
        let status = RequestStatus::parse(&record.status).ok_or_else(|| {
            Error::Database(format!(
                "Corrupt request status '{}' for {}",
                record.status, record.id
            ))
        })?;

        Ok(Self {
            id: record.id,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            message: record.message,
            status,
            created_at: record.created_at,
        })
    }
}

/// Result of responding to a request
///
/// `friendship` is present exactly when the action was `Accept`.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub request: FriendRequest,
    pub friendship: Option<Friendship>,
}

/// Service managing the friend-request lifecycle
pub struct FriendRequestService {
    db: Arc<Database>,
    directory: crate::directory::DirectoryService,
}

impl FriendRequestService {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            directory: crate::directory::DirectoryService::new(db.clone()),
            db,
        }
    }

    /// Send a friend request
    ///
    /// Rejects self-requests, unknown endpoints, pairs that are already
    /// friends, and pairs with a pending request in either direction.
    pub fn send_request(
        &self,
        sender_id: &str,
        receiver_id: &str,
        message: Option<&str>,
    ) -> Result<FriendRequest> {
        if sender_id == receiver_id {
            return Err(Error::SelfRequest);
        }

        self.directory.require(sender_id)?;
        self.directory.require(receiver_id)?;

        let request = FriendRequest {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            message: message.map(|m| m.to_string()),
            status: RequestStatus::Pending,
            created_at: crate::time::now_timestamp_millis(),
        };

        // The duplicate/already-friends checks run inside the insert's
        // transaction.
        self.db.insert_friend_request(&FriendRequestRecord {
            id: request.id.clone(),
            sender_id: request.sender_id.clone(),
            receiver_id: request.receiver_id.clone(),
            message: request.message.clone(),
            status: request.status.as_str().to_string(),
            created_at: request.created_at,
        })?;

        tracing::info!(
            "Friend request {} sent: {} -> {}",
            request.id,
            sender_id,
            receiver_id
        );

        Ok(request)
    }

    /// Respond to a pending request as its receiver
    ///
    /// Only the receiver may respond. Accept creates the friendship edge in
    /// the same transaction as the status flip; reject leaves no edge.
    pub fn respond(
        &self,
        request_id: &str,
        responder_id: &str,
        action: RequestAction,
    ) -> Result<RequestOutcome> {
        let record = self
            .db
            .get_friend_request(request_id)?
            .ok_or(Error::RequestNotFound)?;
        let request = FriendRequest::from_record(record)?;

        if request.receiver_id != responder_id {
            return Err(Error::Forbidden);
        }

        if request.status.is_terminal() {
            return Err(Error::AlreadyResolved);
        }

        match action {
            RequestAction::Accept => {
                let edge = self.db.accept_friend_request(request_id)?;
                tracing::info!(
                    "Friend request {} accepted; {} and {} are now friends",
                    request_id,
                    request.sender_id,
                    request.receiver_id
                );

                Ok(RequestOutcome {
                    request: FriendRequest {
                        status: RequestStatus::Accepted,
                        ..request
                    },
                    friendship: Some(Friendship::from_record(edge)),
                })
            }
            RequestAction::Reject => {
                self.db.reject_friend_request(request_id)?;
                tracing::info!("Friend request {} rejected", request_id);

                Ok(RequestOutcome {
                    request: FriendRequest {
                        status: RequestStatus::Rejected,
                        ..request
                    },
                    friendship: None,
                })
            }
        }
    }

    /// Get a request by id
    pub fn get(&self, request_id: &str) -> Result<Option<FriendRequest>> {
        match self.db.get_friend_request(request_id)? {
            Some(record) => Ok(Some(FriendRequest::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Requests addressed to the user, newest first
    pub fn list_received(&self, user_id: &str) -> Result<Vec<FriendRequest>> {
        self.db
            .list_friend_requests(user_id, true, None)?
            .into_iter()
            .map(FriendRequest::from_record)
            .collect()
    }

    /// Requests the user sent, newest first
    pub fn list_sent(&self, user_id: &str) -> Result<Vec<FriendRequest>> {
        self.db
            .list_friend_requests(user_id, false, None)?
            .into_iter()
            .map(FriendRequest::from_record)
            .collect()
    }

    /// Pending requests awaiting the user's response, newest first
    pub fn pending_received(&self, user_id: &str) -> Result<Vec<FriendRequest>> {
        self.db
            .list_friend_requests(user_id, true, Some("pending"))?
            .into_iter()
            .map(FriendRequest::from_record)
            .collect()
    }
}
