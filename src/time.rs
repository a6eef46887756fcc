//! Time utilities.
//!
//! Timestamps throughout the crate are Unix milliseconds. Message ordering
//! does not rely on wall-clock uniqueness; equal timestamps are broken by
//! the message sequence number assigned at insert.

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
