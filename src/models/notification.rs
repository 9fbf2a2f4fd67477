//! Notification message model

use serde::{Deserialize, Serialize};

/// Position of a chunk within one chunked announcement (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSequence {
    /// 1-based chunk index
    pub index: usize,
    /// Total number of chunks
    pub count: usize,
}

/// A plain-text message published on the notification channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Message body, delivered verbatim
    pub text: String,
    /// Set when the message is one chunk of a larger item list
    pub sequence: Option<ChunkSequence>,
}

impl NotificationMessage {
    /// A standalone message
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sequence: None,
        }
    }

    /// One chunk of a chunked announcement
    pub fn chunk(text: impl Into<String>, index: usize, count: usize) -> Self {
        Self {
            text: text.into(),
            sequence: Some(ChunkSequence { index, count }),
        }
    }
}
