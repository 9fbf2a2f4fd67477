//! Change announcements
//!
//! Turns change sets into channel messages. Large item lists are split into
//! numbered chunks published in order, spaced by a fixed delay. Publishing
//! is fire-and-forget: a failed publish is logged and the fanout moves on.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::models::NotificationMessage;

use super::channel::NotificationChannel;

/// Split `items` into messages of at most `chunk_size` items each
///
/// Each message reads `"<title> (<i>/<n>) - <count> domains:"` followed by
/// one item per line. Items keep their input order. A zero `chunk_size`
/// is treated as one.
pub fn chunk_messages(items: &[String], title: &str, chunk_size: usize) -> Vec<NotificationMessage> {
    let chunk_size = chunk_size.max(1);
    let count = items.len().div_ceil(chunk_size);

    items
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| {
            let text = format!(
                "{} ({}/{}) - {} domains:\n{}",
                title,
                i + 1,
                count,
                chunk.len(),
                chunk.join("\n")
            );
            NotificationMessage::chunk(text, i + 1, count)
        })
        .collect()
}

/// Publishes change announcements on a notification channel
#[derive(Clone)]
pub struct NotificationFanout {
    channel: Arc<dyn NotificationChannel>,
    chunk_delay: Duration,
}

impl NotificationFanout {
    /// Create a fanout spacing chunk publications by `chunk_delay`
    pub fn new(channel: Arc<dyn NotificationChannel>, chunk_delay: Duration) -> Self {
        Self {
            channel,
            chunk_delay,
        }
    }

    /// Publish a one-line summary of the change magnitude
    ///
    /// Returns the number of messages published successfully.
    pub async fn announce_summary(&self, label: &str, added: usize, removed: usize) -> usize {
        let text = format!(
            "{} Changes Detected\nAdded: {} | Removed: {}",
            label, added, removed
        );
        self.publish(&NotificationMessage::text(text)).await as usize
    }

    /// Publish `items` inline in one message, e.g. `Added: [a.com, b.com]`
    ///
    /// Nothing is published for an empty list.
    pub async fn announce_inline(&self, label: &str, items: &[String]) -> usize {
        if items.is_empty() {
            return 0;
        }
        let text = format!("{}: [{}]", label, items.join(", "));
        self.publish(&NotificationMessage::text(text)).await as usize
    }

    /// Publish `items` as numbered chunks of at most `chunk_size`
    ///
    /// Chunks go out in index order with the configured delay between them.
    /// Returns the number of chunks published successfully.
    pub async fn announce_items(&self, items: &[String], title: &str, chunk_size: usize) -> usize {
        let messages = chunk_messages(items, title, chunk_size);
        let total = messages.len();
        let mut published = 0;

        for (i, message) in messages.iter().enumerate() {
            if i > 0 && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
            if self.publish(message).await {
                published += 1;
                debug!(title = title, chunk = i + 1, chunks = total, "Published chunk");
            }
        }

        if total > 0 {
            info!(
                title = title,
                items = items.len(),
                chunks = total,
                published = published,
                "Announced item list"
            );
        }
        published
    }

    async fn publish(&self, message: &NotificationMessage) -> bool {
        match self.channel.publish(message).await {
            Ok(_) => true,
            Err(err) => {
                error!(
                    channel = self.channel.name(),
                    error = %err,
                    "Failed to publish notification"
                );
                false
            }
        }
    }
}
