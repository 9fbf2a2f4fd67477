//! Notification delivery
//!
//! Watchers announce changes through a [`NotificationFanout`] onto a
//! [`NotificationChannel`]. A [`NotificationConsumer`] subscribes to the same
//! channel and delivers every message through a [`Transport`].
//!
//! # Components
//!
//! - [`channel`]: Redis pub/sub and in-process broadcast channels
//! - [`fanout`]: Summary, inline and chunked announcements
//! - [`consumer`]: Bounded, retrying delivery loop
//! - [`telegram`]: Telegram Bot API transport

pub mod channel;
pub mod consumer;
pub mod fanout;
pub mod telegram;

pub use channel::{LocalChannel, NotificationChannel, RedisChannel, Subscription};
pub use consumer::{ConsumerReport, DeliveryOutcome, NotificationConsumer, Transport};
pub use fanout::{chunk_messages, NotificationFanout};
pub use telegram::TelegramTransport;

#[cfg(test)]
pub use consumer::MockTransport;
