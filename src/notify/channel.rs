//! Notification broadcast channels
//!
//! Watchers publish plain-text messages on a named channel; the consumer
//! subscribes and receives every message published after it subscribed.
//! Each backend forwards into a [`Subscription`] so the consumer does not
//! depend on the transport.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::error::ChannelError;
use crate::models::NotificationMessage;
use crate::sync::Backoff;

/// Buffered messages per subscription
const SUBSCRIPTION_BUFFER: usize = 256;

/// Stream of message payloads from one subscription
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<String>,
}

impl Subscription {
    /// Wrap a receiver fed by a backend forwarder
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Next payload, or `None` once the backend is gone
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Publish/subscribe channel for notification messages
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel backend name (e.g. "redis", "local")
    fn name(&self) -> &str;

    /// Publish one message; returns the number of subscribers that received it
    async fn publish(&self, message: &NotificationMessage) -> Result<usize, ChannelError>;

    /// Subscribe to messages published from now on
    async fn subscribe(&self) -> Result<Subscription, ChannelError>;
}

/// In-process channel on a tokio broadcast
#[derive(Debug, Clone)]
pub struct LocalChannel {
    sender: broadcast::Sender<String>,
}

impl LocalChannel {
    /// Create a channel buffering up to `capacity` unread messages per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new(SUBSCRIPTION_BUFFER)
    }
}

#[async_trait]
impl NotificationChannel for LocalChannel {
    fn name(&self) -> &str {
        "local"
    }

    async fn publish(&self, message: &NotificationMessage) -> Result<usize, ChannelError> {
        match self.sender.send(message.text.clone()) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                debug!("Published with no subscribers");
                Ok(0)
            }
        }
    }

    async fn subscribe(&self) -> Result<Subscription, ChannelError> {
        let mut broadcast_rx = self.sender.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(payload) => {
                        if tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(rx))
    }
}

/// Payload stream of one live pub/sub connection
pub(crate) type PayloadStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Forward payloads into `tx`, opening a fresh stream whenever one ends
///
/// Reconnect attempts are spaced by `reconnect` backoff delays and repeat
/// until one succeeds. Returns once the receiving side is dropped.
pub(crate) async fn forward_with_resubscribe<C, Fut>(
    mut stream: PayloadStream,
    mut connect: C,
    tx: mpsc::Sender<String>,
    reconnect: Backoff,
    channel: String,
) where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<PayloadStream, ChannelError>>,
{
    loop {
        while let Some(payload) = stream.next().await {
            if tx.send(payload).await.is_err() {
                return;
            }
        }
        warn!(channel = %channel, "Notification subscription lost, resubscribing");

        let mut retry = 0;
        stream = loop {
            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(reconnect.delay_for(retry)).await;
            match connect().await {
                Ok(stream) => {
                    info!(channel = %channel, attempts = retry + 1, "Resubscribed to notification channel");
                    break stream;
                }
                Err(err) => {
                    warn!(channel = %channel, attempt = retry + 1, error = %err, "Resubscribe failed");
                    retry = retry.saturating_add(1);
                }
            }
        };
    }
}

/// Redis pub/sub channel
#[derive(Clone)]
pub struct RedisChannel {
    client: redis::Client,
    publisher: ConnectionManager,
    channel: String,
    reconnect: RetryConfig,
}

impl RedisChannel {
    /// Connect a publisher connection for `channel`
    pub async fn connect(url: &str, channel: impl Into<String>) -> Result<Self, ChannelError> {
        let client = redis::Client::open(url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        Ok(Self {
            client,
            publisher,
            channel: channel.into(),
            reconnect: RetryConfig::default(),
        })
    }

    /// Use `reconnect` delays when a subscription has to be reopened
    pub fn with_reconnect(mut self, reconnect: RetryConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Channel name
    pub fn channel(&self) -> &str {
        &self.channel
    }

    async fn open_stream(client: redis::Client, channel: String) -> Result<PayloadStream, ChannelError> {
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        let stream = pubsub.into_on_message().filter_map(move |message| {
            let payload = match message.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(err) => {
                    warn!(channel = %channel, error = %err, "Dropping undecodable payload");
                    None
                }
            };
            futures::future::ready(payload)
        });
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl NotificationChannel for RedisChannel {
    fn name(&self) -> &str {
        "redis"
    }

    async fn publish(&self, message: &NotificationMessage) -> Result<usize, ChannelError> {
        let mut connection = self.publisher.clone();
        let receivers: usize = connection
            .publish(&self.channel, message.text.as_str())
            .await?;
        debug!(channel = %self.channel, receivers = receivers, "Published notification");
        Ok(receivers)
    }

    async fn subscribe(&self) -> Result<Subscription, ChannelError> {
        let stream = Self::open_stream(self.client.clone(), self.channel.clone()).await?;
        info!(channel = %self.channel, "Subscribed to notification channel");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let client = self.client.clone();
        let channel = self.channel.clone();
        let reconnect = Backoff::new(self.reconnect.clone());

        tokio::spawn(async move {
            let name = channel.clone();
            forward_with_resubscribe(
                stream,
                move || Self::open_stream(client.clone(), channel.clone()),
                tx,
                reconnect,
                name.clone(),
            )
            .await;
            debug!(channel = %name, "Notification forwarder stopped");
        });

        Ok(Subscription::new(rx))
    }
}
