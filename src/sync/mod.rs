//! Collection and scheduling infrastructure
//!
//! This module provides the concurrency building blocks of the pipeline:
//! throttling, retry, the worker pool collector, and the periodic scheduler.
//!
//! # Components
//!
//! - [`ratelimit`]: Token-bucket rate limiter for outbound calls
//! - [`retry`]: Retry manager with exponential backoff for handling transient failures
//! - [`http_client`]: HTTP client with status classification for upstream catalogs
//! - [`collector`]: Bounded worker pool fanning partitions out to an inventory source
//! - [`scheduler`]: Periodic scheduler with graceful shutdown
//!
//! # Example
//!
//! ```ignore
//! use scope_watch::sync::{Collector, CollectorSettings};
//!
//! let collector = Collector::new(CollectorSettings::from(&config.collector));
//! let collection = collector.run(source).await?;
//! ```

pub mod collector;
pub mod http_client;
pub mod ratelimit;
pub mod retry;
pub mod scheduler;

// Re-export main types for convenience
pub use collector::{Collection, Collector, CollectorSettings};
pub use http_client::HttpClient;
pub use ratelimit::RateLimiter;
pub use retry::{Attempted, Backoff, RetryManager};
pub use scheduler::{Scheduler, SchedulerConfig, StatusMap, Watch, WatchStatus};
