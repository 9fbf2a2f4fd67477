//! Inventory source trait definition
//!
//! An inventory source is an upstream catalog split into partitions (program
//! handles, apex domains). The collector lists the partitions once per cycle
//! and then fetches each one on its worker pool.

use async_trait::async_trait;

use crate::error::{CollectError, FetchError};

/// Trait for upstream inventory catalogs
///
/// # Example
///
/// ```ignore
/// use scope_watch::sources::InventorySource;
/// use scope_watch::error::{CollectError, FetchError};
///
/// struct StaticSource;
///
/// #[async_trait]
/// impl InventorySource for StaticSource {
///     fn name(&self) -> &str {
///         "static"
///     }
///
///     async fn partitions(&self) -> Result<Vec<String>, CollectError> {
///         Ok(vec!["acme".to_string()])
///     }
///
///     async fn fetch(&self, partition: &str) -> Result<Vec<String>, FetchError> {
///         Ok(vec![format!("https://{}.example.com", partition)])
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Get the source name (e.g. "hackerone", "anubis")
    fn name(&self) -> &str;

    /// List the partitions to fetch this cycle
    ///
    /// Pagination, if any, is handled inside the source.
    async fn partitions(&self) -> Result<Vec<String>, CollectError>;

    /// Fetch every item belonging to one partition
    async fn fetch(&self, partition: &str) -> Result<Vec<String>, FetchError>;
}
