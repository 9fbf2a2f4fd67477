//! Anubis subdomain catalog
//!
//! Partitions are the registrable domains of the current URL scope, read
//! from the scope watcher's stored snapshot. Each partition queries
//! `GET {base}/{domain}`, which answers with a JSON array of subdomains.
//! A successful partition also yields the domain itself.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::AnubisConfig;
use crate::error::{CollectError, FetchError};
use crate::store::SnapshotStore;
use crate::sync::HttpClient;

use super::domain::registrable_domains;
use super::InventorySource;

/// Subdomains of the in-scope registrable domains, from Anubis
pub struct AnubisSource {
    config: AnubisConfig,
    client: HttpClient,
    store: Arc<dyn SnapshotStore>,
    scope_key: String,
}

impl AnubisSource {
    /// Create a source deriving its domains from the snapshot under `scope_key`
    pub fn new(
        config: AnubisConfig,
        client: HttpClient,
        store: Arc<dyn SnapshotStore>,
        scope_key: impl Into<String>,
    ) -> Self {
        Self {
            config,
            client,
            store,
            scope_key: scope_key.into(),
        }
    }

    /// Subdomains Anubis knows for `domain`
    pub async fn subdomains(&self, domain: &str) -> Result<Vec<String>, FetchError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), domain);
        let request = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent);

        let subdomains: Vec<String> = self.client.send_json(request).await?;
        debug!(domain = domain, subdomains = subdomains.len(), "Queried Anubis");
        Ok(subdomains)
    }
}

#[async_trait]
impl InventorySource for AnubisSource {
    fn name(&self) -> &str {
        "anubis"
    }

    async fn partitions(&self) -> Result<Vec<String>, CollectError> {
        let scope = self
            .store
            .load(&self.scope_key)
            .await?
            .ok_or_else(|| CollectError::NoPartitionSource(self.scope_key.clone()))?;

        let domains = registrable_domains(scope.items());
        info!(
            scope_items = scope.len(),
            domains = domains.len(),
            "Derived domains from URL scope"
        );
        Ok(domains)
    }

    async fn fetch(&self, partition: &str) -> Result<Vec<String>, FetchError> {
        let mut items = vec![partition.to_string()];
        items.extend(self.subdomains(partition).await?);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::models::Snapshot;
    use crate::store::{MemorySnapshotStore, MockSnapshotStore};
    use crate::error::StoreError;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCOPE_KEY: &str = "hackerone:previous_urls";

    fn source(server: &MockServer, store: Arc<dyn SnapshotStore>) -> AnubisSource {
        AnubisSource::new(
            AnubisConfig {
                base_url: format!("{}/anubis/subdomains/", server.uri()),
                user_agent: "scope-watch-test".to_string(),
            },
            HttpClient::new(&HttpConfig { timeout_secs: 5 }).unwrap(),
            store,
            SCOPE_KEY,
        )
    }

    // Test 1: Partitions are the registrable domains of the stored scope
    #[tokio::test]
    async fn test_partitions_from_scope_snapshot() {
        let server = MockServer::start().await;
        let store = MemorySnapshotStore::new();
        let scope = Snapshot::new(
            SCOPE_KEY,
            vec![
                "https://app.acme.com/login".to_string(),
                "*.acme.com".to_string(),
                "https://www.globex.co.uk".to_string(),
            ],
        );
        store.save(SCOPE_KEY, &scope, Duration::ZERO).await.unwrap();

        let partitions = source(&server, Arc::new(store)).partitions().await.unwrap();

        assert_eq!(partitions, vec!["acme.com", "globex.co.uk"]);
    }

    // Test 2: Missing scope snapshot is reported, not treated as empty
    #[tokio::test]
    async fn test_partitions_without_scope_snapshot() {
        let server = MockServer::start().await;
        let store = Arc::new(MemorySnapshotStore::new());

        let result = source(&server, store).partitions().await;

        assert_eq!(
            result.unwrap_err(),
            CollectError::NoPartitionSource(SCOPE_KEY.to_string())
        );
    }

    // Test 3: Store failures propagate
    #[tokio::test]
    async fn test_partitions_store_error() {
        let server = MockServer::start().await;
        let mut store = MockSnapshotStore::new();
        store
            .expect_load()
            .returning(|_| Err(StoreError::Redis("connection reset".to_string())));

        let result = source(&server, Arc::new(store)).partitions().await;

        assert!(matches!(result, Err(CollectError::Store(StoreError::Redis(_)))));
    }

    // Test 4: Fetch returns the domain and its subdomains, sending the User-Agent
    #[tokio::test]
    async fn test_fetch_includes_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anubis/subdomains/acme.com"))
            .and(header("User-Agent", "scope-watch-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!(["api.acme.com", "mail.acme.com"])),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemorySnapshotStore::new());
        let items = source(&server, store).fetch("acme.com").await.unwrap();

        assert_eq!(items, vec!["acme.com", "api.acme.com", "mail.acme.com"]);
    }

    // Test 5: Non-200 responses fail the partition
    #[tokio::test]
    async fn test_fetch_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anubis/subdomains/acme.com"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let store = Arc::new(MemorySnapshotStore::new());
        let result = source(&server, store).fetch("acme.com").await;

        assert_eq!(result.unwrap_err(), FetchError::ServerError(502));
    }
}
