//! HackerOne hacker API catalog
//!
//! Partitions are program handles, listed page by page from
//! `GET {base}/programs?page[size]=N&page[number]=n` until an empty page.
//! Each partition fetches `GET {base}/programs/{handle}/structured_scopes`
//! and keeps the identifiers of bounty-eligible `URL` and `WILDCARD` assets.
//!
//! # Example
//!
//! ```ignore
//! use scope_watch::sources::HackerOneSource;
//!
//! let source = HackerOneSource::new(config.hackerone.clone(), http_client);
//! let handles = source.partitions().await?;
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::HackerOneConfig;
use crate::error::{CollectError, FetchError};
use crate::sync::HttpClient;

use super::InventorySource;

/// Upper bound on program listing pages
const MAX_PAGES: u32 = 1000;

/// Asset types tracked as URL scope
const TRACKED_ASSET_TYPES: [&str; 2] = ["URL", "WILDCARD"];

#[derive(Debug, Deserialize)]
struct ProgramsPage {
    #[serde(default)]
    data: Vec<ProgramEntry>,
}

#[derive(Debug, Deserialize)]
struct ProgramEntry {
    attributes: ProgramAttributes,
}

#[derive(Debug, Deserialize)]
struct ProgramAttributes {
    handle: String,
}

#[derive(Debug, Deserialize)]
struct StructuredScopes {
    #[serde(default)]
    data: Vec<ScopeEntry>,
}

#[derive(Debug, Deserialize)]
struct ScopeEntry {
    attributes: ScopeAttributes,
}

#[derive(Debug, Deserialize)]
struct ScopeAttributes {
    asset_type: String,
    asset_identifier: String,
    #[serde(default)]
    eligible_for_bounty: bool,
}

impl ScopeAttributes {
    fn is_tracked(&self) -> bool {
        self.eligible_for_bounty && TRACKED_ASSET_TYPES.contains(&self.asset_type.as_str())
    }
}

/// Program scope catalog on the HackerOne hacker API
#[derive(Debug, Clone)]
pub struct HackerOneSource {
    config: HackerOneConfig,
    client: HttpClient,
}

impl HackerOneSource {
    /// Create a source with the given credentials and client
    pub fn new(config: HackerOneConfig, client: HttpClient) -> Self {
        Self { config, client }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// List every program handle visible to the account
    pub async fn program_handles(&self) -> Result<Vec<String>, FetchError> {
        let url = self.endpoint("programs");
        let page_size = self.config.page_size.to_string();
        let mut handles = Vec::new();

        for page in 1..=MAX_PAGES {
            let request = self
                .client
                .get(&url)
                .basic_auth(&self.config.username, Some(&self.config.token))
                .query(&[
                    ("page[size]", page_size.as_str()),
                    ("page[number]", page.to_string().as_str()),
                ]);

            let body: ProgramsPage = self.client.send_json(request).await?;
            if body.data.is_empty() {
                debug!(page = page, "Reached end of program listing");
                break;
            }
            if page == MAX_PAGES {
                warn!(pages = MAX_PAGES, "Program listing truncated");
            }

            handles.extend(body.data.into_iter().map(|p| p.attributes.handle));
        }

        info!(programs = handles.len(), "Listed HackerOne programs");
        Ok(handles)
    }

    /// Bounty-eligible URL and wildcard identifiers of one program
    pub async fn structured_scope(&self, handle: &str) -> Result<Vec<String>, FetchError> {
        let url = self.endpoint(&format!("programs/{}/structured_scopes", handle));
        let request = self
            .client
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.token));

        let body: StructuredScopes = self.client.send_json(request).await?;
        Ok(body
            .data
            .into_iter()
            .map(|scope| scope.attributes)
            .filter(ScopeAttributes::is_tracked)
            .map(|attributes| attributes.asset_identifier)
            .collect())
    }
}

#[async_trait]
impl InventorySource for HackerOneSource {
    fn name(&self) -> &str {
        "hackerone"
    }

    async fn partitions(&self) -> Result<Vec<String>, CollectError> {
        Ok(self.program_handles().await?)
    }

    async fn fetch(&self, partition: &str) -> Result<Vec<String>, FetchError> {
        self.structured_scope(partition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> HackerOneSource {
        HackerOneSource::new(
            HackerOneConfig {
                username: "hunter".to_string(),
                token: "secret".to_string(),
                base_url: format!("{}/v1/hackers/", server.uri()),
                page_size: 100,
            },
            HttpClient::new(&HttpConfig { timeout_secs: 5 }).unwrap(),
        )
    }

    fn programs(handles: &[&str]) -> serde_json::Value {
        json!({
            "data": handles
                .iter()
                .map(|h| json!({"id": "1", "type": "program", "attributes": {"handle": h}}))
                .collect::<Vec<_>>()
        })
    }

    // Test 1: Program listing follows pages until an empty page
    #[tokio::test]
    async fn test_program_handles_paginates() {
        let server = MockServer::start().await;
        for (page, handles) in [("1", vec!["acme", "globex"]), ("2", vec!["initech"]), ("3", vec![])] {
            Mock::given(method("GET"))
                .and(path("/v1/hackers/programs"))
                .and(query_param("page[size]", "100"))
                .and(query_param("page[number]", page))
                .and(basic_auth("hunter", "secret"))
                .respond_with(ResponseTemplate::new(200).set_body_json(programs(&handles)))
                .expect(1)
                .mount(&server)
                .await;
        }

        let handles = source(&server).partitions().await.unwrap();

        assert_eq!(handles, vec!["acme", "globex", "initech"]);
    }

    // Test 2: Structured scope keeps bounty-eligible URL and wildcard assets
    #[tokio::test]
    async fn test_structured_scope_filters_assets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/hackers/programs/acme/structured_scopes"))
            .and(basic_auth("hunter", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"attributes": {"asset_type": "URL", "asset_identifier": "https://app.acme.com", "eligible_for_bounty": true}},
                    {"attributes": {"asset_type": "WILDCARD", "asset_identifier": "*.acme.com", "eligible_for_bounty": true}},
                    {"attributes": {"asset_type": "URL", "asset_identifier": "https://blog.acme.com", "eligible_for_bounty": false}},
                    {"attributes": {"asset_type": "GOOGLE_PLAY_APP_ID", "asset_identifier": "com.acme", "eligible_for_bounty": true}}
                ]
            })))
            .mount(&server)
            .await;

        let items = source(&server).fetch("acme").await.unwrap();

        assert_eq!(items, vec!["https://app.acme.com", "*.acme.com"]);
    }

    // Test 3: Rejected credentials surface as Unauthorized
    #[tokio::test]
    async fn test_unauthorized_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/hackers/programs"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = source(&server).partitions().await;

        assert_eq!(
            result.unwrap_err(),
            CollectError::Partitions(FetchError::Unauthorized)
        );
    }

    // Test 4: Malformed scope payload is invalid data
    #[tokio::test]
    async fn test_malformed_scope_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/hackers/programs/acme/structured_scopes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let result = source(&server).fetch("acme").await;

        assert!(matches!(result, Err(FetchError::InvalidData(_))));
    }

    // Test 5: Endpoint joining tolerates a missing trailing slash
    #[test]
    fn test_endpoint_join() {
        let source = HackerOneSource::new(
            HackerOneConfig {
                base_url: "https://api.hackerone.com/v1/hackers".to_string(),
                ..HackerOneConfig::default()
            },
            HttpClient::new(&HttpConfig::default()).unwrap(),
        );

        assert_eq!(
            source.endpoint("programs"),
            "https://api.hackerone.com/v1/hackers/programs"
        );
    }
}
