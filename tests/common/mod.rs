//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scope_watch::config::{AnubisConfig, FailurePolicy, HackerOneConfig, HttpConfig};
use scope_watch::error::{CollectError, DeliveryError, FetchError};
use scope_watch::notify::{Subscription, Transport};
use scope_watch::sources::InventorySource;
use scope_watch::sync::{Collector, CollectorSettings, HttpClient};

/// Create an HTTP client with a short timeout
pub fn create_test_client() -> HttpClient {
    HttpClient::new(&HttpConfig { timeout_secs: 5 }).expect("Failed to build HTTP client")
}

/// HackerOne settings pointing at `server`
pub fn hackerone_config(server: &MockServer) -> HackerOneConfig {
    HackerOneConfig {
        username: "hunter".to_string(),
        token: "secret".to_string(),
        base_url: format!("{}/v1/hackers/", server.uri()),
        page_size: 100,
    }
}

/// Anubis settings pointing at `server`
pub fn anubis_config(server: &MockServer) -> AnubisConfig {
    AnubisConfig {
        base_url: format!("{}/anubis/subdomains/", server.uri()),
        user_agent: "scope-watch-test".to_string(),
    }
}

/// Collector without rate limiting
pub fn create_test_collector(max_workers: usize, policy: FailurePolicy) -> Collector {
    Collector::new(CollectorSettings {
        max_workers,
        request_interval: Duration::ZERO,
        burst: 1,
        fetch_timeout: Duration::from_secs(5),
        policy,
    })
}

/// Mount a one-page program listing followed by an empty page
pub async fn mount_programs(server: &MockServer, handles: &[&str]) {
    let data: Vec<_> = handles
        .iter()
        .map(|h| json!({"type": "program", "attributes": {"handle": h}}))
        .collect();

    Mock::given(method("GET"))
        .and(path("/v1/hackers/programs"))
        .and(query_param("page[number]", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/hackers/programs"))
        .and(query_param("page[number]", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(server)
        .await;
}

/// Mount the structured scope of one program; every asset is bounty eligible
pub async fn mount_scope(server: &MockServer, handle: &str, assets: &[(&str, &str)]) {
    let data: Vec<_> = assets
        .iter()
        .map(|(asset_type, identifier)| {
            json!({"attributes": {
                "asset_type": asset_type,
                "asset_identifier": identifier,
                "eligible_for_bounty": true
            }})
        })
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/v1/hackers/programs/{}/structured_scopes", handle)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
        .mount(server)
        .await;
}

/// Mount the Anubis answer for one domain
pub async fn mount_subdomains(server: &MockServer, domain: &str, subdomains: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/anubis/subdomains/{}", domain)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(subdomains)))
        .mount(server)
        .await;
}

/// Read every message that arrives within a short quiet period
pub async fn drain(subscription: &mut Subscription) -> Vec<String> {
    let mut texts = Vec::new();
    while let Ok(Some(text)) =
        tokio::time::timeout(Duration::from_millis(100), subscription.recv()).await
    {
        texts.push(text);
    }
    texts
}

/// Single-partition source whose items can be replaced between cycles
pub struct StaticSource {
    items: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn new(items: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items.iter().map(|s| s.to_string()).collect()),
        })
    }

    pub async fn set(&self, items: &[&str]) {
        *self.items.lock().await = items.iter().map(|s| s.to_string()).collect();
    }
}

#[async_trait]
impl InventorySource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn partitions(&self) -> Result<Vec<String>, CollectError> {
        Ok(vec!["all".to_string()])
    }

    async fn fetch(&self, _partition: &str) -> Result<Vec<String>, FetchError> {
        Ok(self.items.lock().await.clone())
    }
}

/// Transport recording delivered texts, failing the first `failures` calls
#[derive(Default)]
pub struct RecordingTransport {
    pub delivered: Mutex<Vec<String>>,
    pub calls: Mutex<u32>,
    pub failures: u32,
}

impl RecordingTransport {
    pub fn failing(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            ..Self::default()
        })
    }

    pub async fn delivered_sorted(&self) -> Vec<String> {
        let mut texts = self.delivered.lock().await.clone();
        texts.sort();
        texts
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        let mut calls = self.calls.lock().await;
        *calls += 1;
        if *calls <= self.failures {
            return Err(DeliveryError::Api {
                status: 502,
                body: "Bad Gateway".to_string(),
            });
        }
        self.delivered.lock().await.push(text.to_string());
        Ok(())
    }
}
