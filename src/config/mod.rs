//! Configuration management for scope-watch
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables. The resulting [`Config`] is built
//! once at process entry and handed to each component's constructor.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Redis connection and snapshot retention
    #[serde(default)]
    pub redis: RedisConfig,

    /// HackerOne catalog credentials
    #[serde(default)]
    pub hackerone: HackerOneConfig,

    /// Anubis subdomain catalog
    #[serde(default)]
    pub anubis: AnubisConfig,

    /// Telegram bot transport
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Shared HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Worker pool collector settings
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Fanout and consumer settings
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Watcher definitions
    #[serde(default)]
    pub watchers: WatchersConfig,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix SCOPE_WATCH_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(url) = std::env::var("SCOPE_WATCH_REDIS_URL") {
            config.redis.url = url;
        }

        if let Ok(username) = std::env::var("SCOPE_WATCH_HACKERONE_USERNAME") {
            config.hackerone.username = username;
        }
        if let Ok(token) = std::env::var("SCOPE_WATCH_HACKERONE_TOKEN") {
            config.hackerone.token = token;
        }

        if let Ok(token) = std::env::var("SCOPE_WATCH_TELEGRAM_BOT_TOKEN") {
            config.telegram.bot_token = token;
        }
        if let Ok(chat_id) = std::env::var("SCOPE_WATCH_TELEGRAM_CHAT_ID") {
            config.telegram.chat_id = chat_id;
        }

        if let Ok(workers) = std::env::var("SCOPE_WATCH_COLLECTOR_MAX_WORKERS") {
            config.collector.max_workers = workers
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid worker count".to_string()))?;
        }

        if let Ok(policy) = std::env::var("SCOPE_WATCH_COLLECTOR_POLICY") {
            config.collector.policy = policy.parse()?;
        }
        if let Ok(policy) = std::env::var("SCOPE_WATCH_SUBDOMAINS_POLICY") {
            config.watchers.subdomains.policy = policy.parse()?;
        }

        if let Ok(level) = std::env::var("SCOPE_WATCH_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("SCOPE_WATCH_LOG_FORMAT") {
            config.logging.format = format;
        }

        if let Ok(enabled) = std::env::var("SCOPE_WATCH_OTEL_ENABLED") {
            config.otel.enabled = enabled.parse().unwrap_or(false);
        }
        if let Ok(endpoint) = std::env::var("SCOPE_WATCH_OTEL_ENDPOINT") {
            config.otel.endpoint = Some(endpoint);
        }

        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collector.max_workers == 0 {
            return Err(ConfigError::InvalidValue(
                "collector.max_workers must be at least 1".to_string(),
            ));
        }
        if self.watchers.subdomains.max_workers == 0 {
            return Err(ConfigError::InvalidValue(
                "watchers.subdomains.max_workers must be at least 1".to_string(),
            ));
        }
        if self.collector.burst == 0 {
            return Err(ConfigError::InvalidValue(
                "collector.burst must be at least 1".to_string(),
            ));
        }
        if let FailurePolicy::MaxErrorRate(threshold) = self.collector.policy {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidValue(format!(
                    "collector.policy max_error_rate must be within [0, 1], got {}",
                    threshold
                )));
            }
        }
        if let FailurePolicy::MaxErrorRate(threshold) = self.watchers.subdomains.policy {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidValue(format!(
                    "watchers.subdomains.policy max_error_rate must be within [0, 1], got {}",
                    threshold
                )));
            }
        }
        if self.notifications.chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "notifications.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.notifications.max_in_flight == 0 {
            return Err(ConfigError::InvalidValue(
                "notifications.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.notifications.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "notifications.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.watchers.scope.enabled && self.hackerone.username.is_empty() {
            return Err(ConfigError::MissingRequired(
                "hackerone.username".to_string(),
            ));
        }
        Ok(())
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Retention for persisted snapshots (seconds)
    #[serde(default = "default_snapshot_ttl")]
    pub snapshot_ttl_secs: u64,
}

impl RedisConfig {
    /// Snapshot retention as a Duration
    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            snapshot_ttl_secs: default_snapshot_ttl(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_snapshot_ttl() -> u64 {
    7 * 24 * 3600 // 7 days
}

/// HackerOne API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HackerOneConfig {
    /// API username
    #[serde(default)]
    pub username: String,

    /// API token
    #[serde(default)]
    pub token: String,

    /// Hacker API base URL (with trailing slash)
    #[serde(default = "default_hackerone_base_url")]
    pub base_url: String,

    /// Programs per listing page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for HackerOneConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            token: String::new(),
            base_url: default_hackerone_base_url(),
            page_size: default_page_size(),
        }
    }
}

fn default_hackerone_base_url() -> String {
    "https://api.hackerone.com/v1/hackers/".to_string()
}

fn default_page_size() -> u32 {
    100
}

/// Anubis API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnubisConfig {
    /// Subdomain endpoint base URL (with trailing slash)
    #[serde(default = "default_anubis_base_url")]
    pub base_url: String,

    /// User-Agent header sent with each query
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for AnubisConfig {
    fn default() -> Self {
        Self {
            base_url: default_anubis_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_anubis_base_url() -> String {
    "https://anubisdb.com/anubis/subdomains/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; SecurityScanner/1.0)".to_string()
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelegramConfig {
    /// Bot token
    #[serde(default)]
    pub bot_token: String,

    /// Destination chat
    #[serde(default)]
    pub chat_id: String,

    /// Bot API base URL
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_telegram_api_base(),
        }
    }
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}

/// What the collector does when some partitions fail
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failed partition fails the whole collection
    #[default]
    FailFast,
    /// Failed partitions are reported, successful ones are kept
    BestEffort,
    /// Fail only when the failed fraction exceeds the threshold
    MaxErrorRate(f64),
}

impl std::str::FromStr for FailurePolicy {
    type Err = ConfigError;

    /// Parse `fail_fast`, `best_effort` or `max_error_rate:<f64>`
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "fail_fast" => Ok(FailurePolicy::FailFast),
            "best_effort" => Ok(FailurePolicy::BestEffort),
            other => other
                .strip_prefix("max_error_rate:")
                .and_then(|threshold| threshold.trim().parse().ok())
                .map(FailurePolicy::MaxErrorRate)
                .ok_or_else(|| ConfigError::Parse(format!("Invalid failure policy: {}", other))),
        }
    }
}

/// Worker pool collector configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectorConfig {
    /// Upper bound on concurrent workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Minimum interval between calls made by one worker (milliseconds)
    #[serde(default = "default_request_interval")]
    pub request_interval_ms: u64,

    /// Calls a worker may make back to back before throttling
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Deadline for a single partition fetch (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Partial-failure policy
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub policy: FailurePolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            request_interval_ms: default_request_interval(),
            burst: default_burst(),
            fetch_timeout_secs: default_fetch_timeout(),
            policy: FailurePolicy::default(),
        }
    }
}

fn default_max_workers() -> usize {
    10
}

fn default_request_interval() -> u64 {
    1000
}

fn default_burst() -> u32 {
    1
}

fn default_fetch_timeout() -> u64 {
    60
}

/// Delivery retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per message, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt (milliseconds)
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound on any single delay (milliseconds)
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Whether to add jitter to backoff
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Notification fanout and consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationConfig {
    /// Pub/sub channel name
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Items per chunked message
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Delay between chunk publications (milliseconds)
    #[serde(default = "default_chunk_delay")]
    pub chunk_delay_ms: u64,

    /// Maximum concurrent delivery tasks
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Delivery retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay(),
            max_in_flight: default_max_in_flight(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_channel() -> String {
    "telegram_notifications".to_string()
}

fn default_chunk_size() -> usize {
    30
}

fn default_chunk_delay() -> u64 {
    3100
}

fn default_max_in_flight() -> usize {
    8
}

/// Watcher definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WatchersConfig {
    /// In-scope URL watcher (HackerOne structured scopes)
    #[serde(default)]
    pub scope: ScopeWatcherConfig,

    /// Subdomain watcher (Anubis)
    #[serde(default)]
    pub subdomains: SubdomainWatcherConfig,
}

/// URL-scope watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScopeWatcherConfig {
    /// Whether this watcher runs
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Snapshot key
    #[serde(default = "default_scope_key")]
    pub key: String,

    /// Cycle period in seconds
    #[serde(default = "default_scope_interval")]
    pub interval_secs: u64,
}

impl Default for ScopeWatcherConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            key: default_scope_key(),
            interval_secs: default_scope_interval(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_scope_key() -> String {
    "hackerone:previous_urls".to_string()
}

fn default_scope_interval() -> u64 {
    300 // 5 minutes
}

/// Subdomain watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubdomainWatcherConfig {
    /// Whether this watcher runs
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Snapshot key
    #[serde(default = "default_subdomain_key")]
    pub key: String,

    /// Cycle period in seconds
    #[serde(default = "default_subdomain_interval")]
    pub interval_secs: u64,

    /// Minimum interval between Anubis queries per worker (milliseconds)
    #[serde(default = "default_subdomain_request_interval")]
    pub request_interval_ms: u64,

    /// Concurrent Anubis workers
    #[serde(default = "default_subdomain_workers")]
    pub max_workers: usize,

    /// Partial-failure policy for Anubis queries
    #[serde(
        default = "default_subdomain_policy",
        with = "serde_yaml::with::singleton_map"
    )]
    pub policy: FailurePolicy,

    /// Whether removed subdomains are sent as chunked lists too
    #[serde(default)]
    pub announce_removed: bool,
}

impl Default for SubdomainWatcherConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            key: default_subdomain_key(),
            interval_secs: default_subdomain_interval(),
            request_interval_ms: default_subdomain_request_interval(),
            max_workers: default_subdomain_workers(),
            policy: default_subdomain_policy(),
            announce_removed: false,
        }
    }
}

fn default_subdomain_key() -> String {
    "anubis:previous_subdomains".to_string()
}

fn default_subdomain_interval() -> u64 {
    3600 // 60 minutes
}

fn default_subdomain_request_interval() -> u64 {
    500
}

fn default_subdomain_workers() -> usize {
    1
}

fn default_subdomain_policy() -> FailurePolicy {
    FailurePolicy::BestEffort
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerSettings {
    /// Delay before the first cycle (seconds)
    #[serde(default)]
    pub initial_delay_secs: u64,

    /// Upper bound on one whole cycle (seconds)
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: 0,
            cycle_timeout_secs: default_cycle_timeout(),
        }
    }
}

fn default_cycle_timeout() -> u64 {
    1800
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OpenTelemetry is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "scope-watch".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format ("json" or "pretty")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
