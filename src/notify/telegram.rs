//! Telegram Bot API transport
//!
//! `POST {api_base}/bot{token}/sendMessage` with `{"chat_id", "text"}`.
//! Anything but a 200 is a delivery failure carrying the status and body.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::error::DeliveryError;
use crate::sync::HttpClient;

use super::consumer::Transport;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Delivers messages to one Telegram chat
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    config: TelegramConfig,
    client: HttpClient,
}

impl TelegramTransport {
    /// Create a transport for the configured bot and chat
    pub fn new(config: TelegramConfig, client: HttpClient) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        let payload = SendMessage {
            chat_id: &self.config.chat_id,
            text,
        };

        let response = self
            .client
            .post(&self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            debug!(chat_id = %self.config.chat_id, "Telegram message sent");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> TelegramTransport {
        TelegramTransport::new(
            TelegramConfig {
                bot_token: "123:abc".to_string(),
                chat_id: "-100200".to_string(),
                api_base: server.uri(),
            },
            HttpClient::new(&HttpConfig { timeout_secs: 5 }).unwrap(),
        )
    }

    // Test 1: Message is posted to the bot endpoint as JSON
    #[tokio::test]
    async fn test_deliver_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(json!({"chat_id": "-100200", "text": "Added: [a.com]"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        transport(&server).deliver("Added: [a.com]").await.unwrap();
    }

    // Test 2: Non-200 responses carry status and body
    #[tokio::test]
    async fn test_deliver_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string(r#"{"ok":false,"error_code":429}"#),
            )
            .mount(&server)
            .await;

        let err = transport(&server).deliver("hello").await.unwrap_err();

        assert_eq!(
            err,
            DeliveryError::Api {
                status: 429,
                body: r#"{"ok":false,"error_code":429}"#.to_string(),
            }
        );
    }

    // Test 3: Endpoint layout
    #[test]
    fn test_endpoint() {
        let transport = TelegramTransport::new(
            TelegramConfig {
                bot_token: "T".to_string(),
                chat_id: "C".to_string(),
                api_base: "https://api.telegram.org/".to_string(),
            },
            HttpClient::new(&HttpConfig::default()).unwrap(),
        );

        assert_eq!(transport.endpoint(), "https://api.telegram.org/botT/sendMessage");
    }
}
