use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Fire-and-forget operator notifications over a Discord-compatible webhook.
///
/// Delivery failures are logged and swallowed; a dead webhook must never
/// stall or kill the trading loop.
#[derive(Clone)]
pub struct Notifier {
    client: Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    /// Notifier that drops every message (tests, webhook-less runs)
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Post `message` to the webhook; errors are logged, never returned
    pub async fn send(&self, message: &str) {
        let Some(url) = &self.webhook_url else {
            return;
        };

        let payload = json!({ "content": message });
        let result = self
            .client
            .post(url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!("Webhook delivery failed: HTTP {}", response.status());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Webhook delivery failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_send_posts_content_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::JsonString(
                r#"{"content":"BUY | KRW-ETH | volume: 1.9"}"#.to_string(),
            ))
            .with_status(204)
            .create_async()
            .await;

        let notifier = Notifier::new(Some(format!("{}/hook", server.url())));
        notifier.send("BUY | KRW-ETH | volume: 1.9").await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_delivery_is_swallowed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let notifier = Notifier::new(Some(format!("{}/hook", server.url())));
        notifier.send("anything").await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_disabled_notifier_posts_nothing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/hook").expect(0).create_async().await;

        let notifier = Notifier::disabled();
        notifier.send("dropped").await;

        mock.assert_async().await;
    }
}
