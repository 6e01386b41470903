use super::Notifier;
use crate::config::SlackConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::RwLock;

type SlackRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    channels: Vec<SlackChannel>,
}

#[derive(Debug, Deserialize)]
struct SlackChannel {
    id: String,
    name: String,
}

/// Slack Web API notifier
///
/// Channels are given by name. The first message to a channel looks up its id
/// among the public channels and joins it; the id is cached afterwards.
#[derive(Clone)]
pub struct SlackNotifier {
    client: Client,
    api_url: String,
    token: Option<String>,
    default_channel: Option<String>,
    channel_ids: Arc<RwLock<HashMap<String, String>>>,
    rate_limiter: Arc<SlackRateLimiter>,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;

        let per_minute = NonZeroU32::new(config.messages_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
            default_channel: config.channel.clone(),
            channel_ids: Arc::new(RwLock::new(HashMap::new())),
            rate_limiter,
        })
    }

    async fn send(&self, method: &str, request: RequestBuilder) -> Result<SlackResponse> {
        self.rate_limiter.until_ready().await;

        let response: SlackResponse = request
            .send()
            .await
            .with_context(|| format!("Slack {} request failed", method))?
            .json()
            .await
            .with_context(|| format!("Failed to parse Slack {} response", method))?;

        if !response.ok {
            anyhow::bail!(
                "Slack {} returned error: {}",
                method,
                response.error.as_deref().unwrap_or("unknown")
            );
        }

        Ok(response)
    }

    /// Read method: arguments go in the query string
    async fn get(&self, token: &str, method: &str, query: &[(&str, &str)]) -> Result<SlackResponse> {
        let request = self
            .client
            .get(format!("{}/{}", self.api_url, method))
            .bearer_auth(token)
            .query(query);
        self.send(method, request).await
    }

    /// Write method: arguments go in a JSON body
    async fn post_json(&self, token: &str, method: &str, body: serde_json::Value) -> Result<SlackResponse> {
        let request = self
            .client
            .post(format!("{}/{}", self.api_url, method))
            .bearer_auth(token)
            .json(&body);
        self.send(method, request).await
    }

    /// Find a public channel by name and join it
    async fn channel_id(&self, token: &str, name: &str) -> Result<String> {
        if let Some(id) = self.channel_ids.read().await.get(name) {
            return Ok(id.clone());
        }

        let listing = self
            .get(
                token,
                "conversations.list",
                &[("types", "public_channel"), ("limit", "1000")],
            )
            .await?;

        let id = listing
            .channels
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .with_context(|| format!("Channel {} does not exist", name))?;

        self.post_json(token, "conversations.join", serde_json::json!({ "channel": id }))
            .await?;

        self.channel_ids
            .write()
            .await
            .insert(name.to_string(), id.clone());

        Ok(id)
    }

    async fn post(&self, token: &str, channel: &str, text: &str) -> Result<()> {
        let id = self.channel_id(token, channel).await?;
        self.post_json(
            token,
            "chat.postMessage",
            serde_json::json!({ "channel": id, "text": text }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, strategy: &str, channel: Option<&str>, message: &str) {
        let text = format!("{}: {}", strategy, message);

        let channel = channel.or(self.default_channel.as_deref());
        let (Some(token), Some(channel)) = (self.token.as_deref(), channel) else {
            tracing::info!("No Slack channel configured, logging only: {}", text);
            return;
        };

        if let Err(e) = self.post(token, channel, &text).await {
            tracing::error!("✗ Slack notification to {} failed: {:#}", channel, e);
            tracing::info!("{}", text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn create_test_config(api_url: String, token: Option<&str>) -> SlackConfig {
        SlackConfig {
            token: token.map(str::to_string),
            channel: Some("signals".to_string()),
            api_url,
            messages_per_minute: 600,
        }
    }

    async fn mock_channel_lookup(server: &mut mockito::ServerGuard) -> (mockito::Mock, mockito::Mock) {
        let list = server
            .mock("GET", "/conversations.list")
            .match_header("authorization", "Bearer xoxb-test")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("types".into(), "public_channel".into()),
                Matcher::UrlEncoded("limit".into(), "1000".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "ok": true,
                    "channels": [
                        { "id": "C001", "name": "general" },
                        { "id": "C002", "name": "signals" }
                    ]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let join = server
            .mock("POST", "/conversations.join")
            .match_body(Matcher::PartialJson(json!({ "channel": "C002" })))
            .with_status(200)
            .with_body(json!({ "ok": true }).to_string())
            .expect(1)
            .create_async()
            .await;
        (list, join)
    }

    #[tokio::test]
    async fn test_posts_prefixed_message_and_caches_channel() {
        let mut server = mockito::Server::new_async().await;
        let (list, join) = mock_channel_lookup(&mut server).await;
        let post = server
            .mock("POST", "/chat.postMessage")
            .match_header("authorization", "Bearer xoxb-test")
            .match_body(Matcher::PartialJson(json!({
                "channel": "C002",
                "text": "psar_btc: data is stale"
            })))
            .with_status(200)
            .with_body(json!({ "ok": true }).to_string())
            .expect(2)
            .create_async()
            .await;

        let notifier = SlackNotifier::new(&create_test_config(server.url(), Some("xoxb-test"))).unwrap();
        notifier.notify("psar_btc", None, "data is stale").await;
        notifier.notify("psar_btc", Some("signals"), "data is stale").await;

        list.assert_async().await;
        join.assert_async().await;
        post.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_channel_is_not_posted() {
        let mut server = mockito::Server::new_async().await;
        let _lookup = mock_channel_lookup(&mut server).await;
        let post = server
            .mock("POST", "/chat.postMessage")
            .expect(0)
            .create_async()
            .await;

        let notifier = SlackNotifier::new(&create_test_config(server.url(), Some("xoxb-test"))).unwrap();
        notifier.notify("psar_btc", Some("missing"), "hello").await;

        post.assert_async().await;
    }

    #[tokio::test]
    async fn test_without_token_logs_only() {
        let mut server = mockito::Server::new_async().await;
        let any_post = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let any_get = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let notifier = SlackNotifier::new(&create_test_config(server.url(), None)).unwrap();
        notifier.notify("psar_btc", Some("signals"), "hello").await;

        any_post.assert_async().await;
        any_get.assert_async().await;
    }
}
