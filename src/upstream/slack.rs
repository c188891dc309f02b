//! Slack Web API client (bot token)

use super::{read_json, Service, UpstreamError};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Upper bound accepted by `conversations.list` / `users.conversations`
pub const MAX_CHANNEL_PAGE: u32 = 200;
/// Upper bound accepted by `conversations.history` / `conversations.replies`
pub const MAX_MESSAGE_PAGE: u32 = 100;

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn list_channels(&self, limit: u32, cursor: Option<&str>) -> Result<Value, UpstreamError>;

    async fn user_conversations(
        &self,
        user_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Value, UpstreamError>;

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<Value, UpstreamError>;

    async fn channel_history(
        &self,
        channel_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Value, UpstreamError>;

    async fn thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Value, UpstreamError>;
}

/// Resolve a channel name (with or without a leading `#`) to its id by
/// scanning the first page of public channels.
pub async fn resolve_channel_id(api: &dyn SlackApi, name: &str) -> Result<String, UpstreamError> {
    let wanted = name.strip_prefix('#').unwrap_or(name);
    let listing = api.list_channels(MAX_CHANNEL_PAGE, None).await?;

    listing
        .get("channels")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|ch| {
            ch.get("name").and_then(Value::as_str) == Some(wanted)
                || ch.get("name_normalized").and_then(Value::as_str) == Some(wanted)
        })
        .and_then(|ch| ch.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| UpstreamError::api(Service::Slack, format!("channel not found: {}", name)))
}

pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    team_id: Option<String>,
}

impl SlackClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        bot_token: &str,
        team_id: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            team_id,
        }
    }

    fn channel_params(&self, limit: u32, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("types", "public_channel".to_string()),
            ("exclude_archived", "true".to_string()),
            ("limit", limit.min(MAX_CHANNEL_PAGE).to_string()),
        ];
        if let Some(ref team) = self.team_id {
            params.push(("team_id", team.clone()));
        }
        if let Some(c) = cursor {
            params.push(("cursor", c.to_string()));
        }
        params
    }

    async fn get(&self, method: &str, params: &[(&str, String)]) -> Result<Value, UpstreamError> {
        let url = format!("{}/{}", self.base_url, method);
        debug!(url = %url, "Slack request");
        let request = self.http.get(&url).query(params);
        self.send(request).await
    }

    /// Slack reports failures as `200 {"ok": false, "error": "..."}`
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, UpstreamError> {
        let response = request
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(Service::Slack, e))?;
        let body = read_json(Service::Slack, response).await?;
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let code = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(UpstreamError::api(Service::Slack, code));
        }
        Ok(body)
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn list_channels(&self, limit: u32, cursor: Option<&str>) -> Result<Value, UpstreamError> {
        self.get("conversations.list", &self.channel_params(limit, cursor))
            .await
    }

    async fn user_conversations(
        &self,
        user_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let mut params = self.channel_params(limit, cursor);
        params.push(("user", user_id.to_string()));
        self.get("users.conversations", &params).await
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<Value, UpstreamError> {
        let url = format!("{}/chat.postMessage", self.base_url);
        debug!(url = %url, channel = %channel_id, "Slack post");
        let request = self
            .http
            .post(&url)
            .json(&json!({"channel": channel_id, "text": text}));
        self.send(request).await
    }

    async fn channel_history(
        &self,
        channel_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("limit", limit.min(MAX_MESSAGE_PAGE).to_string()),
        ];
        if let Some(c) = cursor {
            params.push(("cursor", c.to_string()));
        }
        self.get("conversations.history", &params).await
    }

    async fn thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Value, UpstreamError> {
        let params = [
            ("channel", channel_id.to_string()),
            ("ts", thread_ts.to_string()),
            ("limit", limit.min(MAX_MESSAGE_PAGE).to_string()),
        ];
        self.get("conversations.replies", &params).await
    }
}
