//! JIRA Cloud REST v3 client (basic auth with email + API token)

use super::{read_json, Service, UpstreamError};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Body of `POST /rest/api/3/search`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraSearch {
    pub jql: String,
    pub start_at: u32,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl JiraSearch {
    pub fn new(jql: impl Into<String>, max_results: u32) -> Self {
        Self {
            jql: jql.into(),
            start_at: 0,
            max_results,
            fields: None,
        }
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }
}

#[async_trait]
pub trait JiraApi: Send + Sync {
    async fn project(&self, key: &str) -> Result<Value, UpstreamError>;
    async fn issue(&self, key: &str) -> Result<Value, UpstreamError>;
    async fn search(&self, search: &JiraSearch) -> Result<Value, UpstreamError>;
}

pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl JiraClient {
    pub fn new(http: reqwest::Client, base_url: &str, email: &str, api_token: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            api_token: api_token.to_string(),
        }
    }

    /// `<base>/rest/api/3/<path>`
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/rest/api/3/{}",
            self.base_url,
            path.trim_start_matches('/')
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, UpstreamError> {
        let response = request
            .basic_auth(&self.email, Some(&self.api_token))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| UpstreamError::transport(Service::Jira, e))?;
        read_json(Service::Jira, response).await
    }
}

#[async_trait]
impl JiraApi for JiraClient {
    async fn project(&self, key: &str) -> Result<Value, UpstreamError> {
        let url = self.api_url(&format!("project/{}", urlencoding::encode(key)));
        debug!(url = %url, "JIRA request");
        self.send(self.http.get(&url)).await
    }

    async fn issue(&self, key: &str) -> Result<Value, UpstreamError> {
        let url = self.api_url(&format!("issue/{}", urlencoding::encode(key)));
        debug!(url = %url, "JIRA request");
        self.send(self.http.get(&url)).await
    }

    async fn search(&self, search: &JiraSearch) -> Result<Value, UpstreamError> {
        let url = self.api_url("search");
        debug!(url = %url, jql = %search.jql, "JIRA search");
        self.send(self.http.post(&url).json(search)).await
    }
}
