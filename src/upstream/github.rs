//! GitHub REST v3 client

use super::{read_json, Service, UpstreamError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const MEDIA_TYPE: &str = "application/vnd.github.v3+json";
const AGENT: &str = concat!("devlink-mcp/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq)]
pub struct IssueQuery {
    pub state: String,
    pub per_page: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitQuery {
    pub path: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub per_page: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullQuery {
    pub state: String,
    pub sort: String,
    pub direction: String,
    pub per_page: u32,
    pub since: Option<String>,
}

/// `GET /search/issues`
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub q: String,
    pub sort: String,
    pub order: String,
    pub per_page: u32,
}

#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn repository(&self, owner: &str, repo: &str) -> Result<Value, UpstreamError>;

    async fn contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Value, UpstreamError>;

    async fn issues(&self, owner: &str, repo: &str, query: &IssueQuery)
        -> Result<Value, UpstreamError>;

    async fn commits(
        &self,
        owner: &str,
        repo: &str,
        query: &CommitQuery,
    ) -> Result<Value, UpstreamError>;

    async fn pulls(&self, owner: &str, repo: &str, query: &PullQuery)
        -> Result<Value, UpstreamError>;

    async fn search_issues(&self, query: &SearchQuery) -> Result<Value, UpstreamError>;

    async fn authenticated_user(&self) -> Result<Value, UpstreamError>;
}

pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn repo_path(owner: &str, repo: &str) -> String {
        format!(
            "/repos/{}/{}",
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        )
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, ?query, "GitHub request");

        let mut request = self
            .http
            .get(&url)
            .header(ACCEPT, MEDIA_TYPE)
            .header(USER_AGENT, AGENT)
            .query(query);
        if let Some(ref token) = self.token {
            request = request.header(AUTHORIZATION, format!("token {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::transport(Service::GitHub, e))?;
        read_json(Service::GitHub, response).await
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn repository(&self, owner: &str, repo: &str) -> Result<Value, UpstreamError> {
        self.get(&Self::repo_path(owner, repo), &[]).await
    }

    async fn contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        let url = format!(
            "{}/contents/{}",
            Self::repo_path(owner, repo),
            encoded.join("/")
        );
        let mut query = Vec::new();
        if let Some(r) = reference.filter(|r| !r.is_empty()) {
            query.push(("ref", r.to_string()));
        }
        self.get(&url, &query).await
    }

    async fn issues(
        &self,
        owner: &str,
        repo: &str,
        query: &IssueQuery,
    ) -> Result<Value, UpstreamError> {
        let path = format!("{}/issues", Self::repo_path(owner, repo));
        self.get(
            &path,
            &[
                ("state", query.state.clone()),
                ("per_page", query.per_page.to_string()),
            ],
        )
        .await
    }

    async fn commits(
        &self,
        owner: &str,
        repo: &str,
        query: &CommitQuery,
    ) -> Result<Value, UpstreamError> {
        let path = format!("{}/commits", Self::repo_path(owner, repo));
        let mut params = vec![("per_page", query.per_page.to_string())];
        if let Some(ref p) = query.path {
            params.push(("path", p.clone()));
        }
        if let Some(ref since) = query.since {
            params.push(("since", since.clone()));
        }
        if let Some(ref until) = query.until {
            params.push(("until", until.clone()));
        }
        self.get(&path, &params).await
    }

    async fn pulls(
        &self,
        owner: &str,
        repo: &str,
        query: &PullQuery,
    ) -> Result<Value, UpstreamError> {
        let path = format!("{}/pulls", Self::repo_path(owner, repo));
        let mut params = vec![
            ("state", query.state.clone()),
            ("sort", query.sort.clone()),
            ("direction", query.direction.clone()),
            ("per_page", query.per_page.to_string()),
        ];
        if let Some(ref since) = query.since {
            params.push(("since", since.clone()));
        }
        self.get(&path, &params).await
    }

    async fn search_issues(&self, query: &SearchQuery) -> Result<Value, UpstreamError> {
        self.get(
            "/search/issues",
            &[
                ("q", query.q.clone()),
                ("sort", query.sort.clone()),
                ("order", query.order.clone()),
                ("per_page", query.per_page.to_string()),
            ],
        )
        .await
    }

    async fn authenticated_user(&self) -> Result<Value, UpstreamError> {
        self.get("/user", &[]).await
    }
}
