//! Test helper factories and canned upstream fakes
//!
//! [`Canned`] implements every upstream trait from a table of prepared
//! responses and records each call, so handlers and reports can be tested
//! without a network.
#![allow(dead_code)]

use crate::mcp::handlers::ToolHandler;
use crate::upstream::{
    CalendarApi, CommitQuery, EventQuery, GitHubApi, Integrations, IssueQuery, JiraApi,
    JiraSearch, PullQuery, SearchQuery, Service, SlackApi, UpstreamError,
};
use crate::Config;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// Config
// ============================================================================

/// Config with no credentials and unroutable URLs
pub fn test_config() -> Config {
    Config {
        server_port: 0,
        upstream_timeout_secs: 5,
        github_token: None,
        github_api_url: "http://127.0.0.1:9".to_string(),
        jira_base_url: None,
        jira_email: None,
        jira_api_token: None,
        slack_bot_token: None,
        slack_team_id: None,
        slack_api_url: "http://127.0.0.1:9".to_string(),
        google_client_id: None,
        google_client_secret: None,
        google_refresh_token: None,
        google_token_url: "http://127.0.0.1:9/token".to_string(),
        google_calendar_api_url: "http://127.0.0.1:9".to_string(),
    }
}

// ============================================================================
// Canned upstream
// ============================================================================

#[derive(Clone)]
enum Reply {
    Ok(Value),
    Status(u16),
    Api(String),
    Panic(String),
}

/// Prepared responses keyed by `"method"`, `"method:key"` (exact key) or
/// `"method~needle"` (key contains needle). Most specific wins.
pub struct Canned {
    service: Service,
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
}

impl Canned {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            replies: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, route: &str, value: Value) -> Self {
        self.replies.insert(route.to_string(), Reply::Ok(value));
        self
    }

    pub fn failing(mut self, route: &str, status: u16) -> Self {
        self.replies.insert(route.to_string(), Reply::Status(status));
        self
    }

    pub fn api_error(mut self, route: &str, message: &str) -> Self {
        self.replies
            .insert(route.to_string(), Reply::Api(message.to_string()));
        self
    }

    /// The handler behind `route` panics with `message`
    pub fn panicking(mut self, route: &str, message: &str) -> Self {
        self.replies
            .insert(route.to_string(), Reply::Panic(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn reply(&self, method: &str, key: &str, recorded: String) -> Result<Value, UpstreamError> {
        self.calls.lock().unwrap().push(recorded);

        let exact = self.replies.get(&format!("{}:{}", method, key));
        let contains = || {
            let prefix = format!("{}~", method);
            self.replies
                .iter()
                .find(|(route, _)| {
                    route
                        .strip_prefix(&prefix)
                        .is_some_and(|needle| key.contains(needle))
                })
                .map(|(_, reply)| reply)
        };
        let reply = exact
            .or_else(contains)
            .or_else(|| self.replies.get(method))
            .cloned();

        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Status(status)) => Err(UpstreamError::Status {
                service: self.service,
                status,
                body: "{\"message\":\"canned failure\"}".to_string(),
            }),
            Some(Reply::Api(message)) => Err(UpstreamError::api(self.service, message)),
            Some(Reply::Panic(message)) => panic!("{}", message),
            None => Err(UpstreamError::Status {
                service: self.service,
                status: 404,
                body: format!("no canned reply for {}:{}", method, key),
            }),
        }
    }
}

#[async_trait]
impl GitHubApi for Canned {
    async fn repository(&self, owner: &str, repo: &str) -> Result<Value, UpstreamError> {
        let key = format!("{}/{}", owner, repo);
        self.reply("repository", &key, format!("repository {}", key))
    }

    async fn contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let key = format!("{}/{}", owner, repo);
        let recorded = format!("contents {} path={} ref={}", key, path, reference.unwrap_or(""));
        self.reply("contents", &key, recorded)
    }

    async fn issues(
        &self,
        owner: &str,
        repo: &str,
        query: &IssueQuery,
    ) -> Result<Value, UpstreamError> {
        let key = format!("{}/{}", owner, repo);
        let recorded = format!("issues {} state={} per_page={}", key, query.state, query.per_page);
        self.reply("issues", &key, recorded)
    }

    async fn commits(
        &self,
        owner: &str,
        repo: &str,
        query: &CommitQuery,
    ) -> Result<Value, UpstreamError> {
        let key = format!("{}/{}", owner, repo);
        let recorded = format!(
            "commits {} per_page={} path={:?} since={:?} until={:?}",
            key, query.per_page, query.path, query.since, query.until
        );
        self.reply("commits", &key, recorded)
    }

    async fn pulls(
        &self,
        owner: &str,
        repo: &str,
        query: &PullQuery,
    ) -> Result<Value, UpstreamError> {
        let key = format!("{}/{}", owner, repo);
        let recorded = format!(
            "pulls {} state={} sort={} direction={} per_page={} since={:?}",
            key, query.state, query.sort, query.direction, query.per_page, query.since
        );
        self.reply("pulls", &key, recorded)
    }

    async fn search_issues(&self, query: &SearchQuery) -> Result<Value, UpstreamError> {
        let recorded = format!(
            "search_issues q={} sort={} order={} per_page={}",
            query.q, query.sort, query.order, query.per_page
        );
        self.reply("search_issues", &query.q, recorded)
    }

    async fn authenticated_user(&self) -> Result<Value, UpstreamError> {
        self.reply("user", "", "user".to_string())
    }
}

#[async_trait]
impl JiraApi for Canned {
    async fn project(&self, key: &str) -> Result<Value, UpstreamError> {
        self.reply("project", key, format!("project {}", key))
    }

    async fn issue(&self, key: &str) -> Result<Value, UpstreamError> {
        self.reply("issue", key, format!("issue {}", key))
    }

    async fn search(&self, search: &JiraSearch) -> Result<Value, UpstreamError> {
        let recorded = format!(
            "search jql={} startAt={} maxResults={} fields={:?}",
            search.jql, search.start_at, search.max_results, search.fields
        );
        self.reply("search", &search.jql, recorded)
    }
}

#[async_trait]
impl SlackApi for Canned {
    async fn list_channels(&self, limit: u32, cursor: Option<&str>) -> Result<Value, UpstreamError> {
        self.reply(
            "list_channels",
            cursor.unwrap_or(""),
            format!("list_channels limit={} cursor={:?}", limit, cursor),
        )
    }

    async fn user_conversations(
        &self,
        user_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        self.reply(
            "user_conversations",
            user_id,
            format!("user_conversations {} limit={} cursor={:?}", user_id, limit, cursor),
        )
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<Value, UpstreamError> {
        self.reply(
            "post_message",
            channel_id,
            format!("post_message {} text={}", channel_id, text),
        )
    }

    async fn channel_history(
        &self,
        channel_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        self.reply(
            "channel_history",
            channel_id,
            format!("channel_history {} limit={} cursor={:?}", channel_id, limit, cursor),
        )
    }

    async fn thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Value, UpstreamError> {
        self.reply(
            "thread_replies",
            channel_id,
            format!("thread_replies {} ts={} limit={}", channel_id, thread_ts, limit),
        )
    }
}

#[async_trait]
impl CalendarApi for Canned {
    async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
    ) -> Result<Value, UpstreamError> {
        self.reply(
            "list_events",
            calendar_id,
            format!("list_events {} {:?}", calendar_id, query),
        )
    }

    async fn insert_event(&self, calendar_id: &str, event: &Value) -> Result<Value, UpstreamError> {
        self.reply(
            "insert_event",
            calendar_id,
            format!("insert_event {} {}", calendar_id, event),
        )
    }
}

// ============================================================================
// Handler builders
// ============================================================================

/// Integrations bundle with the given fakes plugged in
pub fn integrations(
    github: Option<Arc<Canned>>,
    jira: Option<Arc<Canned>>,
    slack: Option<Arc<Canned>>,
    calendar: Option<Arc<Canned>>,
) -> Integrations {
    Integrations {
        github: github.map(|g| g as Arc<dyn GitHubApi>),
        jira: jira.map(|j| j as Arc<dyn JiraApi>),
        slack: slack.map(|s| s as Arc<dyn SlackApi>),
        calendar: calendar.map(|c| c as Arc<dyn CalendarApi>),
    }
}

/// ToolHandler with no integrations configured
pub fn bare_handler() -> ToolHandler {
    ToolHandler::new(Integrations::default())
}
