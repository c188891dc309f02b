//! MCP Tool handlers
//!
//! [`ToolHandler::call`] is the single entry point for tool execution:
//! look up the descriptor, validate the arguments, decode them into the
//! tool's typed record, run the handler, shape the response.
//!
//! Validation failures surface as [`DispatchError::InvalidParams`]. Every
//! other failure, including a panicking handler, becomes an error envelope.

use super::protocol::ToolCallResult;
use super::tools::find_tool;
use super::validate::{count, validate, ValidatedArgs, ValidationError};
use crate::compact::{
    compact, compact_field, respond, respond_value, CompactOptions, PageRequest, ResourceKind,
};
use crate::reports::{self, DashboardArgs, MappingArgs};
use crate::upstream::slack::resolve_channel_id;
use crate::upstream::{
    CommitQuery, EventQuery, Integrations, IssueQuery, JiraSearch, PullQuery, SearchQuery,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Errors reported at the protocol level instead of inside an envelope
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidParams(#[from] ValidationError),
}

/// `info!` when the caller asked for verbose output, `debug!` otherwise
macro_rules! trace_call {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

/// Handles MCP tool calls
///
/// ```
/// use devlink_mcp::mcp::handlers::ToolHandler;
/// use devlink_mcp::upstream::Integrations;
/// use serde_json::json;
///
/// let handler = ToolHandler::new(Integrations::default());
/// let result = tokio_test::block_on(
///     handler.call("getStringLength", Some(json!({"input": "Hello 👋 World"}))),
/// )
/// .unwrap();
/// assert_eq!(result.text(), "13");
/// assert!(!result.is_error);
/// ```
#[derive(Clone)]
pub struct ToolHandler {
    integrations: Integrations,
}

impl ToolHandler {
    pub fn new(integrations: Integrations) -> Self {
        Self { integrations }
    }

    pub fn integrations(&self) -> &Integrations {
        &self.integrations
    }

    /// Execute one tool call. Every call returns either an envelope or an
    /// `InvalidParams` error; nothing is shared between calls.
    pub async fn call(
        &self,
        name: &str,
        args: Option<Value>,
    ) -> Result<ToolCallResult, DispatchError> {
        let Some(descriptor) = find_tool(name) else {
            warn!(tool = %name, "Unknown tool");
            return Ok(ToolCallResult::error(format!("Unknown tool: {}", name)));
        };

        let args = validate(descriptor, args)?;
        let options = CompactOptions::from_args(args.as_map());
        let span = info_span!("tool_call", tool = %name);
        let started = Instant::now();

        trace_call!(options.verbose, tool = %name, args = ?args.as_map(), "Dispatching");

        let outcome = AssertUnwindSafe(self.dispatch(name, &args, &options))
            .catch_unwind()
            .instrument(span)
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(result)) => {
                trace_call!(
                    options.verbose,
                    tool = %name,
                    elapsed_ms,
                    bytes = result.text().len(),
                    "Tool call completed"
                );
                Ok(result)
            }
            Ok(Err(e)) => match e.downcast::<ValidationError>() {
                Ok(invalid) => Err(DispatchError::InvalidParams(invalid)),
                Err(e) => {
                    warn!(tool = %name, elapsed_ms, error = %format!("{:#}", e), "Tool call failed");
                    Ok(ToolCallResult::error(format!("{:#}", e)))
                }
            },
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(tool = %name, panic = %message, "Tool handler panicked");
                Ok(ToolCallResult::error(format!(
                    "Internal error in {}: {}",
                    name, message
                )))
            }
        }
    }

    async fn dispatch(
        &self,
        name: &str,
        args: &ValidatedArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        match name {
            "getStringLength" => self.string_length(args.decode()?),

            // GitHub
            "getGitHubRepoInfo" => self.repo_info(args.decode()?, options).await,
            "getGitHubRepoContents" => self.repo_contents(args.decode()?, options).await,
            "getGitHubIssues" => self.issues(args.decode()?, options).await,
            "getGitHubCommits" => self.commits(args.decode()?, options).await,
            "getGitHubPullRequests" => self.pull_requests(args.decode()?, options).await,
            "getGitHubUserInfo" => self.user_info(options).await,

            // JIRA
            "getJiraProjectInfo" => self.jira_project(args.decode()?, options).await,
            "getJiraIssue" => self.jira_issue(args.decode()?, options).await,
            "searchJiraIssues" => self.jira_search(args.decode()?, options).await,
            "getJiraProjectIssues" => self.jira_project_issues(args.decode()?, options).await,

            // Reports
            "mapGitHubPrToJiraIssues" => self.map_prs(args.decode()?, options).await,
            "generateDashboardSummary" => {
                self.dashboard(args.decode()?, options, Utc::now()).await
            }

            // Slack
            "slack_list_channels" => self.slack_channels(args.decode()?, options).await,
            "slack_post_message" => self.slack_post(args.decode()?).await,
            "slack_user_conversations" => {
                self.slack_user_conversations(args.decode()?, options).await
            }
            "slack_get_channel_history" => self.slack_history(args.decode()?, options).await,
            "slack_get_thread_replies" => self.slack_replies(args.decode()?, options).await,

            // Google Calendar
            "google_calendar_get_events" => self.calendar_events(args.decode()?, options).await,
            "google_calendar_create_event" => {
                self.calendar_create(args.decode()?, options).await
            }

            // Registered without a handler
            other => Ok(ToolCallResult::error(format!("Unknown tool: {}", other))),
        }
    }

    // ========================================================================
    // String
    // ========================================================================

    fn string_length(&self, args: StringArgs) -> Result<ToolCallResult> {
        Ok(ToolCallResult::success(args.input.chars().count().to_string()))
    }

    // ========================================================================
    // GitHub Handlers
    // ========================================================================

    async fn repo_info(&self, args: RepoArgs, options: &CompactOptions) -> Result<ToolCallResult> {
        let raw = self
            .integrations
            .github()?
            .repository(&args.owner, &args.repo)
            .await?;
        Ok(respond(raw, ResourceKind::Repository, options, None))
    }

    async fn repo_contents(
        &self,
        args: RepoContentsArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let reference = non_empty(&args.reference);
        let raw = self
            .integrations
            .github()?
            .contents(&args.owner, &args.repo, &args.path, reference)
            .await?;
        Ok(respond(raw, ResourceKind::RepoContent, options, None))
    }

    async fn issues(&self, args: IssuesArgs, options: &CompactOptions) -> Result<ToolCallResult> {
        let query = IssueQuery {
            state: args.state,
            per_page: args.per_page,
        };
        let raw = self
            .integrations
            .github()?
            .issues(&args.owner, &args.repo, &query)
            .await?;
        Ok(respond(
            raw,
            ResourceKind::Issue,
            options,
            Some(first_page(args.per_page)),
        ))
    }

    async fn commits(&self, args: CommitsArgs, options: &CompactOptions) -> Result<ToolCallResult> {
        let query = CommitQuery {
            path: non_empty(&args.path).map(str::to_string),
            per_page: args.per_page,
            ..Default::default()
        };
        let raw = self
            .integrations
            .github()?
            .commits(&args.owner, &args.repo, &query)
            .await?;
        Ok(respond(
            raw,
            ResourceKind::Commit,
            options,
            Some(first_page(args.per_page)),
        ))
    }

    /// Date-range filters switch to the search API; otherwise the plain
    /// pulls listing.
    async fn pull_requests(
        &self,
        args: PullRequestsArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let github = self.integrations.github()?;
        let page = Some(first_page(args.per_page));

        let raw = match args.search_query() {
            Some(q) => {
                debug!(q = %q, "Searching pull requests");
                let query = SearchQuery {
                    q,
                    sort: args.sort,
                    order: args.direction,
                    per_page: args.per_page,
                };
                github.search_issues(&query).await?
            }
            None => {
                let query = PullQuery {
                    state: args.state,
                    sort: args.sort,
                    direction: args.direction,
                    per_page: args.per_page,
                    since: args.since,
                };
                github.pulls(&args.owner, &args.repo, &query).await?
            }
        };
        Ok(respond(raw, ResourceKind::PullRequest, options, page))
    }

    async fn user_info(&self, options: &CompactOptions) -> Result<ToolCallResult> {
        let raw = self.integrations.github()?.authenticated_user().await?;
        Ok(respond(raw, ResourceKind::User, options, None))
    }

    // ========================================================================
    // JIRA Handlers
    // ========================================================================

    async fn jira_project(
        &self,
        args: ProjectKeyArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let raw = self.integrations.jira()?.project(&args.project_key).await?;
        Ok(respond(raw, ResourceKind::JiraProject, options, None))
    }

    async fn jira_issue(
        &self,
        args: IssueKeyArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let raw = self.integrations.jira()?.issue(&args.issue_key).await?;
        Ok(respond(raw, ResourceKind::JiraIssue, options, None))
    }

    async fn jira_search(&self, args: JqlArgs, options: &CompactOptions) -> Result<ToolCallResult> {
        let search = JiraSearch {
            jql: args.jql,
            start_at: args.start_at,
            max_results: args.max_results,
            fields: args.fields,
        };
        self.run_search(search, options).await
    }

    async fn jira_project_issues(
        &self,
        args: ProjectIssuesArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let search = JiraSearch {
            jql: args.jql(),
            start_at: args.start_at,
            max_results: args.max_results,
            fields: None,
        };
        self.run_search(search, options).await
    }

    async fn run_search(
        &self,
        search: JiraSearch,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        trace_call!(options.verbose, jql = %search.jql, "JIRA search");
        let page = PageRequest::Offset {
            start_at: search.start_at.into(),
            max_results: search.max_results.into(),
        };
        let raw = self.integrations.jira()?.search(&search).await?;
        Ok(respond(raw, ResourceKind::JiraSearchResult, options, Some(page)))
    }

    // ========================================================================
    // Reports
    // ========================================================================

    async fn map_prs(&self, args: MappingArgs, options: &CompactOptions) -> Result<ToolCallResult> {
        let github = self.integrations.github()?;
        let jira = self.integrations.jira().ok();
        let raw = reports::map_prs_to_issues(github, jira, &args).await?;
        Ok(respond(raw, ResourceKind::PrIssueMapping, options, None))
    }

    async fn dashboard(
        &self,
        args: DashboardArgs,
        options: &CompactOptions,
        now: DateTime<Utc>,
    ) -> Result<ToolCallResult> {
        let github = self.integrations.github()?;
        let jira = self.integrations.jira().ok();
        let raw = reports::dashboard_summary(github, jira, &args, now).await;
        Ok(respond(raw, ResourceKind::DashboardSummary, options, None))
    }

    // ========================================================================
    // Slack Handlers
    // ========================================================================

    async fn slack_channels(
        &self,
        args: ChannelListArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let mut raw = self
            .integrations
            .slack()?
            .list_channels(args.limit, args.cursor.as_deref())
            .await?;
        if args.member_only {
            if let Some(Value::Array(channels)) = raw.get_mut("channels") {
                channels.retain(|ch| ch.get("is_member").and_then(Value::as_bool) == Some(true));
            }
        }
        let value = compact_field(raw, "channels", ResourceKind::ChatChannel, options);
        Ok(respond_value(&value, options))
    }

    async fn slack_post(&self, args: PostMessageArgs) -> Result<ToolCallResult> {
        let raw = self
            .integrations
            .slack()?
            .post_message(&args.channel_id, &args.text)
            .await?;
        info!(channel = %args.channel_id, "Slack message posted");
        Ok(respond_value(&raw, &CompactOptions::default()))
    }

    async fn slack_user_conversations(
        &self,
        args: UserConversationsArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let raw = self
            .integrations
            .slack()?
            .user_conversations(&args.user_id, args.limit, args.cursor.as_deref())
            .await?;
        let value = compact_field(raw, "channels", ResourceKind::ChatChannel, options);
        Ok(respond_value(&value, options))
    }

    async fn slack_history(
        &self,
        args: ChannelHistoryArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let slack = self.integrations.slack()?;
        let channel_id = resolve_channel_id(slack, &args.channel_name).await?;
        trace_call!(options.verbose, channel = %args.channel_name, id = %channel_id, "Resolved channel");
        let raw = slack
            .channel_history(&channel_id, args.limit, args.cursor.as_deref())
            .await?;
        let value = compact_field(raw, "messages", ResourceKind::ChatMessage, options);
        Ok(respond_value(&value, options))
    }

    async fn slack_replies(
        &self,
        args: ThreadRepliesArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let slack = self.integrations.slack()?;
        let channel_id = resolve_channel_id(slack, &args.channel_name).await?;
        let raw = slack
            .thread_replies(&channel_id, &args.thread_ts, args.limit)
            .await?;
        let value = compact_field(raw, "messages", ResourceKind::ChatThreadMessage, options);
        Ok(respond_value(&value, options))
    }

    // ========================================================================
    // Google Calendar Handlers
    // ========================================================================

    async fn calendar_events(
        &self,
        args: EventsArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let query = EventQuery {
            time_min: args.time_min,
            time_max: args.time_max,
            max_results: args.max_results,
            q: args.q,
            single_events: args.single_events,
            order_by: Some(args.order_by),
        };
        let raw = self
            .integrations
            .calendar()?
            .list_events(&args.calendar_id, &query)
            .await?;

        let mut items: Vec<Value> = raw
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if args.filter_by_attendees {
            items.retain(|event| {
                event
                    .get("attendees")
                    .and_then(Value::as_array)
                    .is_some_and(|a| !a.is_empty())
            });
        }
        trace_call!(options.verbose, count = items.len(), "Calendar events fetched");

        let mut data = Map::new();
        data.insert("kind".into(), json!("calendar#events"));
        data.insert(
            "summary".into(),
            raw.get("summary").cloned().unwrap_or(Value::Null),
        );
        data.insert(
            "items".into(),
            compact(Value::Array(items), ResourceKind::CalendarEvent, options),
        );
        if !args.filter_by_attendees {
            for key in [
                "etag",
                "description",
                "updated",
                "timeZone",
                "accessRole",
                "defaultReminders",
                "nextPageToken",
            ] {
                if let Some(value) = raw.get(key) {
                    data.insert(key.into(), value.clone());
                }
            }
        }
        Ok(respond_value(&Value::Object(data), options))
    }

    async fn calendar_create(
        &self,
        args: CreateEventArgs,
        options: &CompactOptions,
    ) -> Result<ToolCallResult> {
        let event = args.event_body();
        let raw = self
            .integrations
            .calendar()?
            .insert_event(&args.calendar_id, &event)
            .await?;
        info!(
            id = raw.get("id").and_then(serde_json::Value::as_str).unwrap_or(""),
            "Calendar event created"
        );
        Ok(respond(raw, ResourceKind::CalendarEvent, options, None))
    }
}

// ============================================================================
// Typed argument records
// ============================================================================

#[derive(Debug, Deserialize)]
struct StringArgs {
    input: String,
}

#[derive(Debug, Deserialize)]
struct RepoArgs {
    owner: String,
    repo: String,
}

#[derive(Debug, Deserialize)]
struct RepoContentsArgs {
    owner: String,
    repo: String,
    path: String,
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Debug, Deserialize)]
struct IssuesArgs {
    owner: String,
    repo: String,
    state: String,
    #[serde(deserialize_with = "count::page_size")]
    per_page: u32,
}

#[derive(Debug, Deserialize)]
struct CommitsArgs {
    owner: String,
    repo: String,
    path: String,
    #[serde(deserialize_with = "count::page_size")]
    per_page: u32,
}

#[derive(Debug, Deserialize)]
struct PullRequestsArgs {
    owner: String,
    repo: String,
    state: String,
    sort: String,
    direction: String,
    #[serde(deserialize_with = "count::page_size")]
    per_page: u32,
    since: Option<String>,
    created_after: Option<String>,
    created_before: Option<String>,
    updated_after: Option<String>,
    updated_before: Option<String>,
}

impl PullRequestsArgs {
    /// `repo:o/r is:pr ...` when any date-range filter is set
    fn search_query(&self) -> Option<String> {
        let ranges = [
            ("created:>=", &self.created_after),
            ("created:<=", &self.created_before),
            ("updated:>=", &self.updated_after),
            ("updated:<=", &self.updated_before),
        ];
        if ranges.iter().all(|(_, v)| v.is_none()) {
            return None;
        }

        let mut q = format!("repo:{}/{} is:pr", self.owner, self.repo);
        if self.state != "all" {
            q.push_str(&format!(" state:{}", self.state));
        }
        for (qualifier, value) in ranges {
            if let Some(date) = value {
                q.push_str(&format!(" {}{}", qualifier, day_of(date)));
            }
        }
        Some(q)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectKeyArgs {
    project_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueKeyArgs {
    issue_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JqlArgs {
    jql: String,
    #[serde(deserialize_with = "count::page_size")]
    max_results: u32,
    #[serde(deserialize_with = "count::offset")]
    start_at: u32,
    fields: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectIssuesArgs {
    project_key: String,
    status: Option<String>,
    #[serde(deserialize_with = "count::page_size")]
    max_results: u32,
    #[serde(deserialize_with = "count::offset")]
    start_at: u32,
}

impl ProjectIssuesArgs {
    fn jql(&self) -> String {
        match self.status {
            Some(ref status) => format!(
                "project = {} AND status = \"{}\" ORDER BY created DESC",
                self.project_key, status
            ),
            None => format!("project = {} ORDER BY created DESC", self.project_key),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChannelListArgs {
    #[serde(deserialize_with = "count::limit")]
    limit: u32,
    cursor: Option<String>,
    member_only: bool,
}

#[derive(Debug, Deserialize)]
struct PostMessageArgs {
    channel_id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct UserConversationsArgs {
    user_id: String,
    #[serde(deserialize_with = "count::limit")]
    limit: u32,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelHistoryArgs {
    channel_name: String,
    #[serde(deserialize_with = "count::limit")]
    limit: u32,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadRepliesArgs {
    channel_name: String,
    thread_ts: String,
    #[serde(deserialize_with = "count::limit")]
    limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsArgs {
    calendar_id: String,
    time_min: Option<String>,
    time_max: Option<String>,
    #[serde(deserialize_with = "count::event_count")]
    max_results: u32,
    q: Option<String>,
    single_events: bool,
    order_by: String,
    filter_by_attendees: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventArgs {
    calendar_id: String,
    summary: String,
    start: Value,
    end: Value,
    description: Option<String>,
    location: Option<String>,
    attendees: Option<Value>,
    reminders: Option<Value>,
}

impl CreateEventArgs {
    /// Event resource for `events.insert`; unset optionals are left out
    fn event_body(&self) -> Value {
        let mut event = json!({
            "summary": self.summary,
            "start": self.start,
            "end": self.end,
        });
        let optional = [
            ("description", self.description.clone().map(Value::String)),
            ("location", self.location.clone().map(Value::String)),
            ("attendees", self.attendees.clone()),
            ("reminders", self.reminders.clone()),
        ];
        if let Some(obj) = event.as_object_mut() {
            for (key, value) in optional {
                if let Some(value) = value.filter(|v| !is_blank(v)) {
                    obj.insert(key.into(), value);
                }
            }
        }
        event
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}

fn first_page(per_page: u32) -> PageRequest {
    PageRequest::Page {
        page: 1,
        per_page: per_page.into(),
    }
}

/// `YYYY-MM-DD` (UTC) for an ISO 8601 timestamp; unparseable input keeps
/// its first ten characters
fn day_of(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Utc).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| timestamp.chars().take(10).collect())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
