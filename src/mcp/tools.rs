//! MCP Tool definitions
//!
//! Static catalog of every tool the server exposes, in the order `tools/list`
//! advertises them. Each descriptor carries the parameter specs used both to
//! render the JSON schema and to validate incoming arguments.

use super::protocol::{InputSchema, ToolDefinition};
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

/// Primitive JSON kinds a parameter may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }

    /// Strict type check, no coercion (`"30"` is not a number)
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
        }
    }
}

/// A single declared parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<Value>,
    /// Extra schema keywords merged into the property (items, enum, properties)
    pub schema: Option<Value>,
}

impl ParamSpec {
    fn new(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
            default: None,
            schema: None,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::String, description)
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Number, description)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Boolean, description)
    }

    pub fn array(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Array, description)
    }

    pub fn object(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Object, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn schema(mut self, extra: Value) -> Self {
        self.schema = Some(extra);
        self
    }

    fn property(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.kind.as_str()));
        prop.insert("description".into(), json!(self.description));
        if let Some(ref default) = self.default {
            prop.insert("default".into(), default.clone());
        }
        if let Some(Value::Object(extra)) = &self.schema {
            for (k, v) in extra {
                prop.insert(k.clone(), v.clone());
            }
        }
        Value::Object(prop)
    }
}

/// Immutable description of one tool
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    fn new(name: &'static str, description: &'static str, params: Vec<ParamSpec>) -> Self {
        Self {
            name,
            description,
            params,
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Render as the MCP `tools/list` entry
    pub fn to_definition(&self) -> ToolDefinition {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.property()))
            .collect();
        let required: Vec<String> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.to_string())
            .collect();

        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: InputSchema {
                schema_type: "object".to_string(),
                properties: Some(Value::Object(properties)),
                required,
            },
        }
    }
}

static REGISTRY: LazyLock<Vec<ToolDescriptor>> = LazyLock::new(build_registry);

/// Every tool in declared order
pub fn all_tools() -> &'static [ToolDescriptor] {
    &REGISTRY
}

/// Look up a tool by name
pub fn find_tool(name: &str) -> Option<&'static ToolDescriptor> {
    REGISTRY.iter().find(|t| t.name == name)
}

/// `tools/list` payload
pub fn tool_definitions() -> Vec<ToolDefinition> {
    REGISTRY.iter().map(ToolDescriptor::to_definition).collect()
}

fn build_registry() -> Vec<ToolDescriptor> {
    let mut tools = Vec::new();
    tools.extend(string_tools());
    tools.extend(github_tools());
    tools.extend(jira_tools());
    tools.extend(integration_tools());
    tools.extend(slack_tools());
    tools.extend(calendar_tools());
    tools
}

// ============================================================================
// Common options
// ============================================================================

/// Response-shaping options shared by most tools
fn common_options(pagination: bool) -> Vec<ParamSpec> {
    let mut params = vec![
        ParamSpec::boolean("compact", "Return compact data with essential fields only")
            .default(json!(true)),
        ParamSpec::boolean(
            "compact_json",
            "Return non-formatted JSON to reduce token usage",
        )
        .default(json!(true)),
    ];
    if pagination {
        params.push(
            ParamSpec::boolean(
                "include_pagination",
                "Include pagination information in the response",
            )
            .default(json!(false)),
        );
    }
    params.push(ParamSpec::boolean("verbose", "Enable verbose logging").default(json!(false)));
    params
}

fn with_common(mut params: Vec<ParamSpec>, pagination: bool) -> Vec<ParamSpec> {
    params.extend(common_options(pagination));
    params
}

fn owner_param() -> ParamSpec {
    ParamSpec::string("owner", "Repository owner (username or organization)").required()
}

fn repo_param() -> ParamSpec {
    ParamSpec::string("repo", "Repository name").required()
}

// ============================================================================
// String tools
// ============================================================================

fn string_tools() -> Vec<ToolDescriptor> {
    vec![ToolDescriptor::new(
        "getStringLength",
        "Get the length of a string, counting each Unicode character once",
        vec![ParamSpec::string("input", "The input string").required()],
    )]
}

// ============================================================================
// GitHub tools
// ============================================================================

fn github_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "getGitHubRepoInfo",
            "Get information about a GitHub repository",
            with_common(vec![owner_param(), repo_param()], false),
        ),
        ToolDescriptor::new(
            "getGitHubRepoContents",
            "Get contents (files and directories) from a GitHub repository",
            with_common(
                vec![
                    owner_param(),
                    repo_param(),
                    ParamSpec::string(
                        "path",
                        "Path to the file or directory (default: root directory)",
                    )
                    .default(json!("")),
                    ParamSpec::string(
                        "ref",
                        "The name of the commit/branch/tag (default: the default branch)",
                    )
                    .default(json!("")),
                ],
                false,
            ),
        ),
        ToolDescriptor::new(
            "getGitHubIssues",
            "Get issues from a GitHub repository",
            with_common(
                vec![
                    owner_param(),
                    repo_param(),
                    ParamSpec::string("state", "State of the issues (open, closed, all)")
                        .default(json!("open"))
                        .schema(json!({"enum": ["open", "closed", "all"]})),
                    ParamSpec::number("per_page", "Number of issues to return (max: 100)")
                        .default(json!(30)),
                ],
                true,
            ),
        ),
        ToolDescriptor::new(
            "getGitHubCommits",
            "Get commit history from a GitHub repository",
            with_common(
                vec![
                    owner_param(),
                    repo_param(),
                    ParamSpec::string("path", "Path to filter commits by (default: all files)")
                        .default(json!("")),
                    ParamSpec::number("per_page", "Number of commits to return (max: 100)")
                        .default(json!(30)),
                ],
                true,
            ),
        ),
        ToolDescriptor::new(
            "getGitHubPullRequests",
            "Get pull requests from a GitHub repository",
            with_common(
                vec![
                    owner_param(),
                    repo_param(),
                    ParamSpec::string("state", "State of the pull requests (open, closed, all)")
                        .default(json!("open"))
                        .schema(json!({"enum": ["open", "closed", "all"]})),
                    ParamSpec::string(
                        "sort",
                        "What to sort results by (created, updated, popularity, long-running)",
                    )
                    .default(json!("created")),
                    ParamSpec::string("direction", "Direction to sort (asc or desc)")
                        .default(json!("desc"))
                        .schema(json!({"enum": ["asc", "desc"]})),
                    ParamSpec::number("per_page", "Number of pull requests to return (max: 100)")
                        .default(json!(10)),
                    ParamSpec::string(
                        "since",
                        "Only PRs updated at or after this time (ISO 8601 format)",
                    ),
                    ParamSpec::string(
                        "created_after",
                        "Only PRs created at or after this date (ISO 8601 format)",
                    ),
                    ParamSpec::string(
                        "created_before",
                        "Only PRs created at or before this date (ISO 8601 format)",
                    ),
                    ParamSpec::string(
                        "updated_after",
                        "Only PRs updated at or after this date (ISO 8601 format)",
                    ),
                    ParamSpec::string(
                        "updated_before",
                        "Only PRs updated at or before this date (ISO 8601 format)",
                    ),
                ],
                true,
            ),
        ),
        ToolDescriptor::new(
            "getGitHubUserInfo",
            "Get information about the authenticated GitHub user",
            common_options(false),
        ),
    ]
}

// ============================================================================
// JIRA tools
// ============================================================================

fn jira_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "getJiraProjectInfo",
            "Get information about a JIRA project",
            with_common(
                vec![ParamSpec::string("projectKey", "JIRA project key (e.g., 'PROJ')").required()],
                false,
            ),
        ),
        ToolDescriptor::new(
            "getJiraIssue",
            "Get information about a JIRA issue",
            with_common(
                vec![ParamSpec::string("issueKey", "JIRA issue key (e.g., 'PROJ-123')").required()],
                false,
            ),
        ),
        ToolDescriptor::new(
            "searchJiraIssues",
            "Search for JIRA issues using JQL",
            with_common(
                vec![
                    ParamSpec::string("jql", "JQL query string").required(),
                    ParamSpec::number("maxResults", "Maximum number of results to return")
                        .default(json!(50)),
                    ParamSpec::number("startAt", "Index of the first result to return")
                        .default(json!(0)),
                    ParamSpec::array("fields", "Fields to include in the response")
                        .schema(json!({"items": {"type": "string"}})),
                ],
                true,
            ),
        ),
        ToolDescriptor::new(
            "getJiraProjectIssues",
            "Get issues for a JIRA project",
            with_common(
                vec![
                    ParamSpec::string("projectKey", "JIRA project key (e.g., 'PROJ')").required(),
                    ParamSpec::string(
                        "status",
                        "Filter issues by status (e.g., 'Done', 'In Progress')",
                    ),
                    ParamSpec::number("maxResults", "Maximum number of results to return")
                        .default(json!(50)),
                    ParamSpec::number("startAt", "Index of the first result to return")
                        .default(json!(0)),
                ],
                true,
            ),
        ),
    ]
}

// ============================================================================
// Cross-integration reports
// ============================================================================

fn integration_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "mapGitHubPrToJiraIssues",
            "Map GitHub pull requests to the JIRA issues referenced in their title or body",
            with_common(
                vec![
                    ParamSpec::string(
                        "owner",
                        "GitHub repository owner (username or organization)",
                    )
                    .required(),
                    ParamSpec::string("repo", "GitHub repository name").required(),
                    ParamSpec::string(
                        "projectKey",
                        "JIRA project key to filter issues (e.g., 'PROJ')",
                    )
                    .required(),
                    ParamSpec::string(
                        "since",
                        "Only PRs updated at or after this time (ISO 8601 format)",
                    ),
                    ParamSpec::number("maxResults", "Maximum number of PRs to process")
                        .default(json!(30)),
                ],
                false,
            ),
        ),
        ToolDescriptor::new(
            "generateDashboardSummary",
            "Generate a development status dashboard summary",
            with_common(
                vec![
                    ParamSpec::string(
                        "owner",
                        "GitHub repository owner (username or organization)",
                    )
                    .required(),
                    ParamSpec::array("repos", "List of GitHub repository names")
                        .required()
                        .schema(json!({"items": {"type": "string"}})),
                    ParamSpec::array("projectKeys", "List of JIRA project keys")
                        .required()
                        .schema(json!({"items": {"type": "string"}})),
                    ParamSpec::string(
                        "period",
                        "Reporting period (day, week, month, quarter, year)",
                    )
                    .default(json!("month"))
                    .schema(json!({"enum": ["day", "week", "month", "quarter", "year"]})),
                ],
                false,
            ),
        ),
    ]
}

// ============================================================================
// Slack tools
// ============================================================================

fn slack_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "slack_list_channels",
            "List public channels in the Slack workspace with pagination",
            with_common(
                vec![
                    ParamSpec::number(
                        "limit",
                        "Maximum number of channels to return (default 100, max 200)",
                    )
                    .default(json!(100)),
                    ParamSpec::string("cursor", "Pagination cursor for next page of results"),
                    ParamSpec::boolean(
                        "member_only",
                        "Only return channels where the bot is a member",
                    )
                    .default(json!(false)),
                ],
                false,
            ),
        ),
        ToolDescriptor::new(
            "slack_post_message",
            "Post a new message to a Slack channel",
            vec![
                ParamSpec::string("channel_id", "The ID of the channel to post to").required(),
                ParamSpec::string("text", "The message text to post").required(),
            ],
        ),
        ToolDescriptor::new(
            "slack_user_conversations",
            "List channels that a user is a member of",
            with_common(
                vec![
                    ParamSpec::string("user_id", "The ID of the user to get conversations for")
                        .required(),
                    ParamSpec::number(
                        "limit",
                        "Maximum number of channels to return (default 100, max 200)",
                    )
                    .default(json!(100)),
                    ParamSpec::string("cursor", "Pagination cursor for next page of results"),
                ],
                false,
            ),
        ),
        ToolDescriptor::new(
            "slack_get_channel_history",
            "Get conversation history from a channel by name",
            with_common(
                vec![
                    ParamSpec::string(
                        "channel_name",
                        "The name of the channel (with or without # prefix)",
                    )
                    .required(),
                    ParamSpec::number(
                        "limit",
                        "Number of messages to retrieve (default 10, max 100)",
                    )
                    .default(json!(10)),
                    ParamSpec::string("cursor", "Pagination cursor for next page of results"),
                ],
                false,
            ),
        ),
        ToolDescriptor::new(
            "slack_get_thread_replies",
            "Get replies in a thread by channel name and thread timestamp",
            with_common(
                vec![
                    ParamSpec::string(
                        "channel_name",
                        "The name of the channel (with or without # prefix)",
                    )
                    .required(),
                    ParamSpec::string(
                        "thread_ts",
                        "The timestamp of the parent message (e.g. '1234567890.123456')",
                    )
                    .required(),
                    ParamSpec::number(
                        "limit",
                        "Number of replies to retrieve (default 10, max 100)",
                    )
                    .default(json!(10)),
                ],
                false,
            ),
        ),
    ]
}

// ============================================================================
// Google Calendar tools
// ============================================================================

fn calendar_tools() -> Vec<ToolDescriptor> {
    let date_time = json!({
        "properties": {
            "dateTime": {
                "type": "string",
                "description": "Date and time (ISO 8601, e.g. 2024-01-01T09:00:00+09:00)"
            },
            "timeZone": {"type": "string", "description": "Time zone (e.g. Asia/Tokyo)"}
        },
        "required": ["dateTime"]
    });

    vec![
        ToolDescriptor::new(
            "google_calendar_get_events",
            "Get Google Calendar events for a time range, with optional filtering",
            with_common(
                vec![
                    ParamSpec::string("calendarId", "Calendar ID (default: 'primary')")
                        .default(json!("primary")),
                    ParamSpec::string(
                        "timeMin",
                        "Start of the range (ISO 8601, e.g. 2023-01-01T00:00:00Z)",
                    ),
                    ParamSpec::string(
                        "timeMax",
                        "End of the range (ISO 8601, e.g. 2023-01-31T23:59:59Z)",
                    ),
                    ParamSpec::number("maxResults", "Maximum number of events (default 10, max 100)")
                        .default(json!(10)),
                    ParamSpec::string("q", "Free-text search over event titles and descriptions"),
                    ParamSpec::boolean("singleEvents", "Expand recurring events into instances")
                        .default(json!(true)),
                    ParamSpec::string("orderBy", "Ordering (startTime, updated)")
                        .default(json!("startTime"))
                        .schema(json!({"enum": ["startTime", "updated"]})),
                    ParamSpec::boolean(
                        "filterByAttendees",
                        "Only return events that have attendees",
                    )
                    .default(json!(false)),
                ],
                false,
            ),
        ),
        ToolDescriptor::new(
            "google_calendar_create_event",
            "Create a new Google Calendar event",
            with_common(
                vec![
                    ParamSpec::string("calendarId", "Calendar ID (default: 'primary')")
                        .default(json!("primary")),
                    ParamSpec::string("summary", "Event title").required(),
                    ParamSpec::string("description", "Event description"),
                    ParamSpec::string("location", "Event location"),
                    ParamSpec::object("start", "Start date and time")
                        .required()
                        .schema(date_time.clone()),
                    ParamSpec::object("end", "End date and time")
                        .required()
                        .schema(date_time),
                    ParamSpec::array("attendees", "Attendee list").schema(json!({
                        "items": {
                            "type": "object",
                            "properties": {
                                "email": {"type": "string", "description": "Attendee email address"},
                                "optional": {"type": "boolean", "description": "Whether attendance is optional"}
                            },
                            "required": ["email"]
                        }
                    })),
                    ParamSpec::object("reminders", "Reminder settings").schema(json!({
                        "properties": {
                            "useDefault": {"type": "boolean", "description": "Use the calendar's default reminders"},
                            "overrides": {
                                "type": "array",
                                "description": "Custom reminders",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "method": {"type": "string", "description": "Notification method (email, popup)"},
                                        "minutes": {"type": "number", "description": "Minutes before the event start"}
                                    }
                                }
                            }
                        }
                    })),
                ],
                false,
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tool_names_unique() {
        let names: HashSet<_> = all_tools().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), all_tools().len());
    }

    #[test]
    fn test_declared_order() {
        let names: Vec<_> = all_tools().iter().map(|t| t.name).collect();
        assert_eq!(names.first(), Some(&"getStringLength"));
        assert_eq!(names.last(), Some(&"google_calendar_create_event"));
        assert_eq!(names.len(), 20);
    }

    #[test]
    fn test_required_fields_rendered() {
        let def = find_tool("getGitHubPullRequests").unwrap().to_definition();
        assert_eq!(def.input_schema.schema_type, "object");
        assert_eq!(
            def.input_schema.required,
            vec!["owner".to_string(), "repo".to_string()]
        );
        let props = def.input_schema.properties.unwrap();
        assert_eq!(props["per_page"]["default"], 10);
        assert_eq!(props["compact"]["type"], "boolean");
        assert_eq!(props["include_pagination"]["default"], false);
    }

    #[test]
    fn test_no_required_renders_empty_list() {
        let def = find_tool("getGitHubUserInfo").unwrap().to_definition();
        assert!(def.input_schema.required.is_empty());
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["inputSchema"]["required"], json!([]));
    }

    #[test]
    fn test_every_tool_has_description() {
        for tool in tool_definitions() {
            assert!(!tool.description.is_empty(), "{} has no description", tool.name);
        }
    }

    #[test]
    fn test_defaults_match_declared_kind() {
        for tool in all_tools() {
            for param in &tool.params {
                if let Some(ref default) = param.default {
                    assert!(
                        param.kind.matches(default),
                        "{}.{} default has wrong kind",
                        tool.name,
                        param.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_kind_matching_is_strict() {
        assert!(!ParamKind::Number.matches(&json!("30")));
        assert!(ParamKind::Number.matches(&json!(30)));
        assert!(!ParamKind::Boolean.matches(&json!("true")));
        assert!(ParamKind::Array.matches(&json!([])));
        assert!(!ParamKind::Object.matches(&json!([])));
    }
}
