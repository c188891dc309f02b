//! Essential-field extractors
//!
//! One function per [`ResourceKind`]. Every extractor is total (missing or
//! oddly shaped fields become `null` or are omitted) and idempotent: feeding
//! an extractor its own output yields the same output. Reduced resources
//! never embed full upstream objects; actors collapse to a single
//! identifying field.

use super::ResourceKind;
use serde_json::{json, Map, Value};

/// Maximum characters kept from free-text bodies
pub const TRUNCATE_LIMIT: usize = 200;

/// Stand-in for bodies that are not plain strings (rich-text documents)
pub const STRUCTURED_PLACEHOLDER: &str = "[structured content]";

/// Reduce one upstream object to the essential shape for `kind`
pub fn extract(kind: ResourceKind, raw: &Value) -> Value {
    match kind {
        ResourceKind::Repository => repository(raw),
        ResourceKind::RepoContent => repo_content(raw),
        ResourceKind::Issue => issue(raw),
        ResourceKind::Commit => commit(raw),
        ResourceKind::PullRequest => pull_request(raw),
        ResourceKind::User => user(raw),
        ResourceKind::CalendarEvent => calendar_event(raw),
        ResourceKind::ChatMessage => chat_message(raw),
        ResourceKind::ChatThreadMessage => chat_thread_message(raw),
        ResourceKind::ChatChannel => chat_channel(raw),
        ResourceKind::JiraProject => jira_project(raw),
        ResourceKind::JiraIssue => jira_issue(raw),
        ResourceKind::JiraSearchResult => jira_search_result(raw),
        ResourceKind::PrIssueMapping => pr_issue_mapping(raw),
        ResourceKind::DashboardSummary => dashboard_summary(raw),
    }
}

/// Truncate a free-text body to [`TRUNCATE_LIMIT`] characters plus `...`.
///
/// `null` and empty values stay `null`; non-string values become
/// [`STRUCTURED_PLACEHOLDER`].
pub fn truncate_body(value: &Value) -> Value {
    match value {
        Value::String(s) if s.is_empty() => Value::Null,
        Value::String(s) => Value::String(truncate_str(s)),
        Value::Null => Value::Null,
        _ => Value::String(STRUCTURED_PLACEHOLDER.to_string()),
    }
}

/// Character-based (not byte-based) truncation
pub fn truncate_str(s: &str) -> String {
    match s.char_indices().nth(TRUNCATE_LIMIT) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

// ============================================================================
// Field helpers
// ============================================================================

fn get(raw: &Value, key: &str) -> Value {
    raw.get(key).cloned().unwrap_or(Value::Null)
}

/// JIRA keeps most data under `fields`; reduced issues keep it top-level
fn jira_field<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    raw.get("fields")
        .and_then(|f| f.get(key))
        .or_else(|| raw.get(key))
}

/// JavaScript-style truthiness, for "add this field if present" rules
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn non_empty_array(value: Option<&Value>) -> Option<&Vec<Value>> {
    value.and_then(Value::as_array).filter(|a| !a.is_empty())
}

/// `{key: obj.key}` for an object, `null` otherwise
fn actor(value: Option<&Value>, key: &str) -> Value {
    match value {
        Some(v @ Value::Object(_)) => json!({ key: get(v, key) }),
        _ => Value::Null,
    }
}

/// Reduce a named reference (`{name, ...}` or a bare string) to its name
fn ref_name(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(v @ Value::Object(_)) => get(v, "name"),
        _ => Value::Null,
    }
}

/// Labels as plain names; accepts `["a"]` and `[{"name": "a"}]`
fn label_names(value: Option<&Value>) -> Value {
    let names = value
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| match label {
                    Value::String(s) => Some(Value::String(s.clone())),
                    Value::Object(_) => label.get("name").cloned(),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    Value::Array(names)
}

/// Text of a Slack topic/purpose (`{value}` upstream, plain string reduced)
fn slack_text(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(v @ Value::Object(_)) => get(v, "value"),
        _ => Value::Null,
    }
}

fn map_array(value: Option<&Value>, f: impl Fn(&Value) -> Value) -> Value {
    Value::Array(
        value
            .and_then(Value::as_array)
            .map(|items| items.iter().map(f).collect())
            .unwrap_or_default(),
    )
}

// ============================================================================
// GitHub
// ============================================================================

fn repository(raw: &Value) -> Value {
    json!({
        "id": get(raw, "id"),
        "name": get(raw, "name"),
        "full_name": get(raw, "full_name"),
        "description": get(raw, "description"),
        "private": get(raw, "private"),
        "owner": actor(raw.get("owner"), "login"),
        "html_url": get(raw, "html_url"),
        "default_branch": get(raw, "default_branch"),
        "language": get(raw, "language"),
        "topics": raw.get("topics").cloned().unwrap_or_else(|| json!([])),
        "stargazers_count": get(raw, "stargazers_count"),
        "forks_count": get(raw, "forks_count"),
        "open_issues_count": get(raw, "open_issues_count"),
        "created_at": get(raw, "created_at"),
        "updated_at": get(raw, "updated_at"),
        "pushed_at": get(raw, "pushed_at"),
    })
}

fn repo_content(raw: &Value) -> Value {
    let mut entry = Map::new();
    for key in ["name", "path", "type", "size", "sha", "html_url"] {
        entry.insert(key.into(), get(raw, key));
    }
    // Single-file responses carry the payload itself
    if let Some(content) = raw.get("content").filter(|c| c.is_string()) {
        entry.insert("content".into(), content.clone());
        entry.insert("encoding".into(), get(raw, "encoding"));
    }
    Value::Object(entry)
}

fn issue(raw: &Value) -> Value {
    let is_pull_request = raw.get("pull_request").is_some()
        || raw.get("is_pull_request").and_then(Value::as_bool) == Some(true);
    json!({
        "number": get(raw, "number"),
        "title": get(raw, "title"),
        "state": get(raw, "state"),
        "user": actor(raw.get("user"), "login"),
        "labels": label_names(raw.get("labels")),
        "comments": get(raw, "comments"),
        "created_at": get(raw, "created_at"),
        "updated_at": get(raw, "updated_at"),
        "closed_at": get(raw, "closed_at"),
        "body": truncate_body(raw.get("body").unwrap_or(&Value::Null)),
        "is_pull_request": is_pull_request,
        "html_url": get(raw, "html_url"),
    })
}

fn commit(raw: &Value) -> Value {
    let detail = raw.get("commit");
    let git_author = detail.and_then(|c| c.get("author"));
    let message = detail
        .and_then(|c| c.get("message"))
        .or_else(|| raw.get("message"))
        .unwrap_or(&Value::Null);
    let author_name = git_author
        .and_then(|a| a.get("name"))
        .or_else(|| raw.get("author_name"))
        .cloned()
        .unwrap_or(Value::Null);
    let date = git_author
        .and_then(|a| a.get("date"))
        .or_else(|| raw.get("date"))
        .cloned()
        .unwrap_or(Value::Null);

    json!({
        "sha": get(raw, "sha"),
        "message": truncate_body(message),
        "author_name": author_name,
        "author": actor(raw.get("author"), "login"),
        "date": date,
        "html_url": get(raw, "html_url"),
    })
}

fn pull_request(raw: &Value) -> Value {
    json!({
        "number": get(raw, "number"),
        "title": get(raw, "title"),
        "state": get(raw, "state"),
        "created_at": get(raw, "created_at"),
        "updated_at": get(raw, "updated_at"),
        "merged_at": get(raw, "merged_at"),
        "user": actor(raw.get("user"), "login"),
        "additions": get(raw, "additions"),
        "deletions": get(raw, "deletions"),
        "changed_files": get(raw, "changed_files"),
        "labels": label_names(raw.get("labels")),
        "html_url": get(raw, "html_url"),
    })
}

fn user(raw: &Value) -> Value {
    json!({
        "login": get(raw, "login"),
        "id": get(raw, "id"),
        "name": get(raw, "name"),
        "company": get(raw, "company"),
        "location": get(raw, "location"),
        "email": get(raw, "email"),
        "bio": truncate_body(raw.get("bio").unwrap_or(&Value::Null)),
        "public_repos": get(raw, "public_repos"),
        "followers": get(raw, "followers"),
        "following": get(raw, "following"),
        "html_url": get(raw, "html_url"),
        "created_at": get(raw, "created_at"),
    })
}

// ============================================================================
// Google Calendar
// ============================================================================

fn calendar_event(raw: &Value) -> Value {
    let mut event = Map::new();
    for key in ["id", "summary", "start", "end", "status"] {
        event.insert(key.into(), get(raw, key));
    }
    for key in ["description", "location", "created", "updated"] {
        if is_truthy(raw.get(key)) {
            event.insert(key.into(), get(raw, key));
        }
    }
    if let Some(attendees) = non_empty_array(raw.get("attendees")) {
        let reduced: Vec<Value> = attendees
            .iter()
            .map(|a| {
                json!({
                    "email": get(a, "email"),
                    "responseStatus": get(a, "responseStatus"),
                    "optional": a.get("optional").and_then(Value::as_bool).unwrap_or(false),
                })
            })
            .collect();
        event.insert("attendees".into(), Value::Array(reduced));
    }
    if let Some(reminders) = raw.get("reminders") {
        if is_truthy(reminders.get("overrides")) {
            let mut r = Map::new();
            if let Some(use_default) = reminders.get("useDefault") {
                r.insert("useDefault".into(), use_default.clone());
            }
            r.insert("overrides".into(), get(reminders, "overrides"));
            event.insert("reminders".into(), Value::Object(r));
        }
    }
    Value::Object(event)
}

// ============================================================================
// Slack
// ============================================================================

fn message_base(raw: &Value) -> Map<String, Value> {
    let mut msg = Map::new();
    for key in ["user", "text", "ts", "type"] {
        msg.insert(key.into(), get(raw, key));
    }
    msg
}

fn message_extras(raw: &Value, msg: &mut Map<String, Value>) {
    if let Some(reactions) = non_empty_array(raw.get("reactions")) {
        let reduced: Vec<Value> = reactions
            .iter()
            .map(|r| json!({"name": get(r, "name"), "count": get(r, "count")}))
            .collect();
        msg.insert("reactions".into(), Value::Array(reduced));
    }

    let file_count = non_empty_array(raw.get("files"))
        .map(|f| json!(f.len()))
        .or_else(|| raw.get("file_count").filter(|_| is_truthy(raw.get("has_files"))).cloned());
    if let Some(count) = file_count {
        msg.insert("has_files".into(), json!(true));
        msg.insert("file_count".into(), count);
    }

    let attachment_count = non_empty_array(raw.get("attachments"))
        .map(|a| json!(a.len()))
        .or_else(|| {
            raw.get("attachment_count")
                .filter(|_| is_truthy(raw.get("has_attachments")))
                .cloned()
        });
    if let Some(count) = attachment_count {
        msg.insert("has_attachments".into(), json!(true));
        msg.insert("attachment_count".into(), count);
    }
}

fn chat_message(raw: &Value) -> Value {
    let mut msg = message_base(raw);
    if is_truthy(raw.get("thread_ts")) {
        msg.insert("thread_ts".into(), get(raw, "thread_ts"));
        if is_truthy(raw.get("reply_count")) {
            msg.insert("reply_count".into(), get(raw, "reply_count"));
        }
    }
    message_extras(raw, &mut msg);
    Value::Object(msg)
}

fn chat_thread_message(raw: &Value) -> Value {
    let mut msg = message_base(raw);
    let thread_ts = raw.get("thread_ts").filter(|t| is_truthy(Some(t)));
    let is_parent = match thread_ts {
        Some(ts) => Some(ts) == raw.get("ts"),
        None => raw.get("is_parent").and_then(Value::as_bool) == Some(true),
    };
    if is_parent {
        msg.insert("is_parent".into(), json!(true));
    }
    message_extras(raw, &mut msg);
    Value::Object(msg)
}

fn chat_channel(raw: &Value) -> Value {
    json!({
        "id": get(raw, "id"),
        "name": get(raw, "name"),
        "is_private": get(raw, "is_private"),
        "is_member": get(raw, "is_member"),
        "is_archived": get(raw, "is_archived"),
        "num_members": get(raw, "num_members"),
        "topic": slack_text(raw.get("topic")),
        "purpose": slack_text(raw.get("purpose")),
        "created": get(raw, "created"),
    })
}

// ============================================================================
// JIRA
// ============================================================================

fn jira_project(raw: &Value) -> Value {
    let url = raw
        .get("self")
        .or_else(|| raw.get("url"))
        .cloned()
        .unwrap_or(Value::Null);
    let category = match raw.get("projectCategory") {
        Some(c @ Value::Object(_)) => json!({"name": get(c, "name")}),
        _ => Value::Null,
    };
    json!({
        "id": get(raw, "id"),
        "key": get(raw, "key"),
        "name": get(raw, "name"),
        "description": get(raw, "description"),
        "lead": actor(raw.get("lead"), "displayName"),
        "url": url,
        "projectCategory": category,
        "issueTypes": map_array(raw.get("issueTypes"), |t| json!({"name": get(t, "name")})),
    })
}

fn named(value: Option<&Value>) -> Value {
    match value {
        Some(v @ Value::Object(_)) => json!({"name": get(v, "name")}),
        _ => Value::Null,
    }
}

fn jira_issue(raw: &Value) -> Value {
    let labels = jira_field(raw, "labels")
        .filter(|l| l.is_array())
        .cloned()
        .unwrap_or_else(|| json!([]));
    let issue_type = jira_field(raw, "issuetype").or_else(|| raw.get("issueType"));
    json!({
        "id": get(raw, "id"),
        "key": get(raw, "key"),
        "summary": jira_field(raw, "summary").cloned().unwrap_or(Value::Null),
        "description": truncate_body(jira_field(raw, "description").unwrap_or(&Value::Null)),
        "status": named(jira_field(raw, "status")),
        "priority": named(jira_field(raw, "priority")),
        "assignee": actor(jira_field(raw, "assignee"), "displayName"),
        "reporter": actor(jira_field(raw, "reporter"), "displayName"),
        "created": jira_field(raw, "created").cloned().unwrap_or(Value::Null),
        "updated": jira_field(raw, "updated").cloned().unwrap_or(Value::Null),
        "labels": labels,
        "issueType": named(issue_type),
    })
}

fn jira_search_result(raw: &Value) -> Value {
    json!({
        "total": get(raw, "total"),
        "issues": map_array(raw.get("issues"), jira_issue),
    })
}

// ============================================================================
// Cross-integration reports
// ============================================================================

fn pr_issue_mapping(raw: &Value) -> Value {
    let mappings = map_array(raw.get("mappings"), |m| {
        json!({
            "pr_number": get(m, "pr_number"),
            "pr_title": get(m, "pr_title"),
            "pr_state": get(m, "pr_state"),
            "pr_url": get(m, "pr_url"),
            "pr_created_at": get(m, "pr_created_at"),
            "pr_updated_at": get(m, "pr_updated_at"),
            "jira_keys": m.get("jira_keys").cloned().unwrap_or_else(|| json!([])),
            "jira_issues": map_array(m.get("jira_issues"), |i| {
                json!({
                    "key": get(i, "key"),
                    "summary": get(i, "summary"),
                    "status": ref_name(i.get("status")),
                })
            }),
        })
    });
    json!({
        "repository": get(raw, "repository"),
        "jira_project": get(raw, "jira_project"),
        "total_mapped_prs": get(raw, "total_mapped_prs"),
        "total_jira_issues": get(raw, "total_jira_issues"),
        "mappings": mappings,
    })
}

fn dashboard_summary(raw: &Value) -> Value {
    let github = raw.get("github_summary").unwrap_or(&Value::Null);
    let jira = raw.get("jira_summary").unwrap_or(&Value::Null);
    json!({
        "period": get(raw, "period"),
        "github_summary": {
            "total_prs": get(github, "total_prs"),
            "total_commits": get(github, "total_commits"),
            "repositories": map_array(github.get("repositories"), |r| json!({
                "repo": get(r, "repo"),
                "pr_count": get(r, "pr_count"),
                "commit_count": get(r, "commit_count"),
            })),
        },
        "jira_summary": {
            "total_issues": get(jira, "total_issues"),
            "completed_issues": get(jira, "completed_issues"),
            "completion_rate": get(jira, "completion_rate"),
            "projects": map_array(jira.get("projects"), |p| json!({
                "project_key": get(p, "project_key"),
                "total_issues": get(p, "total_issues"),
                "completed_issues": get(p, "completed_issues"),
            })),
        },
        "contributor_summary": map_array(raw.get("contributor_summary"), |c| json!({
            "name": get(c, "name"),
            "prs": get(c, "prs"),
            "commits": get(c, "commits"),
            "total_contributions": get(c, "total_contributions"),
        })),
    })
}
