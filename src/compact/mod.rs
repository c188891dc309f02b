//! Response compaction
//!
//! Turns raw upstream payloads into the text carried by a tool envelope:
//! optional reduction to essential fields, optional pagination metadata,
//! then dense or indented JSON.

pub mod extract;

pub use extract::{truncate_body, truncate_str, STRUCTURED_PLACEHOLDER, TRUNCATE_LIMIT};

use crate::mcp::protocol::ToolCallResult;
use serde_json::{json, Map, Value};

/// Closed set of resource shapes with a dedicated extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Repository,
    RepoContent,
    Issue,
    Commit,
    PullRequest,
    User,
    CalendarEvent,
    ChatMessage,
    ChatThreadMessage,
    ChatChannel,
    JiraProject,
    JiraIssue,
    JiraSearchResult,
    PrIssueMapping,
    DashboardSummary,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 15] = [
        ResourceKind::Repository,
        ResourceKind::RepoContent,
        ResourceKind::Issue,
        ResourceKind::Commit,
        ResourceKind::PullRequest,
        ResourceKind::User,
        ResourceKind::CalendarEvent,
        ResourceKind::ChatMessage,
        ResourceKind::ChatThreadMessage,
        ResourceKind::ChatChannel,
        ResourceKind::JiraProject,
        ResourceKind::JiraIssue,
        ResourceKind::JiraSearchResult,
        ResourceKind::PrIssueMapping,
        ResourceKind::DashboardSummary,
    ];
}

/// Caller-controlled response shaping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactOptions {
    /// Reduce to essential fields
    pub compact: bool,
    /// Dense JSON instead of 2-space indentation
    pub compact_json: bool,
    /// Attach pagination metadata
    pub include_pagination: bool,
    /// Raise per-call diagnostics from debug to info
    pub verbose: bool,
}

impl Default for CompactOptions {
    fn default() -> Self {
        Self {
            compact: true,
            compact_json: true,
            include_pagination: false,
            verbose: false,
        }
    }
}

impl CompactOptions {
    /// Read the common options from an argument bag. Non-boolean values fall
    /// back to the default.
    pub fn from_args(args: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| {
            args.get(name).and_then(Value::as_bool).unwrap_or(default)
        };
        Self {
            compact: flag("compact", defaults.compact),
            compact_json: flag("compact_json", defaults.compact_json),
            include_pagination: flag("include_pagination", defaults.include_pagination),
            verbose: flag("verbose", defaults.verbose),
        }
    }
}

/// How the upstream call was paged, for pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// Page-number paging (GitHub)
    Page { page: u64, per_page: u64 },
    /// Offset paging (JIRA)
    Offset { start_at: u64, max_results: u64 },
}

/// Apply the kind's extractor when `options.compact` is set.
///
/// Sequences are reduced element-wise in order. A GitHub search result
/// (`{total_count, items}`) keeps its total and reduces `items`.
pub fn compact(raw: Value, kind: ResourceKind, options: &CompactOptions) -> Value {
    if !options.compact {
        return raw;
    }
    match raw {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| extract::extract(kind, item))
                .collect(),
        ),
        Value::Object(ref obj)
            if kind != ResourceKind::JiraSearchResult
                && obj.get("items").is_some_and(Value::is_array) =>
        {
            let items = obj
                .get("items")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|item| extract::extract(kind, item))
                        .collect()
                })
                .unwrap_or_default();
            json!({
                "total_count": obj.get("total_count").cloned().unwrap_or(Value::Null),
                "items": Value::Array(items),
            })
        }
        other => extract::extract(kind, &other),
    }
}

/// Compact the array under `field`, keeping the rest of the envelope
/// (Slack's `{ok, channels, response_metadata}` and friends).
pub fn compact_field(
    mut raw: Value,
    field: &str,
    kind: ResourceKind,
    options: &CompactOptions,
) -> Value {
    if !options.compact {
        return raw;
    }
    if let Some(slot) = raw.get_mut(field) {
        if slot.is_array() {
            *slot = compact(slot.take(), kind, options);
        }
    }
    raw
}

/// Attach pagination metadata.
///
/// * bare sequence: wrapped as `{items, pagination: {page, per_page, total_items}}`,
///   `total_items` is the length when the page came back short, else `"unknown"`
/// * `{items, total_count}`: `total_items` is `total_count`
/// * `{issues, total}`: offset metadata with `pageCount` and `currentPage`
///
/// Anything else is returned unchanged.
pub fn paginate(value: Value, page: PageRequest) -> Value {
    match (value, page) {
        (Value::Array(items), PageRequest::Page { page, per_page }) => {
            let len = items.len() as u64;
            let total_items = if len >= per_page {
                json!("unknown")
            } else {
                json!(len)
            };
            json!({
                "items": items,
                "pagination": {
                    "page": page,
                    "per_page": per_page,
                    "total_items": total_items,
                }
            })
        }
        (Value::Object(mut obj), PageRequest::Page { page, per_page })
            if obj.contains_key("items") =>
        {
            let total = obj.get("total_count").cloned().unwrap_or(Value::Null);
            obj.insert(
                "pagination".into(),
                json!({"page": page, "per_page": per_page, "total_items": total}),
            );
            Value::Object(obj)
        }
        (
            Value::Object(mut obj),
            PageRequest::Offset {
                start_at,
                max_results,
            },
        ) if obj.contains_key("issues") => {
            let total = obj.get("total").and_then(Value::as_u64).unwrap_or(0);
            let (page_count, current_page) = if max_results == 0 {
                (0, 1)
            } else {
                (total.div_ceil(max_results), start_at / max_results + 1)
            };
            obj.insert(
                "pagination".into(),
                json!({
                    "startAt": start_at,
                    "maxResults": max_results,
                    "total": total,
                    "pageCount": page_count,
                    "currentPage": current_page,
                }),
            );
            Value::Object(obj)
        }
        (other, _) => other,
    }
}

/// Serialize with the requested density. Formatting only; both forms parse
/// to the same value.
pub fn render(value: &Value, options: &CompactOptions) -> String {
    if options.compact_json {
        serde_json::to_string(value).unwrap_or_default()
    } else {
        serde_json::to_string_pretty(value).unwrap_or_default()
    }
}

/// Full pipeline: compact, paginate when requested, render, wrap
pub fn respond(
    raw: Value,
    kind: ResourceKind,
    options: &CompactOptions,
    page: Option<PageRequest>,
) -> ToolCallResult {
    let mut value = compact(raw, kind, options);
    if let (true, Some(page)) = (options.include_pagination, page) {
        value = paginate(value, page);
    }
    ToolCallResult::success(render(&value, options))
}

/// Render an already-shaped value
pub fn respond_value(value: &Value, options: &CompactOptions) -> ToolCallResult {
    ToolCallResult::success(render(value, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prs(n: usize) -> Value {
        Value::Array(
            (0..n)
                .map(|i| {
                    json!({
                        "number": i,
                        "title": format!("PR {}", i),
                        "state": "open",
                        "body": "ignored",
                        "user": {"login": "dev", "site_admin": false},
                        "labels": [],
                        "head": {"sha": "abc"},
                    })
                })
                .collect(),
        )
    }

    #[test]
    fn test_compact_false_is_passthrough() {
        let raw = prs(3);
        let options = CompactOptions {
            compact: false,
            ..Default::default()
        };
        assert_eq!(compact(raw.clone(), ResourceKind::PullRequest, &options), raw);
    }

    #[test]
    fn test_compact_preserves_order() {
        let out = compact(prs(5), ResourceKind::PullRequest, &CompactOptions::default());
        let numbers: Vec<u64> = out
            .as_array()
            .unwrap()
            .iter()
            .map(|pr| pr["number"].as_u64().unwrap())
            .collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
        assert!(out[0].get("head").is_none());
        assert!(out[0].get("body").is_none());
    }

    #[test]
    fn test_search_result_keeps_total() {
        let raw = json!({"total_count": 57, "incomplete_results": false, "items": prs(2)});
        let out = compact(raw, ResourceKind::PullRequest, &CompactOptions::default());
        assert_eq!(out["total_count"], 57);
        assert_eq!(out["items"].as_array().unwrap().len(), 2);
        assert!(out.get("incomplete_results").is_none());
    }

    #[test]
    fn test_pagination_unknown_when_page_full() {
        let out = paginate(prs(10), PageRequest::Page { page: 1, per_page: 10 });
        assert_eq!(out["pagination"]["total_items"], "unknown");
        assert_eq!(out["items"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn test_pagination_exact_when_page_short() {
        let out = paginate(prs(4), PageRequest::Page { page: 1, per_page: 10 });
        assert_eq!(out["pagination"]["total_items"], 4);
        assert_eq!(out["pagination"]["per_page"], 10);
    }

    #[test]
    fn test_pagination_search_total() {
        let raw = json!({"total_count": 31, "items": []});
        let out = paginate(raw, PageRequest::Page { page: 1, per_page: 10 });
        assert_eq!(out["pagination"]["total_items"], 31);
    }

    #[test]
    fn test_pagination_offset_page_count() {
        let raw = json!({"total": 57, "issues": []});
        let out = paginate(
            raw,
            PageRequest::Offset {
                start_at: 20,
                max_results: 20,
            },
        );
        assert_eq!(out["pagination"]["pageCount"], 3);
        assert_eq!(out["pagination"]["currentPage"], 2);
        assert_eq!(out["pagination"]["total"], 57);
    }

    #[test]
    fn test_pagination_zero_page_size() {
        let raw = json!({"total": 5, "issues": []});
        let out = paginate(
            raw,
            PageRequest::Offset {
                start_at: 0,
                max_results: 0,
            },
        );
        assert_eq!(out["pagination"]["pageCount"], 0);
    }

    #[test]
    fn test_pagination_only_when_requested() {
        let result = respond(
            prs(2),
            ResourceKind::PullRequest,
            &CompactOptions::default(),
            Some(PageRequest::Page { page: 1, per_page: 10 }),
        );
        let value: Value = serde_json::from_str(result.text()).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn test_render_density_only() {
        let value = compact(prs(2), ResourceKind::PullRequest, &CompactOptions::default());
        let dense = render(&value, &CompactOptions::default());
        let pretty = render(
            &value,
            &CompactOptions {
                compact_json: false,
                ..Default::default()
            },
        );
        assert!(!dense.contains('\n'));
        assert!(!dense.contains(": "));
        assert!(pretty.contains("\n  {"));
        let a: Value = serde_json::from_str(&dense).unwrap();
        let b: Value = serde_json::from_str(&pretty).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_compact_field_keeps_envelope() {
        let raw = json!({
            "ok": true,
            "messages": [{"ts": "1.0", "user": "U1", "text": "hi", "blocks": [{}]}],
            "response_metadata": {"next_cursor": "abc"},
        });
        let out = compact_field(
            raw,
            "messages",
            ResourceKind::ChatMessage,
            &CompactOptions::default(),
        );
        assert_eq!(out["ok"], true);
        assert_eq!(out["response_metadata"]["next_cursor"], "abc");
        assert_eq!(out["messages"][0]["text"], "hi");
        assert!(out["messages"][0].get("blocks").is_none());
    }

    #[test]
    fn test_options_from_args() {
        let args = json!({"compact": false, "include_pagination": true, "verbose": "yes"});
        let options = CompactOptions::from_args(args.as_object().unwrap());
        assert!(!options.compact);
        assert!(options.compact_json);
        assert!(options.include_pagination);
        assert!(!options.verbose);
    }
}
