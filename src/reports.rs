//! Cross-integration reports
//!
//! - PR to JIRA mapping: which pull requests reference which tickets
//! - Activity dashboard: PR, commit and ticket counts over a period

use crate::upstream::{CommitQuery, GitHubApi, JiraApi, JiraSearch, PullQuery, UpstreamError};
use chrono::{DateTime, Duration, Months, SecondsFormat, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, warn};

static JIRA_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z0-9]+-\d+").expect("JIRA key pattern is valid"));

const COMPLETED_STATUSES: &[&str] = &["Done", "Closed", "Resolved"];
const REPORT_PAGE_SIZE: u32 = 100;

/// Every JIRA-style key in `text`, first occurrence order, no duplicates
pub fn extract_jira_keys(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    JIRA_KEY
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Keys from a PR's title then body. Structured (non-string) bodies are skipped.
fn pr_keys(pr: &Value) -> Vec<String> {
    let title = pr.get("title").and_then(Value::as_str).unwrap_or("");
    let body = pr.get("body").and_then(Value::as_str).unwrap_or("");
    extract_jira_keys(&format!("{}\n{}", title, body))
}

// ============================================================================
// PR to JIRA mapping
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingArgs {
    pub owner: String,
    pub repo: String,
    pub project_key: String,
    #[serde(default)]
    pub since: Option<String>,
    #[serde(deserialize_with = "crate::mcp::validate::count::page_size")]
    pub max_results: u32,
}

/// Map recent PRs to the tickets of one JIRA project.
///
/// A JIRA failure (or no JIRA at all) is tolerated: the referenced issues are
/// then reported as bare `{key}` entries.
pub async fn map_prs_to_issues(
    github: &dyn GitHubApi,
    jira: Option<&dyn JiraApi>,
    args: &MappingArgs,
) -> Result<Value, UpstreamError> {
    let query = PullQuery {
        state: "all".into(),
        sort: "updated".into(),
        direction: "desc".into(),
        per_page: args.max_results,
        since: args.since.clone(),
    };
    let pulls = github.pulls(&args.owner, &args.repo, &query).await?;
    let pulls = pulls.as_array().map(Vec::as_slice).unwrap_or_default();
    debug!(count = pulls.len(), "Fetched pull requests for mapping");

    let prefix = format!("{}-", args.project_key);
    let mut mapped: Vec<(&Value, Vec<String>)> = Vec::new();
    let mut all_keys: Vec<String> = Vec::new();
    for pr in pulls {
        let keys: Vec<String> = pr_keys(pr)
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .collect();
        if keys.is_empty() {
            continue;
        }
        for key in &keys {
            if !all_keys.contains(key) {
                all_keys.push(key.clone());
            }
        }
        mapped.push((pr, keys));
    }

    let details = match jira {
        Some(jira) if !all_keys.is_empty() => fetch_issue_details(jira, &all_keys).await,
        None if !all_keys.is_empty() => {
            warn!("JIRA is not configured, mapping without issue details");
            HashMap::new()
        }
        _ => HashMap::new(),
    };

    let mappings: Vec<Value> = mapped
        .into_iter()
        .map(|(pr, keys)| {
            let issues: Vec<Value> = keys
                .iter()
                .map(|key| {
                    details
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| json!({"key": key}))
                })
                .collect();
            json!({
                "pr_number": pr.get("number").cloned().unwrap_or(Value::Null),
                "pr_title": pr.get("title").cloned().unwrap_or(Value::Null),
                "pr_state": pr.get("state").cloned().unwrap_or(Value::Null),
                "pr_url": pr.get("html_url").cloned().unwrap_or(Value::Null),
                "pr_created_at": pr.get("created_at").cloned().unwrap_or(Value::Null),
                "pr_updated_at": pr.get("updated_at").cloned().unwrap_or(Value::Null),
                "pr_merged_at": pr.get("merged_at").cloned().unwrap_or(Value::Null),
                "pr_user": pr.pointer("/user/login").cloned().unwrap_or(Value::Null),
                "jira_keys": keys,
                "jira_issues": issues,
            })
        })
        .collect();

    Ok(json!({
        "repository": format!("{}/{}", args.owner, args.repo),
        "jira_project": args.project_key,
        "total_mapped_prs": mappings.len(),
        "total_jira_issues": all_keys.len(),
        "mappings": mappings,
    }))
}

async fn fetch_issue_details(jira: &dyn JiraApi, keys: &[String]) -> HashMap<String, Value> {
    let search = JiraSearch::new(format!("key in ({})", keys.join(",")), REPORT_PAGE_SIZE)
        .fields(&["summary", "status", "assignee", "priority"]);
    debug!(jql = %search.jql, "Fetching referenced JIRA issues");

    let result = match jira.search(&search).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "JIRA lookup failed, continuing with bare keys");
            return HashMap::new();
        }
    };

    result
        .get("issues")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|issue| {
            let key = issue.get("key")?.as_str()?.to_string();
            let fields = issue.get("fields").unwrap_or(&Value::Null);
            let summary = json!({
                "key": key,
                "summary": fields.get("summary").cloned().unwrap_or(Value::Null),
                "status": fields.pointer("/status/name").cloned().unwrap_or(Value::Null),
                "assignee": fields.pointer("/assignee/displayName").cloned().unwrap_or(Value::Null),
                "priority": fields.pointer("/priority/name").cloned().unwrap_or(Value::Null),
            });
            Some((key, summary))
        })
        .collect()
}

// ============================================================================
// Dashboard
// ============================================================================

/// Reporting window, counted back from now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    /// Unknown names fall back to `Month`
    pub fn parse(s: &str) -> Self {
        match s {
            "day" => Period::Day,
            "week" => Period::Week,
            "quarter" => Period::Quarter,
            "year" => Period::Year,
            _ => Period::Month,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Quarter => "quarter",
            Period::Year => "year",
        }
    }

    /// `(start, end)` with `end == now`
    pub fn range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let back = |months: u32, fallback_days: i64| {
            now.checked_sub_months(Months::new(months))
                .unwrap_or(now - Duration::days(fallback_days))
        };
        let start = match self {
            Period::Day => now - Duration::days(1),
            Period::Week => now - Duration::days(7),
            Period::Month => back(1, 30),
            Period::Quarter => back(3, 91),
            Period::Year => back(12, 365),
        };
        (start, now)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardArgs {
    pub owner: String,
    pub repos: Vec<String>,
    pub project_keys: Vec<String>,
    pub period: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct Contribution {
    prs: u64,
    commits: u64,
    reviews: u64,
}

impl Contribution {
    fn total(&self) -> u64 {
        self.prs + self.commits + self.reviews
    }
}

/// Contributor tallies in first-seen order
#[derive(Default)]
struct Contributors {
    order: Vec<String>,
    stats: HashMap<String, Contribution>,
}

impl Contributors {
    fn entry(&mut self, name: &str) -> &mut Contribution {
        if !self.stats.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.stats.entry(name.to_string()).or_default()
    }

    /// Ranked by total contributions, ties keep first-seen order
    fn ranked(self) -> Vec<Value> {
        let mut rows: Vec<(String, Contribution)> = self
            .order
            .into_iter()
            .filter_map(|name| {
                let stats = *self.stats.get(&name)?;
                Some((name, stats))
            })
            .collect();
        rows.sort_by(|a, b| b.1.total().cmp(&a.1.total()));
        rows.into_iter()
            .map(|(name, c)| {
                json!({
                    "name": name,
                    "prs": c.prs,
                    "commits": c.commits,
                    "reviews": c.reviews,
                    "total_contributions": c.total(),
                })
            })
            .collect()
    }
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn updated_within(pr: &Value, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    pr.get("updated_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| {
            let t = t.with_timezone(&Utc);
            t >= start && t <= end
        })
        .unwrap_or(false)
}

fn is_completed(issue: &Value) -> bool {
    issue
        .pointer("/fields/status/name")
        .and_then(Value::as_str)
        .is_some_and(|name| COMPLETED_STATUSES.contains(&name))
}

/// Activity summary across repositories and JIRA projects.
///
/// Never fails as a whole: a repository or project whose upstream call fails
/// is skipped with a warning.
pub async fn dashboard_summary(
    github: &dyn GitHubApi,
    jira: Option<&dyn JiraApi>,
    args: &DashboardArgs,
    now: DateTime<Utc>,
) -> Value {
    let period = Period::parse(&args.period);
    let (start, end) = period.range(now);
    let (start_iso, end_iso) = (iso(start), iso(end));
    debug!(period = period.as_str(), start = %start_iso, end = %end_iso, "Dashboard window");

    let mut contributors = Contributors::default();
    let mut repositories = Vec::new();
    let (mut total_prs, mut total_commits) = (0usize, 0usize);

    for repo in &args.repos {
        let full_name = format!("{}/{}", args.owner, repo);
        let pulls_query = PullQuery {
            state: "all".into(),
            sort: "updated".into(),
            direction: "desc".into(),
            per_page: REPORT_PAGE_SIZE,
            since: None,
        };
        let pulls = match github.pulls(&args.owner, repo, &pulls_query).await {
            Ok(pulls) => pulls,
            Err(e) => {
                warn!(repo = %full_name, error = %e, "Skipping repository (pull requests)");
                continue;
            }
        };
        let commits_query = CommitQuery {
            since: Some(start_iso.clone()),
            until: Some(end_iso.clone()),
            per_page: REPORT_PAGE_SIZE,
            ..Default::default()
        };
        let commits = match github.commits(&args.owner, repo, &commits_query).await {
            Ok(commits) => commits,
            Err(e) => {
                warn!(repo = %full_name, error = %e, "Skipping repository (commits)");
                continue;
            }
        };

        let prs: Vec<&Value> = pulls
            .as_array()
            .into_iter()
            .flatten()
            .filter(|pr| updated_within(pr, start, end))
            .collect();
        let commits = commits.as_array().map(Vec::as_slice).unwrap_or_default();

        for pr in &prs {
            if let Some(login) = pr.pointer("/user/login").and_then(Value::as_str) {
                contributors.entry(login).prs += 1;
            }
        }
        for commit in commits {
            if let Some(login) = commit.pointer("/author/login").and_then(Value::as_str) {
                contributors.entry(login).commits += 1;
            }
        }

        repositories.push(json!({
            "repo": full_name,
            "pr_count": prs.len(),
            "commit_count": commits.len(),
        }));
        total_prs += prs.len();
        total_commits += commits.len();
    }

    let mut projects = Vec::new();
    let (mut total_issues, mut completed_issues) = (0usize, 0usize);

    match jira {
        None if !args.project_keys.is_empty() => {
            warn!("JIRA is not configured, dashboard has no ticket data");
        }
        None => {}
        Some(jira) => {
            for key in &args.project_keys {
                let jql = format!(
                    "project = {} AND updated >= \"{}\" AND updated <= \"{}\" ORDER BY updated DESC",
                    key,
                    start.format("%Y-%m-%d"),
                    end.format("%Y-%m-%d"),
                );
                let search = JiraSearch::new(jql, REPORT_PAGE_SIZE).fields(&[
                    "summary", "status", "assignee", "priority", "created", "updated",
                ]);
                let result = match jira.search(&search).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(project = %key, error = %e, "Skipping JIRA project");
                        continue;
                    }
                };
                let issues = result
                    .get("issues")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let completed = issues.iter().filter(|i| is_completed(i)).count();

                projects.push(json!({
                    "project_key": key,
                    "total_issues": issues.len(),
                    "completed_issues": completed,
                }));
                total_issues += issues.len();
                completed_issues += completed;
            }
        }
    }

    let completion_rate = if total_issues > 0 {
        format!(
            "{:.2}%",
            completed_issues as f64 / total_issues as f64 * 100.0
        )
    } else {
        "0%".to_string()
    };

    json!({
        "period": {
            "type": period.as_str(),
            "start_date": start_iso,
            "end_date": end_iso,
        },
        "github_summary": {
            "total_prs": total_prs,
            "total_commits": total_commits,
            "repositories": repositories,
        },
        "jira_summary": {
            "total_issues": total_issues,
            "completed_issues": completed_issues,
            "completion_rate": completion_rate,
            "projects": projects,
        },
        "contributor_summary": contributors.ranked(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::Canned;
    use crate::upstream::Service;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn mapping_args() -> MappingArgs {
        MappingArgs {
            owner: "acme".into(),
            repo: "web".into(),
            project_key: "PROJ".into(),
            since: None,
            max_results: 30,
        }
    }

    fn dashboard_args(repos: &[&str], projects: &[&str]) -> DashboardArgs {
        DashboardArgs {
            owner: "acme".into(),
            repos: repos.iter().map(|r| r.to_string()).collect(),
            project_keys: projects.iter().map(|p| p.to_string()).collect(),
            period: "month".into(),
        }
    }

    #[test]
    fn test_extract_jira_keys_dedup_in_order() {
        let keys = extract_jira_keys("PROJ-12: fix login (see PROJ-3, PROJ-12 and OPS-7)");
        assert_eq!(keys, vec!["PROJ-12", "PROJ-3", "OPS-7"]);
        assert!(extract_jira_keys("no tickets here").is_empty());
    }

    #[test]
    fn test_pr_keys_ignores_structured_body() {
        let pr = json!({"title": "PROJ-1 title", "body": {"type": "doc"}});
        assert_eq!(pr_keys(&pr), vec!["PROJ-1"]);
        let pr = json!({"title": "PROJ-1 title", "body": "also PROJ-2"});
        assert_eq!(pr_keys(&pr), vec!["PROJ-1", "PROJ-2"]);
    }

    #[test]
    fn test_period_ranges() {
        let (start, end) = Period::Day.range(now());
        assert_eq!(end, now());
        assert_eq!(start, now() - Duration::days(1));
        let (start, _) = Period::Quarter.range(now());
        assert_eq!(start, Utc.with_ymd_and_hms(2023, 12, 15, 12, 0, 0).unwrap());
        let (start, _) = Period::Year.range(now());
        assert_eq!(start, Utc.with_ymd_and_hms(2023, 3, 15, 12, 0, 0).unwrap());
        assert_eq!(Period::parse("fortnight"), Period::Month);
    }

    #[tokio::test]
    async fn test_mapping_filters_to_project_and_fetches_details() {
        let github = Canned::new(Service::GitHub).with(
            "pulls",
            json!([
                {"number": 1, "title": "PROJ-1 add login", "body": "Relates to OPS-9 and PROJ-2",
                 "state": "open", "html_url": "u1", "user": {"login": "alice"}},
                {"number": 2, "title": "chore: bump deps", "body": null, "state": "closed"},
                {"number": 3, "title": "PROJ-2 follow-up", "body": {"structured": true},
                 "state": "closed", "merged_at": "2024-03-01T00:00:00Z"},
            ]),
        );
        let jira = Canned::new(Service::Jira).with(
            "search",
            json!({"total": 1, "issues": [
                {"key": "PROJ-1", "fields": {
                    "summary": "Login", "status": {"name": "In Progress"},
                    "assignee": {"displayName": "Alice"}, "priority": null}}
            ]}),
        );

        let result = map_prs_to_issues(&github, Some(&jira), &mapping_args())
            .await
            .unwrap();

        assert_eq!(result["repository"], "acme/web");
        assert_eq!(result["total_mapped_prs"], 2);
        assert_eq!(result["total_jira_issues"], 2);
        let first = &result["mappings"][0];
        assert_eq!(first["jira_keys"], json!(["PROJ-1", "PROJ-2"]));
        assert_eq!(first["pr_user"], "alice");
        assert_eq!(first["jira_issues"][0]["status"], "In Progress");
        assert_eq!(first["jira_issues"][0]["assignee"], "Alice");
        assert_eq!(first["jira_issues"][1], json!({"key": "PROJ-2"}));
        assert_eq!(result["mappings"][1]["pr_user"], Value::Null);

        let calls = github.calls();
        assert!(calls[0].contains("state=all sort=updated direction=desc per_page=30"));
        assert!(jira.calls()[0].contains("jql=key in (PROJ-1,PROJ-2)"));
    }

    #[tokio::test]
    async fn test_mapping_tolerates_jira_failure() {
        let github = Canned::new(Service::GitHub)
            .with("pulls", json!([{"number": 7, "title": "PROJ-7 fix", "state": "open"}]));
        let jira = Canned::new(Service::Jira).failing("search", 500);

        let result = map_prs_to_issues(&github, Some(&jira), &mapping_args())
            .await
            .unwrap();
        assert_eq!(result["mappings"][0]["jira_issues"], json!([{"key": "PROJ-7"}]));

        let result = map_prs_to_issues(&github, None, &mapping_args()).await.unwrap();
        assert_eq!(result["total_jira_issues"], 1);
    }

    #[tokio::test]
    async fn test_mapping_propagates_github_failure() {
        let github = Canned::new(Service::GitHub).failing("pulls", 404);
        let err = map_prs_to_issues(&github, None, &mapping_args())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("GitHub API error: 404"));
    }

    #[tokio::test]
    async fn test_dashboard_counts_and_ranking() {
        let github = Canned::new(Service::GitHub)
            .with(
                "pulls",
                json!([
                    {"number": 1, "updated_at": "2024-03-10T00:00:00Z", "user": {"login": "bob"}},
                    {"number": 2, "updated_at": "2024-03-01T00:00:00Z", "user": {"login": "alice"}},
                    {"number": 3, "updated_at": "2023-12-01T00:00:00Z", "user": {"login": "carol"}},
                ]),
            )
            .with(
                "commits",
                json!([
                    {"sha": "a", "author": {"login": "alice"}},
                    {"sha": "b", "author": {"login": "alice"}},
                    {"sha": "c", "author": null},
                ]),
            )
            .failing("pulls:acme/broken", 500);
        let jira = Canned::new(Service::Jira)
            .with(
                "search~project = PROJ ",
                json!({"issues": [
                    {"key": "PROJ-1", "fields": {"status": {"name": "Done"}}},
                    {"key": "PROJ-2", "fields": {"status": {"name": "Resolved"}}},
                    {"key": "PROJ-3", "fields": {"status": {"name": "To Do"}}},
                ]}),
            )
            .failing("search~project = GONE ", 400);

        let summary = dashboard_summary(
            &github,
            Some(&jira),
            &dashboard_args(&["web", "broken"], &["PROJ", "GONE"]),
            now(),
        )
        .await;

        assert_eq!(summary["period"]["type"], "month");
        assert_eq!(summary["period"]["start_date"], "2024-02-15T12:00:00.000Z");
        assert_eq!(summary["period"]["end_date"], "2024-03-15T12:00:00.000Z");

        let gh = &summary["github_summary"];
        assert_eq!(gh["total_prs"], 2);
        assert_eq!(gh["total_commits"], 3);
        assert_eq!(gh["repositories"].as_array().unwrap().len(), 1);
        assert_eq!(gh["repositories"][0]["repo"], "acme/web");

        let js = &summary["jira_summary"];
        assert_eq!(js["total_issues"], 3);
        assert_eq!(js["completed_issues"], 2);
        assert_eq!(js["completion_rate"], "66.67%");
        assert_eq!(js["projects"].as_array().unwrap().len(), 1);

        let ranked = summary["contributor_summary"].as_array().unwrap();
        assert_eq!(ranked[0]["name"], "alice");
        assert_eq!(ranked[0]["total_contributions"], 3);
        assert_eq!(ranked[1]["name"], "bob");
        assert_eq!(ranked[1]["reviews"], 0);
        assert_eq!(ranked.len(), 2);

        let searches = jira.calls();
        assert!(searches[0].contains(
            "project = PROJ AND updated >= \"2024-02-15\" AND updated <= \"2024-03-15\" ORDER BY updated DESC"
        ));
        assert!(github
            .calls()
            .iter()
            .any(|c| c.contains("since=Some(\"2024-02-15T12:00:00.000Z\")")));
    }

    #[tokio::test]
    async fn test_dashboard_without_jira_has_zero_rate() {
        let github = Canned::new(Service::GitHub)
            .with("pulls", json!([]))
            .with("commits", json!([]));
        let summary =
            dashboard_summary(&github, None, &dashboard_args(&["web"], &["PROJ"]), now()).await;
        assert_eq!(summary["jira_summary"]["completion_rate"], "0%");
        assert_eq!(summary["jira_summary"]["total_issues"], 0);
        assert!(summary["contributor_summary"].as_array().unwrap().is_empty());
    }
}
