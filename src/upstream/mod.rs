//! Upstream API clients
//!
//! One async trait per third-party service, each with a `reqwest`
//! implementation. Handlers only see the traits, bundled in
//! [`Integrations`], so tests can swap in fakes or point the real clients at
//! a mock server.

pub mod calendar;
pub mod github;
pub mod google_oauth;
pub mod jira;
pub mod slack;

pub use calendar::{CalendarApi, EventQuery, GoogleCalendarClient};
pub use github::{CommitQuery, GitHubApi, GitHubClient, IssueQuery, PullQuery, SearchQuery};
pub use jira::{JiraApi, JiraClient, JiraSearch};
pub use slack::{SlackApi, SlackClient};

use crate::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Third-party service behind a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    GitHub,
    Jira,
    Slack,
    GoogleCalendar,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Service::GitHub => "GitHub",
            Service::Jira => "JIRA",
            Service::Slack => "Slack",
            Service::GoogleCalendar => "Google Calendar",
        })
    }
}

/// Failure talking to a third-party API. Never retried.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} integration is not configured (set {hint})")]
    NotConfigured { service: Service, hint: &'static str },

    #[error("{service} API error: {status}\nResponse: {body}")]
    Status {
        service: Service,
        status: u16,
        body: String,
    },

    #[error("{service} API error: {message}")]
    Api { service: Service, message: String },

    #[error("{service} API request timed out")]
    Timeout { service: Service },

    #[error("{service} API request failed: {source}")]
    Transport {
        service: Service,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} API returned an unreadable response: {message}")]
    Decode { service: Service, message: String },
}

impl UpstreamError {
    pub fn service(&self) -> Service {
        match self {
            UpstreamError::NotConfigured { service, .. }
            | UpstreamError::Status { service, .. }
            | UpstreamError::Api { service, .. }
            | UpstreamError::Timeout { service }
            | UpstreamError::Transport { service, .. }
            | UpstreamError::Decode { service, .. } => *service,
        }
    }

    pub fn api(service: Service, message: impl Into<String>) -> Self {
        UpstreamError::Api {
            service,
            message: message.into(),
        }
    }

    /// Classify a `reqwest` failure; timeouts get their own variant
    pub fn transport(service: Service, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout { service }
        } else {
            UpstreamError::Transport {
                service,
                source: err,
            }
        }
    }
}

/// Turn a response into JSON, mapping non-2xx statuses to
/// [`UpstreamError::Status`] with the body attached.
pub(crate) async fn read_json(
    service: Service,
    response: reqwest::Response,
) -> Result<Value, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "no body".to_string());
        return Err(UpstreamError::Status {
            service,
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| UpstreamError::Decode {
            service,
            message: e.to_string(),
        })
}

/// Shared HTTP client with the configured request timeout
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Capability bundle handed to the tool dispatcher.
///
/// An absent integration makes its tools answer with an error envelope
/// naming the missing configuration.
#[derive(Clone, Default)]
pub struct Integrations {
    pub github: Option<Arc<dyn GitHubApi>>,
    pub jira: Option<Arc<dyn JiraApi>>,
    pub slack: Option<Arc<dyn SlackApi>>,
    pub calendar: Option<Arc<dyn CalendarApi>>,
}

impl Integrations {
    /// Build every integration whose credentials are present in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = http_client(Duration::from_secs(config.upstream_timeout_secs))?;

        let github: Arc<dyn GitHubApi> = Arc::new(GitHubClient::new(
            http.clone(),
            &config.github_api_url,
            config.github_token.clone(),
        ));
        if config.github_token.is_some() {
            info!("GitHub integration enabled (authenticated)");
        } else {
            warn!("GITHUB_TOKEN not set, GitHub requests are unauthenticated");
        }

        let jira = match (
            &config.jira_base_url,
            &config.jira_email,
            &config.jira_api_token,
        ) {
            (Some(base), Some(email), Some(token)) => {
                info!(base_url = %base, "JIRA integration enabled");
                Some(Arc::new(JiraClient::new(http.clone(), base, email, token)) as Arc<dyn JiraApi>)
            }
            _ => None,
        };

        let slack = config.slack_bot_token.as_ref().map(|token| {
            info!("Slack integration enabled");
            Arc::new(SlackClient::new(
                http.clone(),
                &config.slack_api_url,
                token,
                config.slack_team_id.clone(),
            )) as Arc<dyn SlackApi>
        });

        let calendar = match (
            &config.google_client_id,
            &config.google_client_secret,
            &config.google_refresh_token,
        ) {
            (Some(id), Some(secret), Some(refresh)) => {
                info!("Google Calendar integration enabled");
                let tokens = google_oauth::RefreshTokenProvider::new(
                    http.clone(),
                    &config.google_token_url,
                    id,
                    secret,
                    refresh,
                );
                Some(Arc::new(GoogleCalendarClient::new(
                    http,
                    &config.google_calendar_api_url,
                    Arc::new(tokens),
                )) as Arc<dyn CalendarApi>)
            }
            _ => None,
        };

        Ok(Self {
            github: Some(github),
            jira,
            slack,
            calendar,
        })
    }

    pub fn github(&self) -> Result<&dyn GitHubApi, UpstreamError> {
        self.github
            .as_deref()
            .ok_or(UpstreamError::NotConfigured {
                service: Service::GitHub,
                hint: "GITHUB_TOKEN",
            })
    }

    pub fn jira(&self) -> Result<&dyn JiraApi, UpstreamError> {
        self.jira.as_deref().ok_or(UpstreamError::NotConfigured {
            service: Service::Jira,
            hint: "JIRA_BASE_URL, JIRA_EMAIL and JIRA_API_TOKEN",
        })
    }

    pub fn slack(&self) -> Result<&dyn SlackApi, UpstreamError> {
        self.slack.as_deref().ok_or(UpstreamError::NotConfigured {
            service: Service::Slack,
            hint: "SLACK_BOT_TOKEN",
        })
    }

    pub fn calendar(&self) -> Result<&dyn CalendarApi, UpstreamError> {
        self.calendar
            .as_deref()
            .ok_or(UpstreamError::NotConfigured {
                service: Service::GoogleCalendar,
                hint: "GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET and GOOGLE_REFRESH_TOKEN",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_integrations_report_hint() {
        let integrations = Integrations::default();
        let err = integrations.jira().err().unwrap();
        assert_eq!(err.service(), Service::Jira);
        assert!(err.to_string().contains("JIRA_BASE_URL"));
        assert!(integrations.slack().is_err());
        assert!(integrations.calendar().is_err());

        let err = integrations.github().err().unwrap();
        assert_eq!(
            err.to_string(),
            "GitHub integration is not configured (set GITHUB_TOKEN)"
        );
    }

    #[test]
    fn test_status_error_includes_body() {
        let err = UpstreamError::Status {
            service: Service::GitHub,
            status: 404,
            body: r#"{"message":"Not Found"}"#.into(),
        };
        let text = err.to_string();
        assert!(text.starts_with("GitHub API error: 404"));
        assert!(text.contains("Not Found"));
    }

    #[test]
    fn test_from_config_without_credentials() {
        let config = crate::test_helpers::test_config();
        let integrations = Integrations::from_config(&config).unwrap();
        assert!(integrations.github().is_ok());
        assert!(integrations.jira().is_err());
        assert!(integrations.slack().is_err());
        assert!(integrations.calendar().is_err());
    }
}
