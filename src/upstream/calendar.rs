//! Google Calendar v3 client

use super::google_oauth::AccessTokenProvider;
use super::{read_json, Service, UpstreamError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Query for `GET /calendars/{id}/events`
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub max_results: u32,
    pub q: Option<String>,
    pub single_events: bool,
    pub order_by: Option<String>,
}

impl EventQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(ref t) = self.time_min {
            params.push(("timeMin", t.clone()));
        }
        if let Some(ref t) = self.time_max {
            params.push(("timeMax", t.clone()));
        }
        if self.max_results > 0 {
            params.push(("maxResults", self.max_results.to_string()));
        }
        if let Some(ref q) = self.q {
            params.push(("q", q.clone()));
        }
        if self.single_events {
            params.push(("singleEvents", "true".to_string()));
        }
        // orderBy=startTime is only accepted together with singleEvents
        if let Some(ref order) = self.order_by {
            if self.single_events || order != "startTime" {
                params.push(("orderBy", order.clone()));
            }
        }
        params
    }
}

#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn list_events(&self, calendar_id: &str, query: &EventQuery)
        -> Result<Value, UpstreamError>;

    async fn insert_event(&self, calendar_id: &str, event: &Value) -> Result<Value, UpstreamError>;
}

pub struct GoogleCalendarClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl GoogleCalendarClient {
    pub fn new(http: reqwest::Client, base_url: &str, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    /// Google wraps failures as `{"error": {"code", "message"}}`; anything
    /// else that is not a 2xx keeps its status and raw body.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, UpstreamError> {
        let service = Service::GoogleCalendar;
        let token = self.tokens.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(service, e))?;

        match read_json(service, response).await {
            Err(UpstreamError::Status { status, body, .. }) => {
                let message = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|v| {
                        v.pointer("/error/message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    });
                Err(match message {
                    Some(message) => UpstreamError::api(service, message),
                    None => UpstreamError::Status {
                        service,
                        status,
                        body,
                    },
                })
            }
            other => other,
        }
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
    ) -> Result<Value, UpstreamError> {
        let url = self.events_url(calendar_id);
        debug!(url = %url, "Google Calendar list events");
        self.send(self.http.get(&url).query(&query.params())).await
    }

    async fn insert_event(&self, calendar_id: &str, event: &Value) -> Result<Value, UpstreamError> {
        let url = self.events_url(calendar_id);
        debug!(url = %url, "Google Calendar insert event");
        self.send(self.http.post(&url).json(event)).await
    }
}
