//! Google OAuth2 for the Calendar integration
//!
//! Two pieces:
//! 1. [`RefreshTokenProvider`] trades the long-lived refresh token for short
//!    access tokens and caches them until shortly before expiry.
//! 2. [`GoogleAuthFlow`] runs the one-time consent flow that produces the
//!    refresh token in the first place (`devlink google-auth`).

use super::{Service, UpstreamError};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const CALENDAR_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
];

/// Refresh this long before the token actually expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Source of bearer tokens for Google APIs
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, UpstreamError>;
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub struct RefreshTokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cached: Mutex<Option<CachedToken>>,
}

impl RefreshTokenProvider {
    pub fn new(
        http: reqwest::Client,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Self {
        Self {
            http,
            token_url: token_url.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            refresh_token: refresh_token.to_string(),
            cached: Mutex::new(None),
        }
    }

    async fn refresh(&self) -> Result<TokenResponse, UpstreamError> {
        let service = Service::GoogleCalendar;
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| UpstreamError::transport(service, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::transport(service, e))?;

        if !status.is_success() {
            let reason = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{} ({})", e.error, desc),
                    None => e.error,
                })
                .unwrap_or(body);
            return Err(UpstreamError::api(
                service,
                format!("token refresh failed: {}", reason),
            ));
        }

        serde_json::from_str(&body).map_err(|e| UpstreamError::Decode {
            service,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl AccessTokenProvider for RefreshTokenProvider {
    async fn access_token(&self) -> Result<String, UpstreamError> {
        let mut cached = self.cached.lock().await;
        if let Some(ref token) = *cached {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Refreshing Google access token");
        let token = self.refresh().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(token.access_token)
    }
}

/// Authorization-code flow used once to mint a refresh token
pub struct GoogleAuthFlow {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    http_client: reqwest::Client,
}

impl GoogleAuthFlow {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        token_url: &str,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            token_url: token_url.to_string(),
            http_client,
        }
    }

    /// Consent URL. `access_type=offline` and `prompt=consent` make Google
    /// return a refresh token on every exchange.
    pub fn auth_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&CALENDAR_SCOPES.join(" ")),
        )
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("Failed to request Google token")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "no body".to_string());
            bail!("Google token exchange failed ({}): {}", status, body);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse Google token response")?;

        info!(
            has_refresh_token = token.refresh_token.is_some(),
            "Google authorization code exchanged"
        );
        Ok(token)
    }
}

// ============================================================================
// Local redirect receiver
// ============================================================================

pub const CALLBACK_PATH: &str = "/oauth2callback";

/// Outcome of the consent screen: the authorization code, or Google's error
pub type CallbackOutcome = std::result::Result<String, String>;

type CodeSlot = Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>;

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// Router answering Google's redirect. The first callback is forwarded to
/// `tx`; later ones are ignored.
pub fn callback_router(tx: oneshot::Sender<CallbackOutcome>) -> Router {
    let slot: CodeSlot = Arc::new(Mutex::new(Some(tx)));
    Router::new()
        .route(CALLBACK_PATH, get(oauth2_callback))
        .with_state(slot)
}

async fn oauth2_callback(
    State(slot): State<CodeSlot>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    let (status, page, outcome) = match (params.code, params.error) {
        (Some(code), _) => (
            StatusCode::OK,
            "<h1>Authorization complete</h1><p>You can close this window.</p>",
            Ok(code),
        ),
        (None, error) => (
            StatusCode::BAD_REQUEST,
            "<h1>Authorization failed</h1><p>Please try again.</p>",
            Err(error.unwrap_or_else(|| "no authorization code in callback".to_string())),
        ),
    };

    match slot.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(outcome);
        }
        None => warn!("Ignoring repeated OAuth callback"),
    }
    (status, Html(page))
}

/// Listen on `127.0.0.1:port` until Google redirects back, then stop.
pub async fn receive_code(port: u16) -> Result<String> {
    let (tx, rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind 127.0.0.1:{}", port))?;
    info!(port, "Waiting for Google OAuth callback");

    let server = tokio::spawn(async move {
        axum::serve(listener, callback_router(tx))
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let outcome = rx
        .await
        .context("Callback server stopped before receiving a response")?;
    let _ = stop_tx.send(());
    if let Ok(Err(e)) = server.await {
        warn!("Callback server error: {}", e);
    }

    outcome.map_err(|e| anyhow!("Google authorization failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt; // for `oneshot`

    fn flow() -> GoogleAuthFlow {
        GoogleAuthFlow::new(
            "123456.apps.googleusercontent.com",
            "secret123",
            "http://localhost:3000/oauth2callback",
            GOOGLE_TOKEN_URL,
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_auth_url_requests_offline_calendar_access() {
        let url = flow().auth_url();
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=123456.apps.googleusercontent.com"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Foauth2callback"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("auth%2Fcalendar.events"));
    }

    #[test]
    fn test_token_response_without_refresh_token() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token":"ya29.x","expires_in":3599,"token_type":"Bearer"}"#)
                .unwrap();
        assert_eq!(token.access_token, "ya29.x");
        assert!(token.refresh_token.is_none());
        assert_eq!(token.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_callback_forwards_code() {
        let (tx, rx) = oneshot::channel();
        let app = callback_router(tx);
        let req = Request::builder()
            .uri("/oauth2callback?code=4%2F0Abc&scope=calendar")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(rx.await.unwrap(), Ok("4/0Abc".to_string()));
    }

    #[tokio::test]
    async fn test_callback_forwards_denial() {
        let (tx, rx) = oneshot::channel();
        let app = callback_router(tx);
        let req = Request::builder()
            .uri("/oauth2callback?error=access_denied")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rx.await.unwrap(), Err("access_denied".to_string()));
    }
}
