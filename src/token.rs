//! OAuth2 bearer token lifecycle
//!
//! The first request performs a client-credentials exchange; once the access
//! token expires the refresh token is exchanged instead. Both exchanges hit the
//! same token endpoint with the consumer key and secret as basic auth. There is
//! no retry: a failed exchange fails the request that needed the token.

use crate::clock::Clock;
use crate::errors::{Result, StatusError};
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

const GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";
const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// Body returned by the token endpoint
#[derive(Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub scopes: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Currently held credentials
#[derive(Clone, PartialEq, Eq)]
pub struct TokenState {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Grants a valid bearer token to every outbound API call
pub struct TokenManager {
    client: Client,
    token_url: String,
    consumer_key: String,
    consumer_secret: String,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<TokenState>>,
}

impl TokenManager {
    pub fn new(
        client: Client,
        token_url: String,
        consumer_key: String,
        consumer_secret: String,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            token_url,
            consumer_key,
            consumer_secret,
            clock,
            state: Mutex::new(None),
        }
    }

    /// Return an access token that is valid now, exchanging for a new one if needed.
    ///
    /// The state lock is held across the exchange so concurrent callers never
    /// trigger more than one exchange per expiry.
    pub async fn bearer_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let renewed = match state.as_ref() {
            None => {
                info!("Access token does not exist, authenticating");
                Some(self.authorize().await?)
            }
            Some(current) if current.is_expired(now) => match current.refresh_token.as_deref() {
                Some(refresh_token) => {
                    info!("Access token expired, refreshing");
                    Some(self.refresh(refresh_token).await?)
                }
                None => {
                    info!("Access token expired without a refresh token, authenticating");
                    Some(self.authorize().await?)
                }
            },
            Some(_) => None,
        };

        if let Some(renewed) = renewed {
            *state = Some(renewed);
        }

        state
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or_else(|| StatusError::Auth("no access token available".to_string()))
    }

    /// Snapshot of the held token, if any
    pub async fn current(&self) -> Option<TokenState> {
        self.state.lock().await.clone()
    }

    async fn authorize(&self) -> Result<TokenState> {
        self.exchange(&[("grant_type", GRANT_CLIENT_CREDENTIALS)]).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenState> {
        self.exchange(&[
            ("grant_type", GRANT_REFRESH_TOKEN),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn exchange(&self, form: &[(&str, &str)]) -> Result<TokenState> {
        let grant = form.first().map(|(_, v)| *v).unwrap_or_default();
        debug!("Requesting {} grant from {}", grant, self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(StatusError::Auth(format!(
                "{} grant rejected with status {}: {}",
                grant, status, body
            )));
        }

        let token: AccessTokenResponse = serde_json::from_str(&body)?;
        let expires_at = expiry(self.clock.now(), token.expires_in)?;

        info!(
            "Obtained {} access token via {} grant, expires in {}s (scopes: {})",
            token.token_type.as_deref().unwrap_or("bearer"),
            grant,
            token.expires_in,
            token.scopes.as_deref().unwrap_or("-")
        );

        Ok(TokenState {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
        })
    }
}

/// Instant at which a token issued at `issued_at` stops being valid
fn expiry(issued_at: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>> {
    if expires_in < 0 {
        return Err(StatusError::Auth(format!("invalid expires_in {}", expires_in)));
    }

    TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .ok_or_else(|| StatusError::Auth(format!("invalid expires_in {}", expires_in)))
}
