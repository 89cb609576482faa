//! OAuth token lifecycle: refresh-token → access-token exchange and the
//! ensure-valid-token helper used on the request hot path.

use chrono::{DateTime, Duration, Utc};
use gravity_types::models::{Account, AccountStatus};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::store::Store;

const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

// Built-in OAuth client, overridable via GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET.
const DEFAULT_CLIENT_ID: &str =
    "1071006060591-tmhssin2h21lcre235vtolojh4g403ep.apps.googleusercontent.com";
const DEFAULT_CLIENT_SECRET: &str = "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";

/// Tokens are refreshed once they are within this margin of expiry.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

const REFRESH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

fn oauth_credentials() -> (String, String) {
    let client_id = std::env::var("GOOGLE_CLIENT_ID")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
    let client_secret = std::env::var("GOOGLE_CLIENT_SECRET")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CLIENT_SECRET.to_string());
    (client_id, client_secret)
}

/// Exchanges refresh tokens for access tokens against the Google OAuth
/// endpoint. Constructed once per process; tests point it at a mock server.
pub struct TokenRefresher {
    http: reqwest::Client,
    token_url: String,
}

impl TokenRefresher {
    #[allow(clippy::expect_used, reason = "HTTP client is required for the gateway to function")]
    pub fn new() -> Self {
        Self::with_token_url(OAUTH_TOKEN_URL)
    }

    #[allow(clippy::expect_used, reason = "HTTP client is required for the gateway to function")]
    pub fn with_token_url(token_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REFRESH_TIMEOUT)
            .build()
            .expect("failed to create OAuth HTTP client");
        Self { http, token_url: token_url.into() }
    }

    /// Exchange a refresh token for `(access_token, expiry)`.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<(String, DateTime<Utc>)> {
        let (client_id, client_secret) = oauth_credentials();
        let params = [
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.http.post(&self.token_url).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Auth { status: status.as_u16(), body });
        }

        let token: TokenResponse = response.json().await?;
        let expiry = Utc::now() + Duration::seconds(token.expires_in);
        Ok((token.access_token, expiry))
    }

    /// Make sure `account` carries a usable access token, refreshing lazily.
    /// On refresh failure the account is persisted as `expired` before the
    /// error is surfaced.
    pub async fn ensure_valid_token(&self, store: &Store, account: &mut Account) -> AppResult<()> {
        if account.token_fresh_at(Utc::now(), Duration::minutes(EXPIRY_MARGIN_MINUTES)) {
            return Ok(());
        }

        match self.refresh(&account.refresh_token).await {
            Ok((access_token, expiry)) => {
                store.update_token(account.id, &access_token, expiry)?;
                account.access_token = Some(access_token);
                account.token_expiry = Some(expiry);
                Ok(())
            }
            Err(e) => {
                tracing::error!("token refresh failed for {}: {}", account.email, e);
                if let Err(persist_err) =
                    store.update_status(account.id, AccountStatus::Expired)
                {
                    tracing::warn!(
                        "failed to mark account {} expired: {}",
                        account.id,
                        persist_err
                    );
                }
                account.status = AccountStatus::Expired;
                Err(e)
            }
        }
    }
}

impl Default for TokenRefresher {
    fn default() -> Self {
        Self::new()
    }
}
