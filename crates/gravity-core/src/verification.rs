//! Account status verification.
//!
//! A check marks the account `checking`, refreshes its token when stale,
//! then probes the upstream model listing to classify the account.

use gravity_types::models::{Account, AccountStatus};

use crate::error::AppResult;
use crate::oauth::TokenRefresher;
use crate::store::Store;

const MODELS_PROBE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Check one account and persist its resulting status.
pub async fn check_account_status(
    store: &Store,
    refresher: &TokenRefresher,
    http: &reqwest::Client,
    id: i64,
) -> AppResult<Account> {
    let mut account = store.get(id)?;
    store.update_status(id, AccountStatus::Checking)?;

    if refresher.ensure_valid_token(store, &mut account).await.is_err() {
        // ensure_valid_token already persisted the expired status.
        return Ok(account);
    }

    let access_token = account.access_token.clone().unwrap_or_default();
    let status = probe_api(http, MODELS_PROBE_URL, &access_token).await;
    store.update_status(id, status)?;
    account.status = status;
    Ok(account)
}

/// Check every stored account; individual failures are logged and skipped.
pub async fn check_all_accounts(
    store: &Store,
    refresher: &TokenRefresher,
    http: &reqwest::Client,
) -> AppResult<()> {
    for account in store.list()? {
        if let Err(e) = check_account_status(store, refresher, http, account.id).await {
            tracing::warn!("status check failed for account {}: {}", account.id, e);
        }
    }
    Ok(())
}

/// Probe the model listing with a bearer token and classify the result.
/// 429 still counts as active: rate limiting is a temporary state, not a
/// status mutation.
pub(crate) async fn probe_api(
    http: &reqwest::Client,
    url: &str,
    access_token: &str,
) -> AccountStatus {
    let response = match http
        .get(url)
        .bearer_auth(access_token)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!("status probe request failed: {}", e);
            return AccountStatus::Unknown;
        }
    };

    match response.status().as_u16() {
        200 => AccountStatus::Active,
        401 | 403 => AccountStatus::Banned,
        429 => AccountStatus::Active,
        _ => AccountStatus::Unknown,
    }
}
