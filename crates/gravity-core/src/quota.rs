//! Quota and subscription-tier fetching from the Cloud-Code API.

use chrono::{DateTime, Utc};
use gravity_types::models::AccountType;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const QUOTA_API_URL: &str =
    "https://cloudcode-pa.googleapis.com/v1internal:fetchAvailableModels";
const PROJECT_API_URL: &str = "https://cloudcode-pa.googleapis.com/v1internal:loadCodeAssist";
const FALLBACK_PROJECT_ID: &str = "bamboo-precept-lgxtn";
const USER_AGENT: &str = "gravity-gateway/0.3 Linux/amd64";

#[derive(Debug, Deserialize)]
struct QuotaResponse {
    #[serde(default)]
    models: std::collections::HashMap<String, ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(rename = "quotaInfo")]
    quota_info: Option<QuotaInfo>,
}

#[derive(Debug, Deserialize)]
struct QuotaInfo {
    #[serde(rename = "remainingFraction", default)]
    remaining_fraction: f64,
    #[serde(rename = "resetTime", default)]
    reset_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    #[serde(rename = "cloudaicompanionProject")]
    project_id: Option<String>,
    #[serde(rename = "currentTier")]
    current_tier: Option<Tier>,
    #[serde(rename = "paidTier")]
    paid_tier: Option<Tier>,
}

#[derive(Debug, Deserialize)]
struct Tier {
    #[serde(default)]
    id: Option<String>,
}

/// Remaining quota for one upstream model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelQuota {
    pub name: String,
    /// Remaining percentage, 0–100.
    pub percentage: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
}

/// Quota snapshot for one account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountQuota {
    pub email: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_tier: Option<String>,
    pub models: Vec<ModelQuota>,
    pub is_forbidden: bool,
    pub fetched_at: DateTime<Utc>,
}

impl AccountQuota {
    /// Account tier derived from the subscription tier id.
    pub fn account_type(&self) -> Option<AccountType> {
        match self.subscription_tier.as_deref()?.to_ascii_uppercase().as_str() {
            t if t.contains("ULTRA") => Some(AccountType::Ultra),
            t if t.contains("PRO") => Some(AccountType::Pro),
            _ => Some(AccountType::Free),
        }
    }

    /// Conservative remaining percentage across all reported models; `None`
    /// when no model reported quota.
    pub fn min_remaining_percentage(&self) -> Option<i64> {
        self.models.iter().map(|m| m.percentage).min()
    }

    /// Earliest reported reset time, parsed as RFC 3339.
    pub fn earliest_reset(&self) -> Option<DateTime<Utc>> {
        self.models
            .iter()
            .filter_map(|m| m.reset_time.as_deref())
            .filter_map(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .min()
    }
}

pub struct QuotaFetcher {
    http: reqwest::Client,
    project_url: String,
    quota_url: String,
}

impl QuotaFetcher {
    #[allow(clippy::expect_used, reason = "HTTP client is required for the gateway to function")]
    pub fn new() -> Self {
        Self::with_urls(PROJECT_API_URL, QUOTA_API_URL)
    }

    #[allow(clippy::expect_used, reason = "HTTP client is required for the gateway to function")]
    pub fn with_urls(project_url: impl Into<String>, quota_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to create quota HTTP client");
        Self { http, project_url: project_url.into(), quota_url: quota_url.into() }
    }

    async fn fetch_project_info(&self, access_token: &str) -> AppResult<ProjectResponse> {
        let response = self
            .http
            .post(&self.project_url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({"metadata": {"ideType": "ANTIGRAVITY"}}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream { status: status.as_u16(), body });
        }
        Ok(response.json().await?)
    }

    /// Fetch the quota snapshot for an account. A 403 yields a forbidden
    /// marker instead of an error so callers can surface it as data.
    pub async fn fetch_quota(&self, access_token: &str, email: &str) -> AppResult<AccountQuota> {
        let mut subscription_tier = None;
        let mut project_id = String::new();

        match self.fetch_project_info(access_token).await {
            Ok(info) => {
                project_id = info.project_id.unwrap_or_default();
                subscription_tier = info
                    .paid_tier
                    .and_then(|t| t.id)
                    .filter(|id| !id.is_empty())
                    .or_else(|| info.current_tier.and_then(|t| t.id));
            }
            Err(e) => tracing::debug!("project info fetch failed for {}: {}", email, e),
        }
        if project_id.is_empty() {
            project_id = FALLBACK_PROJECT_ID.to_string();
        }

        let response = self
            .http
            .post(&self.quota_url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({"project": project_id}))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 403 {
            return Ok(AccountQuota {
                email: email.to_string(),
                project_id,
                subscription_tier,
                models: Vec::new(),
                is_forbidden: true,
                fetched_at: Utc::now(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream { status: status.as_u16(), body });
        }

        let quota: QuotaResponse = response.json().await?;
        let mut models: Vec<ModelQuota> = quota
            .models
            .into_iter()
            .filter(|(name, _)| is_relevant_model(name))
            .map(|(name, info)| {
                let (percentage, reset_time) = match info.quota_info {
                    Some(q) => ((q.remaining_fraction * 100.0) as i64, q.reset_time),
                    None => (0, None),
                };
                ModelQuota { name, percentage, reset_time }
            })
            .collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(AccountQuota {
            email: email.to_string(),
            project_id,
            subscription_tier,
            models,
            is_forbidden: false,
            fetched_at: Utc::now(),
        })
    }
}

impl Default for QuotaFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn is_relevant_model(name: &str) -> bool {
    name.starts_with('g') || name.starts_with('c')
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fetcher_for(server: &MockServer) -> QuotaFetcher {
        QuotaFetcher::with_urls(
            format!("{}/v1internal:loadCodeAssist", server.uri()),
            format!("{}/v1internal:fetchAvailableModels", server.uri()),
        )
    }

    #[tokio::test]
    async fn test_fetch_quota_with_tier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1internal:loadCodeAssist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cloudaicompanionProject": "proj-1",
                "paidTier": {"id": "ULTRA"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1internal:fetchAvailableModels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": {
                    "gemini-3-pro-high": {"quotaInfo": {"remainingFraction": 0.8}},
                    "claude-sonnet-4-5": {"quotaInfo": {"remainingFraction": 0.25}},
                    "text-embedding": {"quotaInfo": {"remainingFraction": 1.0}}
                }
            })))
            .mount(&server)
            .await;

        let quota = fetcher_for(&server).fetch_quota("tok", "q@example.com").await.unwrap();
        assert_eq!(quota.project_id, "proj-1");
        assert_eq!(quota.account_type(), Some(AccountType::Ultra));
        assert_eq!(quota.models.len(), 2);
        assert_eq!(quota.min_remaining_percentage(), Some(25));
        assert!(!quota.is_forbidden);
    }

    #[tokio::test]
    async fn test_fetch_quota_403_is_forbidden_marker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1internal:loadCodeAssist"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1internal:fetchAvailableModels"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let quota = fetcher_for(&server).fetch_quota("tok", "q@example.com").await.unwrap();
        assert!(quota.is_forbidden);
        assert_eq!(quota.project_id, FALLBACK_PROJECT_ID);
        assert!(quota.models.is_empty());
    }
}
