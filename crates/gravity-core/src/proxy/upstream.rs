//! HTTP client for the Gemini generative upstream.

use reqwest::Client;
use tokio::time::Duration;

use gravity_types::protocol::gemini::GenerateContentRequest;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct UpstreamClient {
    http: Client,
    base_url: String,
}

impl UpstreamClient {
    #[allow(clippy::expect_used, reason = "HTTP client is required for the gateway to function")]
    pub fn new(timeout_secs: u64) -> Self {
        Self::with_base_url(GEMINI_BASE_URL, timeout_secs)
    }

    #[allow(clippy::expect_used, reason = "HTTP client is required for the gateway to function")]
    pub fn with_base_url(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .pool_max_idle_per_host(16)
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to create upstream HTTP client");
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    /// Unary `models/{model}:generateContent` call.
    pub async fn generate_content(
        &self,
        model: &str,
        access_token: &str,
        body: &GenerateContentRequest,
    ) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
    }

    /// Streaming `models/{model}:streamGenerateContent?alt=sse` call.
    pub async fn stream_generate_content(
        &self,
        model: &str,
        access_token: &str,
        body: &GenerateContentRequest,
    ) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, model
            ))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
    }

    /// The underlying client, shared with the status prober.
    pub fn http(&self) -> &Client {
        &self.http
    }
}
