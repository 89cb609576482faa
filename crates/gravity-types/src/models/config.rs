//! Application configuration model.
//!
//! All keys are optional in the file; missing sections fall back to the
//! defaults below.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
    pub storage: StorageConfig,
    pub routes: Vec<RouteRule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            proxy: ProxyConfig::default(),
            storage: StorageConfig::default(),
            routes: default_routes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: String,
    pub api_key: String,
    pub auth_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8045,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            api_key: generate_api_key(),
            auth_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Upstream request timeout in seconds.
    pub timeout: u64,
    /// Rotation attempts after the initial dispatch.
    pub max_retries: u32,
    /// Rotate to another account on upstream 401/403/429.
    pub auto_rotate: bool,
    /// Permit SSE streaming; when off, stream requests are served unary.
    pub stream_enabled: bool,
    /// Low-cost model used for detected background tasks.
    pub light_model: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: 120,
            max_retries: 3,
            auto_rotate: true,
            stream_enabled: true,
            light_model: "gemini-2.0-flash".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: "./data/antigravity.db".to_string() }
    }
}

/// A model routing rule. `pattern` is an exact name or a glob where `*`
/// matches any run of characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub pattern: String,
    pub target: String,
}

impl RouteRule {
    pub fn new(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), target: target.into() }
    }
}

/// Curated defaults mapping GPT/Claude aliases onto Gemini backends.
pub fn default_routes() -> Vec<RouteRule> {
    vec![
        RouteRule::new("gpt-4*", "gemini-3-pro-high"),
        RouteRule::new("gpt-4o*", "gemini-3-flash"),
        RouteRule::new("gpt-3.5*", "gemini-2.5-flash"),
        RouteRule::new("o1-*", "gemini-3-pro-high"),
        RouteRule::new("o3-*", "gemini-3-pro-high"),
        RouteRule::new("claude-3-haiku-*", "gemini-2.5-flash-lite"),
        RouteRule::new("claude-haiku-*", "gemini-2.5-flash-lite"),
        RouteRule::new("claude-3-5-sonnet-*", "claude-sonnet-4-5"),
        RouteRule::new("claude-3-opus-*", "claude-opus-4-5-thinking"),
        RouteRule::new("claude-opus-4-*", "claude-opus-4-5-thinking"),
    ]
}

/// Generate a random `sk-` prefixed API key for a fresh config file.
pub fn generate_api_key() -> String {
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("sk-{}", hex)
}
