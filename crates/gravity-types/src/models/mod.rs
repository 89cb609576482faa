//! Data models shared across the gateway.

mod account;
mod config;
mod stats;

pub use account::{Account, AccountExport, AccountInput, AccountStatus, AccountType};
pub use config::{
    default_routes, generate_api_key, AppConfig, ProxyConfig, RouteRule, ServerConfig,
    StorageConfig,
};
pub use stats::{AccountStats, HourlyStat, ModelStats, RequestLogEntry, UsageStats};
