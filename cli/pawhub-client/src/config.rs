//! Configuration types for shelter client construction.

use std::collections::BTreeMap;

/// Base address of the hosted shelter service.
pub const DEFAULT_BASE_URL: &str = "https://frontend-take-home-service.fetch.com";

/// Configuration for shelter client construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the shelter service API.
    pub base_url: String,
    /// A previously issued session cookie, sent as a default `Cookie`
    /// header so a session persists across processes. Within a process the
    /// client's cookie store takes care of freshly issued cookies.
    pub session_cookie: Option<String>,
    /// Additional headers to include in requests.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional User-Agent override.
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_cookie: None,
            extra_headers: BTreeMap::new(),
            user_agent: None,
        }
    }
}
