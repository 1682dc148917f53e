use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::constants::methods;

/// Login for one backend instance
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCredential {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl ServerCredential {
    pub fn new(url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Password is never printed.
impl fmt::Debug for ServerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCredential")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A normalized base URL (no trailing slash) to attempt authentication against
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CandidateUrl(String);

impl CandidateUrl {
    pub fn new(url: &str) -> Self {
        Self(url.trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token cache key. Tokens never cross candidates or users.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub candidate: CandidateUrl,
    pub username: String,
}

impl TokenKey {
    pub fn new(candidate: &CandidateUrl, username: &str) -> Self {
        Self {
            candidate: candidate.clone(),
            username: username.to_string(),
        }
    }
}

/// Cached bearer token for one candidate/username pair
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Token as returned by the identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// A usable bearer token together with the candidate that issued it
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub token: String,
    pub base_url: CandidateUrl,
}

/// Inbound request body, as sent by the web client
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub return_image: bool,
    #[serde(default)]
    pub batch_snapshots: Option<Value>,
    #[serde(default)]
    pub server_id: Option<String>,
}

/// What a validated request asks the dispatcher to do
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyMode {
    Single {
        endpoint: String,
        method: reqwest::Method,
        body: Option<Value>,
        return_image: bool,
    },
    Batch {
        paths: BTreeMap<String, Option<String>>,
    },
}

impl ProxyRequest {
    /// Method name, defaulting to GET
    pub fn method_name(&self) -> &str {
        self.method.as_deref().unwrap_or(methods::GET)
    }
}

/// Response status plus JSON body sent back to the web client
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyReply {
    pub status: u16,
    pub body: Value,
}

impl ProxyReply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn with_status(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credential_debug_redacts_password() {
        let credential = ServerCredential::new("https://vms.local", "operator", "hunter2");
        let printed = format!("{:?}", credential);
        assert!(printed.contains("operator"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_candidate_url_strips_trailing_slashes() {
        assert_eq!(CandidateUrl::new("https://vms.local//").as_str(), "https://vms.local");
    }

    #[test]
    fn test_proxy_request_camel_case() {
        let request: ProxyRequest = serde_json::from_value(json!({
            "endpoint": "/cameras",
            "returnImage": true,
            "serverId": "site-a"
        }))
        .unwrap();

        assert_eq!(request.endpoint.as_deref(), Some("/cameras"));
        assert!(request.return_image);
        assert_eq!(request.server_id.as_deref(), Some("site-a"));
        assert_eq!(request.method_name(), "GET");
    }
}
