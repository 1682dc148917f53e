//! API constants and defaults for the video-management backend

/// Path prefix every resource endpoint lives under
pub const API_PREFIX: &str = "/api/rest/v1";

/// Password-grant token endpoint, relative to a candidate base URL
pub const TOKEN_PATH: &str = "/API/IDP/connect/token";

/// OAuth client id the backend's identity provider expects for password grants
pub const CLIENT_ID: &str = "GrantValidatorClient";

/// Plaintext port the backend also listens on when the front-end port is unreachable
pub const FALLBACK_PORT: u16 = 8380;

/// Timeout applied to every outbound call (authentication and resources)
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Cached tokens expiring within this window are treated as expired
pub const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;

/// Token lifetime assumed when the backend omits `expires_in`
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Upper bound on simultaneous snapshot fetches in a single batch
pub const BATCH_CONCURRENCY: usize = 8;

/// Content type used for image payloads that declare none
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Standard headers for backend requests
pub mod headers {
    /// Content type for JSON requests
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// Bearer scheme prefix for the Authorization header
    pub fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }
}

/// HTTP methods accepted on the inbound contract
pub mod methods {
    pub const GET: &str = "GET";
    pub const POST: &str = "POST";
}

/// Root an endpoint under `prefix`, unless it is already rooted there.
pub fn api_url(base_url: &str, prefix: &str, endpoint: &str) -> String {
    if endpoint.starts_with(prefix) {
        format!("{}{}", base_url, endpoint)
    } else if endpoint.starts_with('/') {
        format!("{}{}{}", base_url, prefix, endpoint)
    } else {
        format!("{}{}/{}", base_url, prefix, endpoint)
    }
}

/// Build the token endpoint URL for a candidate
pub fn token_endpoint(base_url: &str, token_path: &str) -> String {
    format!("{}{}", base_url, token_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_prefixes_bare_endpoint() {
        assert_eq!(
            api_url("https://vms.local", API_PREFIX, "/cameras"),
            "https://vms.local/api/rest/v1/cameras"
        );
        assert_eq!(
            api_url("https://vms.local", API_PREFIX, "cameras"),
            "https://vms.local/api/rest/v1/cameras"
        );
    }

    #[test]
    fn test_api_url_is_idempotent() {
        let once = api_url("https://vms.local", API_PREFIX, "/cameras/1/snapshot");
        let path = once.trim_start_matches("https://vms.local");
        assert_eq!(api_url("https://vms.local", API_PREFIX, path), once);
    }

    #[test]
    fn test_token_endpoint() {
        assert_eq!(
            token_endpoint("http://vms.local:8380", TOKEN_PATH),
            "http://vms.local:8380/API/IDP/connect/token"
        );
    }
}
