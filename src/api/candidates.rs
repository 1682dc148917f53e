//! Candidate endpoint resolution
//!
//! A configured server URL resolves to the URL itself plus, when no explicit
//! port was given, a plaintext same-host fallback on the backend's internal port.

use log::debug;
use url::Url;

use super::constants::FALLBACK_PORT;
use super::models::CandidateUrl;

#[derive(Debug, Clone)]
pub struct CandidateResolver {
    fallback_port: u16,
}

impl Default for CandidateResolver {
    fn default() -> Self {
        Self::new(FALLBACK_PORT)
    }
}

impl CandidateResolver {
    pub fn new(fallback_port: u16) -> Self {
        Self { fallback_port }
    }

    /// Ordered, duplicate-free candidates for `base_url`. Never empty.
    pub fn candidates(&self, base_url: &str) -> Vec<CandidateUrl> {
        let primary = CandidateUrl::new(base_url);
        let mut candidates = vec![primary.clone()];

        let parsed = match Url::parse(primary.as_str()) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Not deriving fallback for unparseable URL {}: {}", primary, e);
                return candidates;
            }
        };

        let wants_fallback = matches!(parsed.scheme(), "https" | "http") && parsed.port().is_none();
        if let (true, Some(host)) = (wants_fallback, parsed.host_str()) {
            let fallback = CandidateUrl::new(&format!("http://{}:{}", host, self.fallback_port));
            if !candidates.contains(&fallback) {
                candidates.push(fallback);
            }
        }

        candidates
    }
}
