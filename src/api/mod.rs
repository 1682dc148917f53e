//! Authenticating gateway to the video-management backend
//!
//! Resolves which backend and login to use, obtains (and caches) a bearer
//! token from the first reachable candidate address, then forwards single
//! requests or fans out batches of snapshot fetches.

pub mod auth;
pub mod candidates;
pub mod client;
pub mod constants;
pub mod error;
pub mod manager;
pub mod models;
pub mod resolver;

pub use auth::{AuthManager, Authenticator, PasswordGrantAuthenticator, TokenCache};
pub use candidates::CandidateResolver;
pub use client::BackendClient;
pub use error::{ErrorKind, ProxyError};
pub use manager::ProxyService;
pub use models::{AccessGrant, CandidateUrl, ProxyMode, ProxyReply, ProxyRequest, ServerCredential, TokenKey};
pub use resolver::{CredentialResolver, ServerDirectory};
