//! Microsoft identity platform credentials for Graph
//!
//! Provides the credential store and refresh orchestrator, token acquisition
//! for the client-credentials and authorization-code grants, and the
//! `Connection` trait the request executor authenticates through. This crate
//! has no dependency on the Graph client; it can be tested and used on its
//! own.
//!
//! Credential flow:
//! 1. Build a `Headless` (application identity) or `Web` (delegated) connection
//! 2. `Connection::initialize_credentials()` acquires the first token; for
//!    `Web` this opens the consent page and captures the redirect
//! 3. Every request calls `Connection::refresh_credentials()`, which returns
//!    the cached token or acquires a new one under the refresh guard

pub mod authorize;
pub mod callback;
pub mod connection;
pub mod constants;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod scopes;
pub mod tenants;
pub mod token;

pub use authorize::{build_authorize_url, consent_url, generate_state};
pub use callback::RedirectListener;
pub use connection::{AuthorizationPhase, BrowserLauncher, Connection, Headless, Web};
pub use constants::*;
pub use credentials::{Credential, CredentialStore};
pub use endpoints::Authority;
pub use error::{Error, Result};
pub use scopes::{PermissionType, Scope, Scopes};
pub use tenants::TenantConnections;
pub use token::{TokenGrant, parse_token_response, request_token};
