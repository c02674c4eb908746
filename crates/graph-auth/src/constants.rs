//! Microsoft identity platform and Graph constants
//!
//! Fixed endpoints for the v2.0 authorization server. The tenant path segment
//! is substituted at request time (see `endpoints::Authority`).

/// Base URL of the authorization server.
pub const AUTHORITY_URL: &str = "https://login.microsoftonline.com";

/// Tenant used when a connection is not pinned to a directory.
pub const DEFAULT_TENANT: &str = "common";

/// Root of the resource API. Paths are versioned (`v1.0/users`).
pub const GRAPH_URL: &str = "https://graph.microsoft.com/";

/// Scope requested by the client-credentials grant: every application
/// permission already consented for the app.
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Path (under `{authority}/{tenant}`) of the token endpoint.
pub const TOKEN_PATH: &str = "oauth2/v2.0/token";

/// Path (under `{authority}/{tenant}`) of the interactive authorize endpoint.
pub const AUTHORIZE_PATH: &str = "oauth2/v2.0/authorize";

/// Path (under `{authority}/common`) of the tenant-wide admin consent page.
pub const ADMIN_CONSENT_PATH: &str = "adminconsent";

/// Path the loopback redirect listener serves.
pub const REDIRECT_PATH: &str = "/login";
