//! Error types for credential acquisition

/// Errors from token acquisition, refresh, and the interactive consent step.
///
/// `Http` is the only variant that describes the network itself; everything
/// else means the authorization server (or the local flow) refused to issue
/// a usable credential.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{}", server_message(.code, .description.as_deref()))]
    Server {
        code: String,
        description: Option<String>,
    },

    #[error("no access token in response")]
    MissingAccessToken,

    #[error("no token duration in response")]
    MissingDuration,

    #[error("no refresh token in response")]
    MissingRefreshToken,

    #[error("malformed token response ({status}): {message}")]
    MalformedResponse { status: u16, message: String },

    #[error(
        "connection was not configured for offline access; request the offline_access scope to enable token refresh"
    )]
    OfflineAccessNotGranted,

    #[error("no refresh token held; initialize credentials first")]
    NoRefreshToken,

    #[error("authorization failed: {}", server_message(.code, .description.as_deref()))]
    AuthorizationDenied {
        code: String,
        description: Option<String>,
    },

    #[error("authorization redirect carried an unexpected state parameter")]
    StateMismatch,

    #[error("redirect listener failed: {0}")]
    Listener(String),

    #[error("timed out waiting for authorization after {0}s")]
    Timeout(u64),

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn server_message(code: &str, description: Option<&str>) -> String {
    match description {
        Some(description) => format!("{code}: {description}"),
        None => code.to_string(),
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
