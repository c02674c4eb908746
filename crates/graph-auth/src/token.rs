//! Token endpoint interaction
//!
//! All three grants (client credentials, authorization code, refresh token)
//! POST a form to the same endpoint and share response classification. The
//! body is decoded into an untyped JSON object and immediately turned into a
//! `Credential` or an `Error`; nothing downstream sees the raw map.

use std::time::{Duration, Instant};

use common::Secret;
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::DEFAULT_SCOPE;
use crate::credentials::Credential;
use crate::error::{Error, Result};

/// One token request, borrowing everything it sends.
pub enum TokenGrant<'a> {
    /// App-only token for the `.default` scope.
    ClientCredentials {
        client_id: &'a str,
        client_secret: &'a str,
    },
    /// Redeem a code captured by the redirect listener.
    AuthorizationCode {
        client_id: &'a str,
        client_secret: &'a str,
        code: &'a str,
        redirect_uri: &'a str,
        scope: &'a str,
    },
    /// Rotate a delegated token. Public-client form: no secret.
    RefreshToken {
        client_id: &'a str,
        refresh_token: &'a str,
        redirect_uri: &'a str,
        scope: &'a str,
    },
}

impl TokenGrant<'_> {
    pub fn grant_type(&self) -> &'static str {
        match self {
            TokenGrant::ClientCredentials { .. } => "client_credentials",
            TokenGrant::AuthorizationCode { .. } => "authorization_code",
            TokenGrant::RefreshToken { .. } => "refresh_token",
        }
    }

    /// Form body for the token endpoint.
    pub fn form(&self) -> Vec<(&'static str, &str)> {
        let grant_type = self.grant_type();
        match *self {
            TokenGrant::ClientCredentials {
                client_id,
                client_secret,
            } => vec![
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", grant_type),
                ("scope", DEFAULT_SCOPE),
            ],
            TokenGrant::AuthorizationCode {
                client_id,
                client_secret,
                code,
                redirect_uri,
                scope,
            } => vec![
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("grant_type", grant_type),
                ("redirect_uri", redirect_uri),
                ("scope", scope),
            ],
            TokenGrant::RefreshToken {
                client_id,
                refresh_token,
                redirect_uri,
                scope,
            } => vec![
                ("client_id", client_id),
                ("grant_type", grant_type),
                ("redirect_uri", redirect_uri),
                ("refresh_token", refresh_token),
                ("scope", scope),
            ],
        }
    }
}

/// POST `grant` to `endpoint` and classify the response.
///
/// `require_refresh_token` is set when the connection asked for offline
/// access; the response must then carry a non-empty `refresh_token`.
pub async fn request_token(
    client: &reqwest::Client,
    endpoint: &str,
    grant: &TokenGrant<'_>,
    require_refresh_token: bool,
) -> Result<Credential> {
    let grant_type = grant.grant_type();
    let response = client
        .post(endpoint)
        .form(&grant.form())
        .send()
        .await
        .map_err(|e| Error::Http(format!("{grant_type} token request failed: {e}")))?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("failed to read {grant_type} token response: {e}")))?;
    let received_at = Instant::now();

    debug!(grant_type, status = status.as_u16(), "token endpoint responded");
    parse_token_response(&body, status.as_u16(), received_at, require_refresh_token)
}

/// Classify a token endpoint body.
///
/// Precedence: `error` field, then missing `access_token`, then missing
/// `expires_in`, then (when required) missing `refresh_token`. The HTTP status
/// is only consulted for the malformed-body message.
pub fn parse_token_response(
    body: &[u8],
    status: u16,
    received_at: Instant,
    require_refresh_token: bool,
) -> Result<Credential> {
    let fields: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| Error::MalformedResponse {
            status,
            message: e.to_string(),
        })?;

    // Only a string `error` is an error code; `null` or other shapes are ignored.
    if let Some(code) = fields.get("error").and_then(text) {
        return Err(Error::Server {
            code,
            description: fields.get("error_description").and_then(text),
        });
    }

    let access_token = fields
        .get("access_token")
        .and_then(text)
        .filter(|token| !token.is_empty())
        .ok_or(Error::MissingAccessToken)?;

    // Zero or a lifetime past the clock's range is no usable duration.
    let expires_in = fields
        .get("expires_in")
        .and_then(seconds)
        .map(Duration::from_secs)
        .filter(|lifetime| !lifetime.is_zero() && received_at.checked_add(*lifetime).is_some())
        .ok_or(Error::MissingDuration)?;

    let refresh_token = fields
        .get("refresh_token")
        .and_then(text)
        .filter(|token| !token.is_empty());
    if require_refresh_token && refresh_token.is_none() {
        return Err(Error::MissingRefreshToken);
    }

    Ok(
        Credential::new(access_token, received_at, expires_in)
            .with_refresh_token(refresh_token.map(Secret::new)),
    )
}

fn text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// `expires_in` arrives as a number from most servers and as a numeric
/// string from some.
fn seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
