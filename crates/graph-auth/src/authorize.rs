//! Interactive consent URLs
//!
//! The delegated flow sends the user to the authorize endpoint with a random
//! `state` value. The redirect listener rejects any callback whose `state`
//! does not match, so a stray or forged redirect cannot inject a code.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use url::Url;

use crate::endpoints::Authority;
use crate::error::{Error, Result};
use crate::scopes::Scopes;

/// Random opaque `state` value, 32 bytes as URL-safe base64 (43 chars).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Authorize URL for the authorization-code flow.
pub fn build_authorize_url(
    authority: &Authority,
    client_id: &str,
    redirect_uri: &str,
    scopes: &Scopes,
    state: &str,
) -> Result<Url> {
    let mut url = parse(&authority.authorize_endpoint())?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("response_type", "code")
        .append_pair("response_mode", "query")
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &scopes.query_string())
        .append_pair("state", state);
    Ok(url)
}

/// Tenant-wide admin consent URL for `client_id`.
///
/// Sent to a directory administrator once so application permissions can be
/// granted before a headless connection is used.
pub fn consent_url(
    authority: &Authority,
    client_id: &str,
    redirect_uri: Option<&str>,
    state: Option<&str>,
) -> Result<Url> {
    let mut url = parse(&authority.admin_consent_endpoint())?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", client_id);
        if let Some(redirect_uri) = redirect_uri {
            query.append_pair("redirect_uri", redirect_uri);
        }
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Ok(url)
}

fn parse(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint).map_err(|e| Error::Config(format!("invalid authority URL {endpoint}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scopes::{DELEGATED_OFFLINE_ACCESS, DELEGATED_USER_READ};
    use std::collections::HashMap;

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn state_is_url_safe_and_unique() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "state must be URL-safe base64: {a}"
        );
        assert_ne!(a, b);
    }

    #[test]
    fn authorize_url_contains_required_params() {
        let mut scopes = Scopes::new();
        scopes.insert(DELEGATED_OFFLINE_ACCESS);
        scopes.insert(DELEGATED_USER_READ);

        let url = build_authorize_url(
            &Authority::new("contoso.onmicrosoft.com"),
            "app-id",
            "http://localhost:8080/login",
            &scopes,
            "state-123",
        )
        .unwrap();

        assert_eq!(
            url.as_str().split('?').next().unwrap(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/authorize"
        );
        let params = query(&url);
        assert_eq!(params["client_id"], "app-id");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["response_mode"], "query");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/login");
        assert_eq!(params["scope"], "offline_access User.Read");
        assert_eq!(params["state"], "state-123");
    }

    #[test]
    fn consent_url_uses_common_tenant() {
        let url = consent_url(
            &Authority::new("contoso"),
            "app-id",
            Some("https://example.com/consented"),
            Some("xyz"),
        )
        .unwrap();
        assert!(
            url.as_str()
                .starts_with("https://login.microsoftonline.com/common/adminconsent?")
        );
        let params = query(&url);
        assert_eq!(params["client_id"], "app-id");
        assert_eq!(params["redirect_uri"], "https://example.com/consented");
        assert_eq!(params["state"], "xyz");
    }

    #[test]
    fn consent_url_omits_absent_params() {
        let url = consent_url(&Authority::default(), "app-id", None, None).unwrap();
        let params = query(&url);
        assert_eq!(params.len(), 1);
        assert!(!params.contains_key("state"));
    }

    #[test]
    fn bad_authority_is_config_error() {
        let authority = Authority::default().with_base_url("not a url");
        let err = consent_url(&authority, "app", None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
