//! Authorization server endpoint resolution

use crate::constants::{
    ADMIN_CONSENT_PATH, AUTHORITY_URL, AUTHORIZE_PATH, DEFAULT_TENANT, TOKEN_PATH,
};

/// Authorization server location for one connection: base URL plus tenant.
///
/// The base URL is only overridden in tests (pointing at a local mock) or for
/// sovereign clouds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    base_url: String,
    tenant: String,
}

impl Authority {
    /// Authority for the given tenant on the public cloud.
    pub fn new(tenant: impl Into<String>) -> Self {
        let tenant = tenant.into();
        let tenant = if tenant.is_empty() {
            DEFAULT_TENANT.to_string()
        } else {
            tenant
        };
        Self {
            base_url: AUTHORITY_URL.to_string(),
            tenant,
        }
    }

    /// Replace the base URL (trailing slashes are ignored).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{tenant}/oauth2/v2.0/token`
    pub fn token_endpoint(&self) -> String {
        format!("{}/{}/{}", self.base_url, self.tenant, TOKEN_PATH)
    }

    /// `{base}/{tenant}/oauth2/v2.0/authorize`
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/{}/{}", self.base_url, self.tenant, AUTHORIZE_PATH)
    }

    /// Admin consent is always requested against the `common` tenant.
    pub fn admin_consent_endpoint(&self) -> String {
        format!("{}/{}/{}", self.base_url, DEFAULT_TENANT, ADMIN_CONSENT_PATH)
    }
}

impl Default for Authority {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tenant_is_common() {
        let authority = Authority::default();
        assert_eq!(
            authority.token_endpoint(),
            "https://login.microsoftonline.com/common/oauth2/v2.0/token"
        );
    }

    #[test]
    fn empty_tenant_falls_back_to_common() {
        assert_eq!(Authority::new("").tenant(), "common");
    }

    #[test]
    fn tenant_is_substituted() {
        let authority = Authority::new("contoso.onmicrosoft.com");
        assert_eq!(
            authority.token_endpoint(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );
        assert_eq!(
            authority.authorize_endpoint(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/authorize"
        );
    }

    #[test]
    fn base_url_override_trims_slash() {
        let authority = Authority::new("t1").with_base_url("http://127.0.0.1:9000/");
        assert_eq!(
            authority.token_endpoint(),
            "http://127.0.0.1:9000/t1/oauth2/v2.0/token"
        );
        assert_eq!(
            authority.admin_consent_endpoint(),
            "http://127.0.0.1:9000/common/adminconsent"
        );
    }
}
