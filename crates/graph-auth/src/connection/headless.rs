//! Application-only connection (client-credentials grant)

use common::Secret;
use tracing::info;

use super::{Connection, ConnectionFuture};
use crate::credentials::{Credential, CredentialStore};
use crate::endpoints::Authority;
use crate::error::Result;
use crate::scopes::Scopes;
use crate::token::{TokenGrant, request_token};

/// Connection that authenticates as the application itself.
///
/// Every refresh is a fresh client-credentials grant; there is no refresh
/// token to rotate. The scope set is informational (the grant always asks for
/// `.default`), except that requesting offline access makes a refresh token
/// mandatory in the response.
pub struct Headless {
    application_id: String,
    application_secret: Secret<String>,
    scopes: Scopes,
    authority: Authority,
    client: reqwest::Client,
    store: CredentialStore,
}

impl Headless {
    pub fn new(
        application_id: impl Into<String>,
        application_secret: Secret<String>,
        scopes: Scopes,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            application_secret,
            scopes,
            authority: Authority::default(),
            client: reqwest::Client::new(),
            store: CredentialStore::new(),
        }
    }

    /// Pin the connection to a directory tenant (default `common`).
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        let base_url = self.authority.base_url().to_string();
        self.authority = Authority::new(tenant).with_base_url(base_url);
        self
    }

    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn tenant(&self) -> &str {
        self.authority.tenant()
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    /// Run the client-credentials grant once, bypassing the cache.
    pub async fn acquire(&self) -> Result<Credential> {
        let grant = TokenGrant::ClientCredentials {
            client_id: &self.application_id,
            client_secret: self.application_secret.expose(),
        };
        request_token(
            &self.client,
            &self.authority.token_endpoint(),
            &grant,
            self.scopes.has_offline_access(),
        )
        .await
    }

    async fn ensure_fresh(&self) -> Result<Credential> {
        self.store.ensure_fresh(|_| self.acquire()).await
    }
}

impl Connection for Headless {
    fn id(&self) -> &str {
        "headless"
    }

    fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    fn initialize_credentials(&self) -> ConnectionFuture<'_, ()> {
        Box::pin(async move {
            self.ensure_fresh().await?;
            info!(
                application_id = %self.application_id,
                tenant = self.authority.tenant(),
                "headless connection initialized"
            );
            Ok(())
        })
    }

    fn refresh_credentials(&self) -> ConnectionFuture<'_, Credential> {
        Box::pin(self.ensure_fresh())
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.client
    }
}
