//! Delegated connection (authorization-code grant with refresh rotation)
//!
//! Lifecycle: `NoCode` until the user consents in a browser, `HasCode` while
//! the code is being redeemed, `HasToken` afterwards. From `HasToken` every
//! refresh is a refresh-token grant that must return a new refresh token,
//! which replaces the old one in the credential store.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::Secret;
use tracing::{debug, info, warn};

use super::{Connection, ConnectionFuture};
use crate::authorize::{build_authorize_url, generate_state};
use crate::callback::{RedirectListener, redirect_uri};
use crate::credentials::{Credential, CredentialStore};
use crate::endpoints::Authority;
use crate::error::{Error, Result};
use crate::scopes::Scopes;
use crate::token::{TokenGrant, request_token};

/// Opens the authorize URL for the user. The default uses the system browser.
pub type BrowserLauncher = Arc<dyn Fn(&str) -> io::Result<()> + Send + Sync>;

/// How long to wait for the user to finish consent.
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationPhase {
    NoCode,
    HasCode,
    HasToken,
}

impl fmt::Display for AuthorizationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationPhase::NoCode => write!(f, "no_code"),
            AuthorizationPhase::HasCode => write!(f, "has_code"),
            AuthorizationPhase::HasToken => write!(f, "has_token"),
        }
    }
}

/// Connection acting on behalf of a signed-in user.
pub struct Web {
    application_id: String,
    application_secret: Secret<String>,
    /// 0 until bound when configured as 0; holds the bound port afterwards.
    redirect_port: AtomicU16,
    scopes: Scopes,
    authority: Authority,
    authorization_timeout: Duration,
    browser: BrowserLauncher,
    client: reqwest::Client,
    phase: Mutex<AuthorizationPhase>,
    store: CredentialStore,
}

impl Web {
    pub fn new(
        application_id: impl Into<String>,
        application_secret: Secret<String>,
        redirect_port: u16,
        scopes: Scopes,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            application_secret,
            redirect_port: AtomicU16::new(redirect_port),
            scopes,
            authority: Authority::default(),
            authorization_timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
            browser: Arc::new(|url: &str| webbrowser::open(url)),
            client: reqwest::Client::new(),
            phase: Mutex::new(AuthorizationPhase::NoCode),
            store: CredentialStore::new(),
        }
    }

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

    pub fn with_browser(mut self, browser: BrowserLauncher) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_authorization_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_timeout = timeout;
        self
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn phase(&self) -> AuthorizationPhase {
        self.phase
            .lock()
            .map(|phase| *phase)
            .unwrap_or(AuthorizationPhase::NoCode)
    }

    /// `http://localhost:{port}/login` for the configured (or bound) port.
    pub fn redirect_uri(&self) -> String {
        redirect_uri(self.redirect_port.load(Ordering::Acquire))
    }

    fn set_phase(&self, next: AuthorizationPhase) {
        if let Ok(mut phase) = self.phase.lock() {
            let from = *phase;
            debug!(%from, to = %next, "authorization phase changed");
            *phase = next;
        }
    }

    /// Bind the redirect listener, send the user to consent, and wait for the
    /// redirect.
    async fn capture_code(&self) -> Result<String> {
        let listener = RedirectListener::bind(self.redirect_port.load(Ordering::Acquire)).await?;
        self.redirect_port
            .store(listener.local_addr().port(), Ordering::Release);

        let state = generate_state();
        let url = build_authorize_url(
            &self.authority,
            &self.application_id,
            &listener.redirect_uri(),
            &self.scopes,
            &state,
        )?;

        match (self.browser)(url.as_str()) {
            Ok(()) => info!(%url, "opened browser for consent"),
            Err(e) => warn!(error = %e, %url, "failed to open browser, visit the URL manually"),
        }

        listener.wait(&state, self.authorization_timeout).await
    }

    async fn exchange_code(&self, code: &str) -> Result<Credential> {
        let redirect_uri = self.redirect_uri();
        let scope = self.scopes.query_string();
        let grant = TokenGrant::AuthorizationCode {
            client_id: &self.application_id,
            client_secret: self.application_secret.expose(),
            code,
            redirect_uri: &redirect_uri,
            scope: &scope,
        };
        request_token(
            &self.client,
            &self.authority.token_endpoint(),
            &grant,
            self.scopes.has_offline_access(),
        )
        .await
    }

    async fn refresh_with(&self, current: Credential) -> Result<Credential> {
        if !self.scopes.has_offline_access() {
            return Err(Error::OfflineAccessNotGranted);
        }
        let refresh_token = current.refresh_token().ok_or(Error::NoRefreshToken)?;

        let redirect_uri = self.redirect_uri();
        let scope = self.scopes.query_string();
        let grant = TokenGrant::RefreshToken {
            client_id: &self.application_id,
            refresh_token: refresh_token.expose(),
            redirect_uri: &redirect_uri,
            scope: &scope,
        };
        request_token(&self.client, &self.authority.token_endpoint(), &grant, true).await
    }

    async fn initialize(&self) -> Result<()> {
        if self.store.snapshot().await.is_fresh() {
            debug!("web connection already holds a fresh credential");
            return Ok(());
        }

        let code = self.capture_code().await?;
        self.set_phase(AuthorizationPhase::HasCode);

        self.store
            .ensure_fresh(|_| self.exchange_code(&code))
            .await?;
        self.set_phase(AuthorizationPhase::HasToken);

        info!(
            application_id = %self.application_id,
            tenant = self.authority.tenant(),
            offline_access = self.scopes.has_offline_access(),
            "web connection initialized"
        );
        Ok(())
    }
}

impl Connection for Web {
    fn id(&self) -> &str {
        "web"
    }

    fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    fn initialize_credentials(&self) -> ConnectionFuture<'_, ()> {
        Box::pin(self.initialize())
    }

    fn refresh_credentials(&self) -> ConnectionFuture<'_, Credential> {
        Box::pin(self.store.ensure_fresh(|current| self.refresh_with(current)))
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.client
    }
}
