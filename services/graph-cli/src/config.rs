//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The application secret is loaded from the GRAPH_CLIENT_SECRET env var or
//! application_secret_file, never stored in the TOML directly.

use common::Secret;
use graph_auth::{AUTHORITY_URL, GRAPH_URL, PermissionType, Scopes};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Env var holding the application (client) secret.
pub const SECRET_ENV: &str = "GRAPH_CLIENT_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Application identity, client-credentials grant.
    Headless,
    /// Delegated identity, interactive consent plus refresh tokens.
    Web,
}

impl ConnectionKind {
    /// Scope catalogue the configured permission names are resolved in.
    pub fn permission_type(self) -> PermissionType {
        match self {
            ConnectionKind::Headless => PermissionType::Application,
            ConnectionKind::Web => PermissionType::Delegated,
        }
    }
}

/// Application identity and requested permissions
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    pub kind: ConnectionKind,
    pub application_id: String,
    /// Directory tenant; `common` when unset.
    #[serde(default)]
    pub tenant: Option<String>,
    /// Permission names, e.g. `["offline_access", "User.Read"]`.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Loopback port for the consent redirect (web only).
    #[serde(default)]
    pub redirect_port: Option<u16>,
    #[serde(skip)]
    pub application_secret: Option<Secret<String>>,
    /// Path to a file containing the secret (alternative to GRAPH_CLIENT_SECRET)
    #[serde(default)]
    pub application_secret_file: Option<PathBuf>,
}

/// Service endpoints and timeouts
#[derive(Debug, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_authority_url")]
    pub authority_url: String,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_authorization_timeout")]
    pub authorization_timeout_secs: u64,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            authority_url: default_authority_url(),
            graph_url: default_graph_url(),
            timeout_secs: default_timeout(),
            authorization_timeout_secs: default_authorization_timeout(),
        }
    }
}

fn default_authority_url() -> String {
    AUTHORITY_URL.to_string()
}

fn default_graph_url() -> String {
    GRAPH_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_authorization_timeout() -> u64 {
    300
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order:
    /// 1. GRAPH_CLIENT_SECRET env var
    /// 2. application_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let Ok(secret) = std::env::var(SECRET_ENV) {
            config.connection.application_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.connection.application_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read application_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.connection.application_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.connection.application_id.trim().is_empty() {
            return Err(common::Error::Config(
                "application_id must not be empty".into(),
            ));
        }

        for (name, url) in [
            ("authority_url", &self.endpoints.authority_url),
            ("graph_url", &self.endpoints.graph_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if self.endpoints.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.endpoints.authorization_timeout_secs == 0 {
            return Err(common::Error::Config(
                "authorization_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.connection.kind == ConnectionKind::Web && self.connection.redirect_port.is_none() {
            return Err(common::Error::Config(
                "redirect_port is required for web connections".into(),
            ));
        }

        self.scopes()?;
        Ok(())
    }

    /// Configured permission names resolved against the scope catalogue.
    pub fn scopes(&self) -> common::Result<Scopes> {
        Scopes::parse(
            &self.connection.scopes,
            self.connection.kind.permission_type(),
        )
        .map_err(|e| common::Error::Config(e.to_string()))
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("graph-cli.toml")
    }
}
