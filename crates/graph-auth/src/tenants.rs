//! Per-tenant headless connections for one multi-tenant application

use std::collections::HashMap;
use std::sync::Arc;

use common::Secret;
use tokio::sync::RwLock;
use tracing::info;

use crate::connection::Headless;
use crate::endpoints::Authority;
use crate::scopes::Scopes;

/// Lazily created headless connection per tenant.
///
/// Each tenant gets its own connection, and therefore its own credential
/// store and refresh guard; a refresh in one tenant never blocks another.
pub struct TenantConnections {
    application_id: String,
    application_secret: Secret<String>,
    scopes: Scopes,
    authority: Authority,
    client: reqwest::Client,
    connections: RwLock<HashMap<String, Arc<Headless>>>,
}

impl TenantConnections {
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
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Base authority; the tenant segment is replaced per connection.
    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The connection for `tenant`, created on first use.
    pub async fn tenant(&self, tenant: &str) -> Arc<Headless> {
        if let Some(conn) = self.connections.read().await.get(tenant) {
            return conn.clone();
        }

        let mut connections = self.connections.write().await;
        connections
            .entry(tenant.to_string())
            .or_insert_with(|| {
                info!(tenant, "creating tenant connection");
                Arc::new(
                    Headless::new(
                        self.application_id.clone(),
                        self.application_secret.clone(),
                        self.scopes.clone(),
                    )
                    .with_authority(
                        Authority::new(tenant).with_base_url(self.authority.base_url()),
                    )
                    .with_http_client(self.client.clone()),
                )
            })
            .clone()
    }

    /// Tenant ids with a connection, sorted.
    pub async fn tenants(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.connections.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
