//! Connection abstraction over credential acquisition strategies
//!
//! A connection owns one `CredentialStore` and knows how to fill it. The
//! request executor only ever sees `Arc<dyn Connection>`, so it is agnostic
//! to whether tokens come from the client-credentials grant (`Headless`) or
//! from an interactive consent followed by refresh-token rotation (`Web`).

pub mod headless;
pub mod web;

pub use headless::Headless;
pub use web::{AuthorizationPhase, BrowserLauncher, Web};

use std::future::Future;
use std::pin::Pin;

use crate::credentials::{Credential, CredentialStore};
use crate::error::Result;

/// Boxed future returned by `Connection` methods.
pub type ConnectionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A source of fresh bearer credentials for one application identity.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Connection>`).
pub trait Connection: Send + Sync {
    /// Identifier for logging (e.g. "headless", "web").
    fn id(&self) -> &str;

    /// The connection's credential cache.
    fn credentials(&self) -> &CredentialStore;

    /// One-time setup before traffic starts.
    ///
    /// Headless acquires its first token; Web runs the interactive consent
    /// and redeems the code. Returns without network calls when the held
    /// credential is already fresh.
    fn initialize_credentials(&self) -> ConnectionFuture<'_, ()>;

    /// Return a fresh credential, acquiring one if the held credential is
    /// stale. Safe to call from any number of concurrent tasks.
    fn refresh_credentials(&self) -> ConnectionFuture<'_, Credential>;

    /// HTTP client used for token requests, shared with the request executor.
    fn http_client(&self) -> &reqwest::Client;
}
