//! Authenticated Microsoft Graph client
//!
//! `GraphClient` wraps a `graph_auth::Connection` and funnels every request
//! through one executor: ensure a fresh credential, attach the bearer token,
//! send, and classify the response. Pagination (`paging`) and the users
//! service (`users`) are built on top of it.

pub mod error;
pub mod metrics;
pub mod paging;
pub mod users;

pub use error::{Error, ErrorKind, GraphError, GraphErrorDetails, GraphErrorResponse, Result};
pub use paging::Page;
pub use reqwest::Method;
pub use users::{CreateUserRequest, PasswordProfile, UpdateUserRequest, User};

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use graph_auth::{Connection, GRAPH_URL};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

/// Correlation header Graph echoes into its diagnostics.
const REQUEST_ID_HEADER: &str = "client-request-id";

/// Executes Graph requests through a shared connection.
///
/// Cheap to clone; clones share the connection (and so its credential cache
/// and refresh guard).
#[derive(Clone)]
pub struct GraphClient {
    connection: Arc<dyn Connection>,
    base_url: String,
}

impl GraphClient {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            base_url: GRAPH_URL.to_string(),
        }
    }

    /// Override the Graph root (tests, national clouds). A trailing slash is
    /// added so relative paths join under it.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `path` (e.g. `v1.0/users`) under the Graph root and encode
    /// `query`.
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| Error::InvalidRequest(format!("invalid base URL {}: {e}", self.base_url)))?;
        let mut url = base
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidRequest(format!("invalid path {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Like `url`, with `segments` appended to the path. Each segment is
    /// percent-encoded whole, so `/`, `?` and `#` inside an id stay in that
    /// segment.
    pub fn segment_url(
        &self,
        path: &str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url> {
        if let Some(segment) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(Error::InvalidRequest(format!(
                "invalid path segment {segment:?}"
            )));
        }
        let mut url = self.url(path, query)?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidRequest(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request without a body.
    pub async fn send(&self, method: Method, path: &str, query: &[(&str, &str)]) -> Result<Bytes> {
        let url = self.url(path, query)?;
        self.send_url(method, url).await
    }

    /// Send a request with `body` encoded as JSON.
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<Bytes> {
        let url = self.url(path, query)?;
        self.send_json_url(method, url, body).await
    }

    /// Send a request without a body to an already built URL.
    pub async fn send_url(&self, method: Method, url: Url) -> Result<Bytes> {
        self.execute(method, url, None).await
    }

    /// Send `body` as JSON to an already built URL.
    pub async fn send_json_url<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<Bytes> {
        let body = serde_json::to_vec(body)
            .map_err(|e| Error::InvalidRequest(format!("failed to encode request body: {e}")))?;
        self.execute(method, url, Some(body)).await
    }

    /// GET an absolute URL, such as a continuation link.
    pub async fn get_url(&self, url: &str) -> Result<Bytes> {
        let url = Url::parse(url)
            .map_err(|e| Error::InvalidRequest(format!("invalid URL {url}: {e}")))?;
        self.execute(Method::GET, url, None).await
    }

    /// GET `path` and decode the body as `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let body = self.send(Method::GET, path, query).await?;
        decode(&body)
    }

    async fn execute(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> Result<Bytes> {
        let credential = self.connection.refresh_credentials().await?;

        let request_id = Uuid::new_v4().to_string();
        let mut request = self
            .connection
            .http_client()
            .request(method.clone(), url.clone())
            .bearer_auth(credential.access_token())
            .header(REQUEST_ID_HEADER, &request_id);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_request(method.as_str(), "error", start.elapsed().as_secs_f64());
                warn!(error = %e, %method, path = url.path(), %request_id, "graph request failed");
                return Err(Error::Transport(format!("{method} {} failed: {e}", url.path())));
            }
        };

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response body: {e}")))?;
        metrics::record_request(
            method.as_str(),
            status.as_str(),
            start.elapsed().as_secs_f64(),
        );

        debug!(
            %method,
            path = url.path(),
            status = status.as_u16(),
            %request_id,
            "graph request completed"
        );

        if status.as_u16() >= 400 {
            return Err(classify_error(status.as_u16(), &body));
        }
        Ok(body)
    }
}

/// Turn an error response into `Error::Graph` when it carries the envelope,
/// `Error::Status` otherwise.
pub fn classify_error(status: u16, body: &[u8]) -> Error {
    match serde_json::from_slice::<GraphErrorResponse>(body) {
        Ok(GraphErrorResponse { error: Some(e) }) => Error::Graph(e),
        _ => Error::Status {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))
}
