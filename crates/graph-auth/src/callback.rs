//! Loopback listener that captures the authorization redirect
//!
//! Bound before the browser is launched so the redirect can never race the
//! listener. The first request to `/login` decides the outcome; the server is
//! then shut down gracefully. Dropping the future returned by `wait` aborts
//! the server tasks.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::REDIRECT_PATH;
use crate::error::{Error, Result};

const DONE_MESSAGE: &str = "authorization done. you may close this window now";

/// How long a finished listener waits for the browser connection to close
/// before the task is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

type Outcome = oneshot::Sender<Result<String>>;

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    outcome: Arc<Mutex<Option<Outcome>>>,
}

/// A bound, not yet serving, redirect listener.
///
/// The advertised redirect host is `localhost`, which a browser may resolve
/// to either loopback family. The IPv4 loopback is always bound; the IPv6
/// loopback is bound on the same port when the host supports it.
pub struct RedirectListener {
    listeners: Vec<TcpListener>,
    addr: SocketAddr,
}

impl RedirectListener {
    /// Bind `127.0.0.1:{port}` and, best effort, `[::1]:{port}`. Port 0 picks
    /// an ephemeral port shared by both.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| Error::Listener(format!("failed to bind 127.0.0.1:{port}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| Error::Listener(format!("failed to read bound address: {e}")))?;
        let mut listeners = vec![listener];

        match TcpListener::bind(("::1", addr.port())).await {
            Ok(v6) => listeners.push(v6),
            Err(e) => debug!(error = %e, port = addr.port(), "IPv6 loopback unavailable"),
        }

        debug!(%addr, loopbacks = listeners.len(), "redirect listener bound");
        Ok(Self { listeners, addr })
    }

    /// The IPv4 loopback address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Every bound loopback address, IPv4 first.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|listener| listener.local_addr().ok())
            .collect()
    }

    /// The `redirect_uri` registered for this listener.
    pub fn redirect_uri(&self) -> String {
        redirect_uri(self.addr.port())
    }

    /// Serve until the first redirect arrives or `timeout` elapses.
    ///
    /// Returns the authorization code when the redirect carries `code` and the
    /// expected `state`.
    pub async fn wait(self, expected_state: &str, timeout: Duration) -> Result<String> {
        let Self { listeners, addr } = self;
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = CallbackState {
            expected_state: Arc::from(expected_state),
            outcome: Arc::new(Mutex::new(Some(outcome_tx))),
        };
        let app = Router::new()
            .route(REDIRECT_PATH, get(handle_redirect))
            .with_state(state);

        let server = ServerTask(
            listeners
                .into_iter()
                .map(|listener| {
                    let app = app.clone();
                    let mut shutdown_rx = shutdown_rx.clone();
                    tokio::spawn(async move {
                        let shutdown = async move {
                            let _ = shutdown_rx.wait_for(|stop| *stop).await;
                        };
                        if let Err(e) = axum::serve(listener, app)
                            .with_graceful_shutdown(shutdown)
                            .await
                        {
                            warn!(error = %e, "redirect listener stopped with error");
                        }
                    })
                })
                .collect(),
        );

        info!(%addr, "waiting for authorization redirect");
        let outcome = tokio::time::timeout(timeout, outcome_rx).await;

        let _ = shutdown_tx.send(true);
        server.finish(SHUTDOWN_GRACE).await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Listener(
                "redirect listener stopped before a redirect arrived".into(),
            )),
            Err(_) => Err(Error::Timeout(timeout.as_secs())),
        }
    }
}

/// `http://localhost:{port}/login`
pub fn redirect_uri(port: u16) -> String {
    format!("http://localhost:{port}{REDIRECT_PATH}")
}

/// Decide the outcome of one redirect.
///
/// An `error` parameter wins; otherwise `state` must match and `code` must be
/// present.
pub fn parse_callback(params: &HashMap<String, String>, expected_state: &str) -> Result<String> {
    if let Some(code) = params.get("error") {
        return Err(Error::AuthorizationDenied {
            code: code.clone(),
            description: params.get("error_description").cloned(),
        });
    }

    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(Error::StateMismatch);
    }

    params
        .get("code")
        .filter(|code| !code.is_empty())
        .cloned()
        .ok_or_else(|| Error::Listener("redirect carried neither code nor error".into()))
}

async fn handle_redirect(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let result = parse_callback(&params, &state.expected_state);
    let response = match &result {
        Ok(_) => {
            info!("authorization code received");
            (StatusCode::OK, DONE_MESSAGE.to_string())
        }
        Err(e) => {
            warn!(error = %e, "authorization redirect rejected");
            (StatusCode::BAD_REQUEST, e.to_string())
        }
    };

    let sender = state
        .outcome
        .lock()
        .ok()
        .and_then(|mut outcome| outcome.take());
    match sender {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => debug!("redirect arrived after the outcome was decided"),
    }
    response
}

/// Server task handles that abort on drop.
struct ServerTask(Vec<JoinHandle<()>>);

impl ServerTask {
    async fn finish(mut self, grace: Duration) {
        let drained = tokio::time::timeout(grace, async {
            for handle in self.0.iter_mut() {
                let _ = handle.await;
            }
        })
        .await;
        if drained.is_err() {
            debug!("redirect listener did not drain in time, aborting");
        }
    }
}

impl Drop for ServerTask {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn redirect_uri_format() {
        assert_eq!(redirect_uri(8080), "http://localhost:8080/login");
    }

    #[test]
    fn callback_returns_code() {
        let code = parse_callback(&params(&[("code", "abc"), ("state", "s1")]), "s1").unwrap();
        assert_eq!(code, "abc");
    }

    #[test]
    fn callback_error_wins() {
        let err = parse_callback(
            &params(&[
                ("error", "access_denied"),
                ("error_description", "user declined"),
                ("state", "s1"),
            ]),
            "s1",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "authorization failed: access_denied: user declined"
        );
    }

    #[test]
    fn callback_rejects_wrong_or_missing_state() {
        let err = parse_callback(&params(&[("code", "abc"), ("state", "other")]), "s1").unwrap_err();
        assert!(matches!(err, Error::StateMismatch));

        let err = parse_callback(&params(&[("code", "abc")]), "s1").unwrap_err();
        assert!(matches!(err, Error::StateMismatch));
    }

    #[test]
    fn callback_without_code() {
        let err = parse_callback(&params(&[("state", "s1")]), "s1").unwrap_err();
        assert!(matches!(err, Error::Listener(_)));
    }

    #[tokio::test]
    async fn wait_returns_code_from_redirect() {
        let listener = RedirectListener::bind(0).await.unwrap();
        let addr = listener.local_addr();
        assert!(listener.redirect_uri().ends_with(&format!(":{}/login", addr.port())));

        let browser = tokio::spawn(async move {
            let resp = reqwest::get(format!("http://{addr}/login?code=the-code&state=s1"))
                .await
                .unwrap();
            let status = resp.status();
            (status, resp.text().await.unwrap())
        });

        let code = listener
            .wait("s1", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(code, "the-code");

        let (status, body) = browser.await.unwrap();
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body, DONE_MESSAGE);
    }

    #[tokio::test]
    async fn wait_surfaces_error_redirect() {
        let listener = RedirectListener::bind(0).await.unwrap();
        let addr = listener.local_addr();

        let browser = tokio::spawn(async move {
            reqwest::get(format!(
                "http://{addr}/login?error=access_denied&error_description=nope&state=s1"
            ))
            .await
            .unwrap()
            .status()
        });

        let err = listener
            .wait("s1", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthorizationDenied { ref code, .. } if code == "access_denied"));
        assert_eq!(browser.await.unwrap(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ipv6_loopback_receives_redirect_when_available() {
        let listener = RedirectListener::bind(0).await.unwrap();
        let addrs = listener.local_addrs();
        assert!(addrs[0].is_ipv4());
        assert!(addrs.iter().all(|a| a.port() == listener.local_addr().port()));

        // Hosts without IPv6 only get the IPv4 listener.
        let Some(v6) = addrs.iter().find(|a| a.is_ipv6()).copied() else {
            return;
        };

        let browser = tokio::spawn(async move {
            reqwest::get(format!("http://{v6}/login?code=v6-code&state=s1"))
                .await
                .unwrap()
                .status()
        });

        let code = listener
            .wait("s1", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(code, "v6-code");
        assert_eq!(browser.await.unwrap(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn wait_times_out() {
        let listener = RedirectListener::bind(0).await.unwrap();
        let err = listener
            .wait("s1", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn listener_port_is_released_after_wait() {
        let listener = RedirectListener::bind(0).await.unwrap();
        let port = listener.local_addr().port();
        let _ = listener.wait("s1", Duration::from_millis(10)).await;

        // Rebinding the same port succeeds once the server task is gone.
        let again = RedirectListener::bind(port).await;
        assert!(again.is_ok(), "port {port} should be free");
    }

    #[tokio::test]
    async fn router_rejects_bad_state() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let (tx, rx) = oneshot::channel();
        let state = CallbackState {
            expected_state: Arc::from("s1"),
            outcome: Arc::new(Mutex::new(Some(tx))),
        };
        let app = Router::new()
            .route(REDIRECT_PATH, get(handle_redirect))
            .with_state(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/login?code=abc&state=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(matches!(rx.await.unwrap(), Err(Error::StateMismatch)));
    }
}
