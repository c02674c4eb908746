//! Graph error envelope and client error taxonomy

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope of a failed Graph response: `{"error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GraphError>,
}

/// Error reported by a Graph resource endpoint.
///
/// Two errors are the same kind when their codes match; the message is
/// free text and ignored by `==`.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct GraphError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<GraphErrorDetails>,
    /// Served as `innerError` (not the OData `innererror`).
    #[serde(
        rename = "innerError",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub inner_error: Option<Map<String, Value>>,
}

impl GraphError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            inner_error: None,
        }
    }

    pub fn is_same_kind(&self, other: &GraphError) -> bool {
        self.code == other.code
    }
}

impl PartialEq for GraphError {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_kind(other)
    }
}

impl Eq for GraphError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No usable credential (token endpoint refusal, consent, configuration).
    Auth,
    /// The resource endpoint answered with an error status.
    Api,
    /// The network or the response body could not be read.
    Transport,
    /// The request was rejected locally or the response could not be decoded.
    Client,
}

/// Errors from Graph requests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Auth(graph_auth::Error),

    #[error("graph error: {0}")]
    Graph(GraphError),

    #[error("request failed with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Auth(_) => ErrorKind::Auth,
            Error::Graph(_) | Error::Status { .. } => ErrorKind::Api,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Decode(_) | Error::InvalidRequest(_) => ErrorKind::Client,
        }
    }

    /// The structured Graph error, when the server sent one.
    pub fn graph_error(&self) -> Option<&GraphError> {
        match self {
            Error::Graph(e) => Some(e),
            _ => None,
        }
    }
}

impl From<graph_auth::Error> for Error {
    fn from(e: graph_auth::Error) -> Self {
        match e {
            graph_auth::Error::Http(message) => Error::Transport(message),
            other => Error::Auth(other),
        }
    }
}

impl From<GraphError> for Error {
    fn from(e: GraphError) -> Self {
        Error::Graph(e)
    }
}

/// Result alias for Graph requests.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decodes_minimal_error() {
        let body = r#"{"error":{"code":"Forbidden","message":"nope"}}"#;
        let envelope: GraphErrorResponse = serde_json::from_str(body).unwrap();
        let err = envelope.error.unwrap();
        assert_eq!(err.code, "Forbidden");
        assert_eq!(err.message, "nope");
        assert!(err.details.is_none());
        assert!(err.inner_error.is_none());
        assert_eq!(err.to_string(), "Forbidden: nope");
    }

    #[test]
    fn envelope_round_trips_without_absent_fields() {
        let body = r#"{"error":{"code":"Forbidden","message":"nope"}}"#;
        let envelope: GraphErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(serde_json::to_string(&envelope).unwrap(), body);
    }

    #[test]
    fn envelope_keeps_details_and_inner_error() {
        let body = r#"{"error":{"code":"Request_BadRequest","message":"bad","details":{"code":"InvalidValue","message":"bad upn","target":"userPrincipalName"},"innerError":{"request-id":"abc","date":"2024-01-01T00:00:00"}}}"#;
        let envelope: GraphErrorResponse = serde_json::from_str(body).unwrap();
        let err = envelope.error.as_ref().unwrap();
        let details = err.details.as_ref().unwrap();
        assert_eq!(details.target.as_deref(), Some("userPrincipalName"));
        assert_eq!(err.inner_error.as_ref().unwrap()["request-id"], "abc");

        let encoded = serde_json::to_value(&envelope).unwrap();
        assert_eq!(encoded, serde_json::from_str::<Value>(body).unwrap());
    }

    #[test]
    fn same_kind_compares_code_only() {
        let a = GraphError::new("Forbidden", "nope");
        let b = GraphError::new("Forbidden", "different text");
        let c = GraphError::new("NotFound", "nope");
        assert_eq!(a, b);
        assert!(a.is_same_kind(&b));
        assert_ne!(a, c);
    }

    #[test]
    fn envelope_without_error_field() {
        let envelope: GraphErrorResponse = serde_json::from_str(r#"{"foo":1}"#).unwrap();
        assert!(envelope.error.is_none());
    }

    #[test]
    fn auth_http_error_becomes_transport() {
        let err: Error = graph_auth::Error::Http("connection refused".into()).into();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err: Error = graph_auth::Error::MissingAccessToken.into();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[test]
    fn kinds() {
        assert_eq!(Error::Graph(GraphError::new("x", "y")).kind(), ErrorKind::Api);
        assert_eq!(
            Error::Status {
                status: 502,
                body: "bad gateway".into()
            }
            .kind(),
            ErrorKind::Api
        );
        assert_eq!(Error::Decode("eof".into()).kind(), ErrorKind::Client);
    }
}
