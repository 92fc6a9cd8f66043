//! Error handling in [`strela_client`][crate]
use std::fmt;

use http::{Method, StatusCode};
use thiserror::Error;

pub use strela_core::{ErrorResponse, UnknownResourceKind};

/// Where an error came from
///
/// The client fills in the HTTP status, [`Api`](crate::Api) fills in the
/// identity of the resource the call was about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
    /// HTTP status of the response, if there was one
    pub status: Option<u16>,
    /// Kind of the resource
    pub kind: Option<String>,
    /// Namespace of the resource
    pub namespace: Option<String>,
    /// Name of the resource
    pub name: Option<String>,
}

impl Origin {
    /// Fill every unset field from `other`
    #[must_use]
    pub fn or(mut self, other: &Origin) -> Self {
        self.status = self.status.or(other.status);
        if self.kind.is_none() {
            self.kind.clone_from(&other.kind);
        }
        if self.namespace.is_none() {
            self.namespace.clone_from(&other.namespace);
        }
        if self.name.is_none() {
            self.name.clone_from(&other.name);
        }
        self
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_deref().unwrap_or("resource"))?;
        match (&self.namespace, &self.name) {
            (Some(ns), Some(name)) => write!(f, " {ns}/{name}")?,
            (None, Some(name)) => write!(f, " {name}")?,
            (Some(ns), None) => write!(f, " in {ns}")?,
            (None, None) => {}
        }
        if let Some(status) = self.status {
            write!(f, " (HTTP {status})")?;
        }
        Ok(())
    }
}

/// Possible errors when working with [`strela_client`][crate]
#[derive(Error, Debug)]
pub enum Error {
    /// The kind was never registered in the [`Registry`](strela_core::Registry)
    #[error(transparent)]
    UnknownResourceKind(#[from] UnknownResourceKind),

    /// The object does not exist (404)
    #[error("{origin} not found: {response}")]
    NotFound {
        /// Where the error came from
        origin: Origin,
        /// Status returned by the server
        response: ErrorResponse,
    },

    /// The caller is not allowed to perform the call (403)
    #[error("forbidden on {origin}: {response}")]
    Forbidden {
        /// Where the error came from
        origin: Origin,
        /// Status returned by the server
        response: ErrorResponse,
    },

    /// The caller is not authenticated (401)
    #[error("unauthorized on {origin}: {response}")]
    Unauthorized {
        /// Where the error came from
        origin: Origin,
        /// Status returned by the server
        response: ErrorResponse,
    },

    /// A write raced another write to the same object (409)
    #[error("conflicting write to {origin}: {response}")]
    ConflictVersion {
        /// Where the error came from
        origin: Origin,
        /// Status returned by the server
        response: ErrorResponse,
    },

    /// The server failed (5xx)
    #[error("server error on {origin}: {response}")]
    ServerError {
        /// Where the error came from
        origin: Origin,
        /// Status returned by the server
        response: ErrorResponse,
    },

    /// The requested resource version is too old to resume from (410)
    #[error("watch of {origin} expired: {response}")]
    WatchExpired {
        /// Where the error came from
        origin: Origin,
        /// Status returned by the server
        response: ErrorResponse,
    },

    /// Any other unsuccessful response
    #[error("api error on {origin}: {response}")]
    Api {
        /// Where the error came from
        origin: Origin,
        /// Status returned by the server
        response: ErrorResponse,
    },

    /// A response did not decode into the expected shape
    #[error("malformed response for {origin}: {source}")]
    MalformedResponse {
        /// Where the error came from
        origin: Origin,
        /// Decoding failure
        #[source]
        source: serde_json::Error,
    },

    /// Reading a streaming response failed
    #[error("stream of {origin} terminated: {message}")]
    StreamTerminated {
        /// Where the error came from
        origin: Origin,
        /// What went wrong while reading
        message: String,
    },

    /// Service error
    #[error("ServiceError: {0}")]
    Service(#[source] tower::BoxError),

    /// Http based error
    #[error("HttpError: {0}")]
    HttpError(#[source] http::Error),

    /// Failed to build request
    #[error("Failed to build request: {0}")]
    BuildRequest(#[source] strela_core::Error),

    /// Failed to infer config
    #[error("Failed to infer config: {0}")]
    InferConfig(#[source] ConfigError),

    /// The default transport only speaks plain http
    #[error("TLS is required for {0} but no TLS stack is available")]
    TlsRequired(http::Uri),
}

impl Error {
    /// Map an unsuccessful response onto the error taxonomy
    ///
    /// `409 Conflict` is only a version conflict for writes; a conflicting read is a plain [`Error::Api`].
    pub fn from_response(method: &Method, status: StatusCode, body: &[u8]) -> Self {
        let response = match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!("Unsuccessful data error parse: {}", String::from_utf8_lossy(body));
                ErrorResponse {
                    status: "Failure".into(),
                    message: String::from_utf8_lossy(body).into_owned(),
                    reason: status.canonical_reason().unwrap_or("Unknown").into(),
                    code: status.as_u16(),
                    details: None,
                }
            }
        };
        tracing::debug!("Unsuccessful: {:?}", response);
        let origin = Origin {
            status: Some(status.as_u16()),
            ..Origin::default()
        };
        let is_write = matches!(
            *method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        );
        match status {
            StatusCode::NOT_FOUND => Self::NotFound { origin, response },
            StatusCode::FORBIDDEN => Self::Forbidden { origin, response },
            StatusCode::UNAUTHORIZED => Self::Unauthorized { origin, response },
            StatusCode::GONE => Self::WatchExpired { origin, response },
            StatusCode::CONFLICT if is_write => Self::ConflictVersion { origin, response },
            s if s.is_server_error() => Self::ServerError { origin, response },
            _ => Self::Api { origin, response },
        }
    }

    /// Fill in the unset parts of the origin of this error
    #[must_use]
    pub fn with_origin(mut self, from: &Origin) -> Self {
        if let Some(origin) = self.origin_mut() {
            *origin = std::mem::take(origin).or(from);
        }
        self
    }

    /// The origin of this error, if it came from the api
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Self::NotFound { origin, .. }
            | Self::Forbidden { origin, .. }
            | Self::Unauthorized { origin, .. }
            | Self::ConflictVersion { origin, .. }
            | Self::ServerError { origin, .. }
            | Self::WatchExpired { origin, .. }
            | Self::Api { origin, .. }
            | Self::MalformedResponse { origin, .. }
            | Self::StreamTerminated { origin, .. } => Some(origin),
            _ => None,
        }
    }

    fn origin_mut(&mut self) -> Option<&mut Origin> {
        match self {
            Self::NotFound { origin, .. }
            | Self::Forbidden { origin, .. }
            | Self::Unauthorized { origin, .. }
            | Self::ConflictVersion { origin, .. }
            | Self::ServerError { origin, .. }
            | Self::WatchExpired { origin, .. }
            | Self::Api { origin, .. }
            | Self::MalformedResponse { origin, .. }
            | Self::StreamTerminated { origin, .. } => Some(origin),
            _ => None,
        }
    }

    /// HTTP status the error was derived from
    pub fn status(&self) -> Option<u16> {
        self.origin().and_then(|o| o.status)
    }

    /// The status object returned by the server, if any
    pub fn response(&self) -> Option<&ErrorResponse> {
        match self {
            Self::NotFound { response, .. }
            | Self::Forbidden { response, .. }
            | Self::Unauthorized { response, .. }
            | Self::ConflictVersion { response, .. }
            | Self::ServerError { response, .. }
            | Self::WatchExpired { response, .. }
            | Self::Api { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Whether repeating the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ServerError { .. } | Self::StreamTerminated { .. } | Self::Service(_)
        )
    }

    pub(crate) fn malformed(source: serde_json::Error) -> Self {
        Self::MalformedResponse {
            origin: Origin::default(),
            source,
        }
    }

    pub(crate) fn terminated(message: impl Into<String>) -> Self {
        Self::StreamTerminated {
            origin: Origin::default(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
/// Possible errors when loading config
pub enum ConfigError {
    /// The cluster url could not be parsed
    #[error("invalid cluster url {url:?}: {source}")]
    InvalidClusterUrl {
        /// The offending url
        url: String,
        /// Parse failure
        #[source]
        source: http::uri::InvalidUri,
    },

    /// A configured header could not be used
    #[error("invalid header {name:?}")]
    InvalidHeader {
        /// Name of the header
        name: String,
    },
}
