use crate::body::ResponseBody;
use crate::respond;
use http::{Response, StatusCode};
use micro_pool::PoolError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Raised while the pipeline is being assembled: route registration, static options,
/// configuration files. None of these are recoverable, startup must stop.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("route method must not be empty")]
    MissingMethod,

    #[error("invalid route method '{method}'")]
    InvalidMethod { method: String },

    #[error("route path must not be empty")]
    MissingPath,

    #[error("route path '{path}' must start with '/'")]
    PathWithoutSeparator { path: String },

    #[error("rest segment '{segment}' must be the last segment of '{path}'")]
    RestNotLast { segment: String, path: String },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid mime type '{mime}' for pattern '{pattern}'")]
    InvalidMime { pattern: String, mime: String },

    #[error("invalid address '{address}'")]
    InvalidAddress { address: String },

    #[error("can't read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't parse config: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn invalid_method<S: ToString>(method: S) -> Self {
        Self::InvalidMethod { method: method.to_string() }
    }

    pub fn path_without_separator<S: ToString>(path: S) -> Self {
        Self::PathWithoutSeparator { path: path.to_string() }
    }

    pub fn rest_not_last<S: ToString, P: ToString>(segment: S, path: P) -> Self {
        Self::RestNotLast { segment: segment.to_string(), path: path.to_string() }
    }

    pub fn invalid_pattern<S: ToString>(pattern: S, source: regex::Error) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), source }
    }
}

/// Setup failure of a single static file. The file is left out of the registry, the
/// remaining files are still served.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("can't read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't process '{}': {source}", path.display())]
    Process {
        path: PathBuf,
        #[source]
        source: PoolError,
    },
}

/// A per-request failure, rendered to the client as
/// `{"error": {"code": .., "message": .., "cause": ..}}`.
///
/// Expected failures (404, 405, ..) and unexpected ones share this shape, the latter only
/// differ by the generic 500 code.
#[derive(Debug, Clone, Serialize)]
pub struct HttpError {
    code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<String>,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    error: &'a HttpError,
}

impl HttpError {
    pub fn new<S: ToString>(status: StatusCode, message: S) -> Self {
        Self { code: status.as_u16(), message: message.to_string(), cause: None }
    }

    /// Uses the canonical reason phrase as message.
    pub fn status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("Unknown"))
    }

    pub fn bad_request() -> Self {
        Self::status(StatusCode::BAD_REQUEST)
    }

    pub fn not_found() -> Self {
        Self::status(StatusCode::NOT_FOUND)
    }

    pub fn method_not_allowed() -> Self {
        Self::status(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn internal<E: Display>(cause: E) -> Self {
        Self::status(StatusCode::INTERNAL_SERVER_ERROR).with_cause(cause)
    }

    pub fn with_cause<E: Display>(mut self, cause: E) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    pub fn into_response(self) -> Response<ResponseBody> {
        respond::json(self.status_code(), &ErrorPayload { error: &self })
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} {}: {}", self.code, self.message, cause),
            None => write!(f, "{} {}", self.code, self.message),
        }
    }
}

impl Error for HttpError {}

impl From<Box<dyn Error + Send + Sync>> for HttpError {
    fn from(e: Box<dyn Error + Send + Sync>) -> Self {
        Self::internal(e)
    }
}

impl From<io::Error> for HttpError {
    fn from(e: io::Error) -> Self {
        Self::internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::HttpError;
    use http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_error_payload_shape() {
        let response = HttpError::not_found().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[http::header::CONTENT_TYPE], "application/json; charset=utf-8");

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({ "error": { "code": 404, "message": "Not Found" } }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_internal_error_carries_cause() {
        let response = HttpError::internal("disk on fire").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["error"]["message"], "Internal Server Error");
        assert_eq!(value["error"]["cause"], "disk on fire");
    }
}
