use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::models::{Communication, ResponsePolicy};

/// The three backends a request can be replayed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Primary,
    Secondary,
    Candidate,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Primary => "Primary",
            Backend::Secondary => "Secondary",
            Backend::Candidate => "Candidate",
        };
        f.write_str(name)
    }
}

/// Transport level failure while talking to a backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FetchError(pub String);

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        FetchError(error.to_string())
    }
}

/// Reasons why the Primary/Secondary structural patch cannot be used as a noise mask.
#[derive(Error, Debug)]
pub enum NoiseError {
    #[error("{backend} payload is not a valid JSON document: {source}")]
    InvalidJson {
        backend: Backend,
        #[source]
        source: serde_json::Error,
    },

    #[error("Primary and Secondary payloads contain other changes apart from replacing values: {op} at \"{pointer}\"")]
    UnexpectedOperation { op: String, pointer: String },
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Unsafe operations are not allowed and {0} method has been received")]
    UnsafeMethodRejected(Method),

    #[error("Error while connecting to {backend} site ({url}) with {source}")]
    UpstreamUnavailable {
        backend: Backend,
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Status code between {primary_url}({primary_status}) and {secondary_url}({secondary_status}) are different")]
    StatusMismatch {
        primary_url: String,
        primary_status: u16,
        secondary_url: String,
        secondary_status: u16,
    },

    #[error("Error detecting noise between {primary_url} and {secondary_url}. ({source})")]
    NoiseValidationFailed {
        primary_url: String,
        secondary_url: String,
        #[source]
        source: NoiseError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::UnsafeMethodRejected(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::StatusMismatch { .. } => StatusCode::BAD_REQUEST,
            ProxyError::NoiseValidationFailed { .. } => StatusCode::BAD_REQUEST,
            ProxyError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            ProxyError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            ProxyError::InternalError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;

/// A pipeline abort, carrying the Primary snapshot when one was already fetched.
#[derive(Debug)]
pub struct PipelineFailure {
    pub error: ProxyError,
    pub primary: Option<Communication>,
    pub policy: ResponsePolicy,
}

impl PipelineFailure {
    pub fn new(error: ProxyError, policy: ResponsePolicy) -> Self {
        Self {
            error,
            primary: None,
            policy,
        }
    }

    pub fn with_primary(error: ProxyError, primary: Communication, policy: ResponsePolicy) -> Self {
        Self {
            error,
            primary: Some(primary),
            policy,
        }
    }
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for PipelineFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
