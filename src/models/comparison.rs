use axum::body::Bytes;
use axum::http::{header::CONTENT_TYPE, HeaderMap, Method, Uri};
use serde::{Serialize, Serializer};
use std::time::Duration;
use utoipa::ToSchema;

/// Inbound client request, with its body buffered once so it can be replayed against every backend.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// One backend's response. Never mutated after the fetch.
#[derive(Debug, Clone)]
pub struct Communication {
    pub content: Bytes,
    pub status_code: u16,
    pub headers: HeaderMap,
    pub cookies: Vec<String>,
}

impl Communication {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub communication: Communication,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DifferenceDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers_diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_diff: Option<String>,
}

impl DifferenceDescription {
    pub fn is_empty(&self) -> bool {
        self.headers_diff.is_none() && self.body_diff.is_none() && self.status_diff.is_none()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub equal_content: bool,
    #[serde(rename = "primaryElapsedMs", serialize_with = "as_millis")]
    #[schema(value_type = u64)]
    pub primary_elapsed: Duration,
    #[serde(rename = "candidateElapsedMs", serialize_with = "as_millis")]
    #[schema(value_type = u64)]
    pub candidate_elapsed: Duration,
    pub diff: DifferenceDescription,
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// How the caller should shape the client response, captured under the comparison lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponsePolicy {
    pub mirroring: bool,
    pub return_result: bool,
}

/// Outcome of a pipeline run that reached the comparison state.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub result: ComparisonResult,
    pub primary: Communication,
    pub policy: ResponsePolicy,
}
