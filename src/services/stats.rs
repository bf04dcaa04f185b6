use axum::http::HeaderMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::RwLock;
use utoipa::ToSchema;

/// An endpoint, as seen by the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
pub struct UrlCall {
    pub method: String,
    pub path: String,
}

impl UrlCall {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
        }
    }
}

/// Details of one regression, kept for the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorData {
    #[serde(rename = "fullURI")]
    pub full_uri: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub original_body: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub original_headers: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub header_diff: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body_diff: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status_diff: String,
}

impl ErrorData {
    pub fn new(full_uri: &str, body: &[u8], headers: &HeaderMap) -> Self {
        let mut original_headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            original_headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        Self {
            full_uri: full_uri.to_string(),
            original_body: String::from_utf8_lossy(body).into_owned(),
            original_headers,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CallData {
    success: u64,
    errors: u64,
    error_details: Vec<ErrorData>,
    primary_total: Duration,
    candidate_total: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub endpoint: UrlCall,
    pub error_details: Vec<ErrorData>,
    pub errors: u64,
    pub success: u64,
    /// Milliseconds, rounded to two decimals.
    pub average_primary_duration: f64,
    pub average_candidate_duration: f64,
}

impl Entry {
    fn from_call(endpoint: UrlCall, data: &CallData) -> Self {
        Self {
            endpoint,
            error_details: data.error_details.clone(),
            errors: data.errors,
            success: data.success,
            average_primary_duration: average_millis(data.primary_total, data.success),
            average_candidate_duration: average_millis(data.candidate_total, data.success),
        }
    }
}

fn average_millis(total: Duration, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let millis = total.as_secs_f64() * 1000.0 / count as f64;
    (millis * 100.0).round() / 100.0
}

/// Per-endpoint success/regression counters.
#[derive(Debug, Default)]
pub struct StatsStore {
    calls: RwLock<HashMap<UrlCall, CallData>>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new success count for the endpoint.
    pub async fn record_success(&self, method: &str, path: &str, primary: Duration, candidate: Duration) -> u64 {
        let mut calls = self.calls.write().await;
        let data = calls.entry(UrlCall::new(method, path)).or_default();
        data.success += 1;
        data.primary_total += primary;
        data.candidate_total += candidate;
        data.success
    }

    /// Returns the new error count for the endpoint.
    pub async fn record_error(&self, method: &str, path: &str, error: ErrorData) -> u64 {
        let mut calls = self.calls.write().await;
        let data = calls.entry(UrlCall::new(method, path)).or_default();
        data.errors += 1;
        data.error_details.push(error);
        data.errors
    }

    pub async fn find_entry(&self, method: &str, path: &str) -> Option<Entry> {
        let call = UrlCall::new(method, path);
        let calls = self.calls.read().await;
        calls.get(&call).map(|data| Entry::from_call(call, data))
    }

    /// Every endpoint seen so far, ordered by path then method.
    pub async fn entries(&self) -> Vec<Entry> {
        let calls = self.calls.read().await;
        let mut entries: Vec<Entry> = calls
            .iter()
            .map(|(call, data)| Entry::from_call(call.clone(), data))
            .collect();
        entries.sort_by(|a, b| {
            (&a.endpoint.path, &a.endpoint.method).cmp(&(&b.endpoint.path, &b.endpoint.method))
        });
        entries
    }

    pub async fn reset(&self) {
        self.calls.write().await.clear();
    }
}
