//! The comparison pipeline.
//!
//! One run replays the inbound request against Primary and Candidate (and Secondary when noise
//! detection is on), cancels noise, compares, and optionally exports the interactions. The shared
//! configuration lock is held for the whole run, so admin updates never interleave with a comparison.

use axum::http::{HeaderMap, Method};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, warn};

use crate::models::{
    Backend, BackendResponse, Communication, Comparison, ComparisonResult, DifferenceDescription,
    InboundRequest, Interaction, Interactions, PipelineFailure, ProxyConfig, ProxyError, ProxyResult,
    SharedConfig,
};
use crate::services::document::Document;
use crate::services::events::EventSink;
use crate::services::header_diff::compare_headers;
use crate::services::http_client::BackendFetcher;
use crate::utils::create_url;

pub fn is_safe_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
}

pub struct Orchestrator {
    config: SharedConfig,
    fetcher: Arc<dyn BackendFetcher>,
    events: Arc<dyn EventSink>,
}

impl Orchestrator {
    pub fn new(config: SharedConfig, fetcher: Arc<dyn BackendFetcher>, events: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            fetcher,
            events,
        }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Runs the pipeline for one inbound request.
    ///
    /// A regression is a successful run with `equal_content == false`; only infrastructure
    /// failures come back as `Err`, carrying the Primary snapshot once it has been fetched.
    pub async fn compare(&self, request: &InboundRequest) -> Result<Comparison, PipelineFailure> {
        let config = self.config.lock().await;
        self.run(&config, request).await
    }

    async fn run(&self, config: &ProxyConfig, request: &InboundRequest) -> Result<Comparison, PipelineFailure> {
        let policy = config.response_policy();

        if !config.allow_unsafe_operations && !config.mirroring && !is_safe_method(&request.method) {
            debug!(method = %request.method, "Unsafe method rejected");
            return Err(PipelineFailure::new(
                ProxyError::UnsafeMethodRejected(request.method.clone()),
                policy,
            ));
        }

        debug!(uri = %request.uri, "URL is going to be processed");

        let primary_url = create_url(&request.uri, &config.primary);
        let primary = self
            .fetch(Backend::Primary, request, &primary_url)
            .await
            .map_err(|e| PipelineFailure::new(e, policy))?;
        let fail = |error: ProxyError| PipelineFailure::with_primary(error, primary.communication.clone(), policy);

        let candidate_url = create_url(&request.uri, &config.candidate);
        let candidate = self
            .fetch(Backend::Candidate, request, &candidate_url)
            .await
            .map_err(fail)?;

        let document = self.select_document(config, &primary.communication).await;

        let mut secondary_interaction = None;
        let (primary_body, candidate_body) = if config.noise_detection {
            let secondary_base = config.secondary.as_deref().ok_or_else(|| {
                fail(ProxyError::InvalidConfiguration(
                    "Noise detection is enabled but no secondary URL is configured".to_string(),
                ))
            })?;
            let secondary_url = create_url(&request.uri, secondary_base);
            let secondary = self
                .fetch(Backend::Secondary, request, &secondary_url)
                .await
                .map_err(fail)?;

            let primary_status = primary.communication.status_code;
            let secondary_status = secondary.communication.status_code;
            if primary_status != secondary_status {
                let mismatch = ProxyError::StatusMismatch {
                    primary_url: primary_url.clone(),
                    primary_status,
                    secondary_url: secondary_url.clone(),
                    secondary_status,
                };
                error!("{}", mismatch);
                return Err(fail(mismatch));
            }

            let masked = document
                .cancel_noise(
                    &primary.communication.content,
                    &secondary.communication.content,
                    &candidate.communication.content,
                )
                .map_err(|source| {
                    let noise = ProxyError::NoiseValidationFailed {
                        primary_url: primary_url.clone(),
                        secondary_url: secondary_url.clone(),
                        source,
                    };
                    error!("{}", noise);
                    fail(noise)
                })?;

            secondary_interaction = Some(Interaction::new(
                &secondary_url,
                &secondary.communication.content,
                secondary_status,
            ));
            masked
        } else {
            (
                primary.communication.content.to_vec(),
                candidate.communication.content.to_vec(),
            )
        };

        let (equal, diff) = evaluate(
            config,
            &document,
            &primary.communication,
            &candidate.communication,
            &primary_body,
            &candidate_body,
        );

        if let Some(store_results) = config.store_results.as_deref().filter(|_| config.is_store_results_set()) {
            let interactions = Interactions::new(
                Interaction::new(&primary_url, &primary.communication.content, primary.communication.status_code),
                secondary_interaction,
                Interaction::new(
                    &candidate_url,
                    &candidate.communication.content,
                    candidate.communication.status_code,
                ),
                config.difference_mode,
                equal,
            );
            self.events
                .export_interactions(Path::new(store_results), &interactions)
                .await;
        }

        debug!(
            service = %config.service_name,
            primary = %primary_url,
            candidate = %candidate_url,
            equal,
            "Result of comparison"
        );
        if !equal {
            explain_failure(config, &primary.communication, &candidate.communication, &primary_body, &candidate_body);
        }

        let BackendResponse {
            communication: primary_communication,
            elapsed: primary_elapsed,
        } = primary;

        Ok(Comparison {
            result: ComparisonResult {
                equal_content: equal,
                primary_elapsed,
                candidate_elapsed: candidate.elapsed,
                diff,
            },
            primary: primary_communication,
            policy,
        })
    }

    async fn fetch(&self, backend: Backend, request: &InboundRequest, url: &str) -> ProxyResult<BackendResponse> {
        debug!(backend = %backend, url, "Forwarding call");
        self.fetcher.fetch(request, url).await.map_err(|source| {
            let error = ProxyError::UpstreamUnavailable {
                backend,
                url: url.to_string(),
                source,
            };
            error!("{}", error);
            error
        })
    }

    /// Picks the body format from Primary's content type; with noise detection on, JSON
    /// documents also carry the manually ignored pointers.
    async fn select_document(&self, config: &ProxyConfig, primary: &Communication) -> Document {
        let mut document = Document::select(primary.content_type(), config);
        if config.noise_detection {
            if let Document::Json(json) = &mut document {
                json.ignore_pointers(manual_pointers(config).await);
            }
        }
        document
    }
}

/// `ignoreValues` followed by the non-blank lines of `ignoreValuesFile`. An unreadable file is skipped.
async fn manual_pointers(config: &ProxyConfig) -> Vec<String> {
    let mut pointers = config.ignore_values.clone();

    if let Some(file) = config.ignore_values_file.as_deref().filter(|file| !file.is_empty()) {
        match fs::read_to_string(file).await {
            Ok(content) => pointers.extend(
                content
                    .lines()
                    .map(str::trim_end)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            ),
            Err(e) => warn!(
                file,
                error = %e,
                "Cannot read ignore values file, execution continues without it"
            ),
        }
    }

    pointers
}

fn evaluate(
    config: &ProxyConfig,
    document: &Document,
    primary: &Communication,
    candidate: &Communication,
    primary_body: &[u8],
    candidate_body: &[u8],
) -> (bool, DifferenceDescription) {
    if primary.status_code != candidate.status_code {
        let diff = DifferenceDescription {
            status_diff: Some(format!(
                "\"status\": {} => {}",
                primary.status_code, candidate.status_code
            )),
            ..DifferenceDescription::default()
        };
        return (false, diff);
    }

    let mut diff = DifferenceDescription::default();

    let headers_equal = if config.headers {
        let headers = compare_headers(&candidate.headers, &primary.headers, &config.ignore_headers_values);
        if !headers.equal {
            diff.headers_diff = Some(headers.diff);
        }
        headers.equal
    } else {
        true
    };

    let body = document.compare(candidate_body, primary_body);
    diff.body_diff = body.diff;

    let equal = body.equal && headers_equal;
    if equal {
        diff = DifferenceDescription::default();
    }
    (equal, diff)
}

fn explain_failure(
    config: &ProxyConfig,
    primary: &Communication,
    candidate: &Communication,
    primary_body: &[u8],
    candidate_body: &[u8],
) {
    debug!("************************");
    debug!("Explanation of Failure in {}:", config.service_name);
    debug!(
        "Primary Status Code: {} Candidate StatusCode: {}",
        primary.status_code, candidate.status_code
    );
    debug!("Primary Content:\n{}", String::from_utf8_lossy(primary_body));
    debug!("Candidate Content:\n{}", String::from_utf8_lossy(candidate_body));
    if config.headers {
        debug!("Primary Headers:\n{}", key_value_pairs(&primary.headers));
        debug!("Candidate Headers:\n{}", key_value_pairs(&candidate.headers));
    }
    debug!("************************");
}

fn key_value_pairs(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}=\"{}\"", name, String::from_utf8_lossy(value.as_bytes())))
        .collect::<Vec<_>>()
        .join("\n")
}
