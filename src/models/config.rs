use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use utoipa::ToSchema;

use crate::models::{ProxyError, ProxyResult, ResponsePolicy};
use crate::utils::validation::validate_url;

/// Equivalence policy applied to JSON bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DifferenceMode {
    /// Candidate must be identical to Primary.
    #[default]
    Strict,
    /// Candidate may carry extra keys on top of Primary's.
    Subset,
    /// Candidate must have Primary's shape; scalar values are ignored.
    Schema,
}

impl fmt::Display for DifferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DifferenceMode::Strict => "Strict",
            DifferenceMode::Subset => "Subset",
            DifferenceMode::Schema => "Schema",
        };
        f.write_str(name)
    }
}

impl FromStr for DifferenceMode {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Strict" => Ok(DifferenceMode::Strict),
            "Subset" => Ok(DifferenceMode::Subset),
            "Schema" => Ok(DifferenceMode::Schema),
            other => Err(ProxyError::InvalidConfiguration(format!(
                "Cannot find {} difference mode",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub port: u16,
    pub admin_port: u16,
    /// Labels the service under test in comparison and regression logs. Defaults to the
    /// Candidate hostname.
    pub service_name: String,
    pub primary: String,
    pub secondary: Option<String>,
    pub candidate: String,
    pub difference_mode: DifferenceMode,
    pub noise_detection: bool,
    pub allow_unsafe_operations: bool,
    pub mirroring: bool,
    pub return_result: bool,
    pub headers: bool,
    pub ignore_headers_values: Vec<String>,
    pub ignore_values: Vec<String>,
    pub ignore_values_file: Option<String>,
    pub force_plain_text: bool,
    pub levenshtein_percentage: u8,
    pub store_results: Option<String>,
    pub insecure_skip_verify: bool,
    pub ca_cert: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            admin_port: 8082,
            service_name: String::new(),
            primary: String::new(),
            secondary: None,
            candidate: String::new(),
            difference_mode: DifferenceMode::Strict,
            noise_detection: false,
            allow_unsafe_operations: false,
            mirroring: false,
            return_result: false,
            headers: false,
            ignore_headers_values: Vec::new(),
            ignore_values: Vec::new(),
            ignore_values_file: None,
            force_plain_text: false,
            levenshtein_percentage: 100,
            store_results: None,
            insecure_skip_verify: false,
            ca_cert: None,
            client_cert: None,
            client_key: None,
        }
    }
}

impl ProxyConfig {
    pub fn new(primary: impl Into<String>, candidate: impl Into<String>) -> Self {
        let mut config = Self {
            primary: primary.into(),
            candidate: candidate.into(),
            ..Self::default()
        };
        config.set_service_name("");
        config
    }

    /// Sets the service name, falling back to the Candidate hostname when empty.
    pub fn set_service_name(&mut self, service_name: &str) {
        if service_name.is_empty() {
            self.service_name = reqwest::Url::parse(&self.candidate)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
                .unwrap_or_default();
        } else {
            self.service_name = service_name.to_string();
        }
    }

    pub fn is_store_results_set(&self) -> bool {
        self.store_results.as_deref().is_some_and(|path| !path.is_empty())
    }

    pub fn are_https_client_params_set(&self) -> bool {
        self.ca_cert.is_some() && self.client_cert.is_some() && self.client_key.is_some()
    }

    pub fn response_policy(&self) -> ResponsePolicy {
        ResponsePolicy {
            mirroring: self.mirroring,
            return_result: self.return_result,
        }
    }

    /// Applies an admin update. Every field is validated before anything is changed.
    pub fn apply_update(&mut self, update: ConfigUpdate) -> ProxyResult<()> {
        let update = update.without_empty_fields();
        let mode = update.mode.as_deref().map(DifferenceMode::from_str).transpose()?;
        let noise_detection = update
            .noise_detection
            .as_deref()
            .map(parse_bool)
            .transpose()?;
        for url in [&update.primary, &update.secondary, &update.candidate]
            .into_iter()
            .flatten()
        {
            validate_url(url)?;
        }

        if let Some(primary) = update.primary {
            self.primary = primary;
        }
        if let Some(secondary) = update.secondary {
            self.secondary = Some(secondary);
        }
        let service_name = update.service_name.unwrap_or_default();
        if let Some(candidate) = update.candidate {
            self.candidate = candidate;
            if service_name.is_empty() {
                self.set_service_name("");
            }
        }
        if !service_name.is_empty() {
            self.set_service_name(&service_name);
        }
        if let Some(mode) = mode {
            self.difference_mode = mode;
        }
        if let Some(noise_detection) = noise_detection {
            self.noise_detection = noise_detection;
        }

        info!(
            service = %self.service_name,
            primary = %self.primary,
            candidate = %self.candidate,
            mode = %self.difference_mode,
            noise_detection = self.noise_detection,
            "Configuration updated"
        );
        Ok(())
    }
}

fn parse_bool(value: &str) -> ProxyResult<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(ProxyError::InvalidConfiguration(format!(
            "noiseDetection must be a boolean, got {}",
            other
        ))),
    }
}

/// Body of the admin `PUT /configuration` call. Absent or empty fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    pub service_name: Option<String>,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub candidate: Option<String>,
    pub noise_detection: Option<String>,
    pub mode: Option<String>,
}

impl ConfigUpdate {
    fn without_empty_fields(self) -> Self {
        let set = |value: Option<String>| value.filter(|v| !v.is_empty());
        Self {
            service_name: set(self.service_name),
            primary: set(self.primary),
            secondary: set(self.secondary),
            candidate: set(self.candidate),
            noise_detection: set(self.noise_detection),
            mode: set(self.mode),
        }
    }
}

/// Process-wide configuration. Comparisons hold this lock for their whole run.
pub type SharedConfig = Arc<Mutex<ProxyConfig>>;

pub fn shared(config: ProxyConfig) -> SharedConfig {
    Arc::new(Mutex::new(config))
}
