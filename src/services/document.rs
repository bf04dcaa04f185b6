use crate::models::{DifferenceMode, NoiseError, ProxyConfig};
use crate::services::json_comparison::{compare_documents, BodyComparison};
use crate::services::noise::{JsonNoise, PlainTextNoise};
use crate::services::similarity::similarity_percent;

/// A body format that knows how to find noise, strip it, and compare two bodies.
pub trait DocumentKind {
    type Noise;

    fn detect_noise(&self, primary: &[u8], secondary: &[u8]) -> Result<Self::Noise, NoiseError>;

    fn remove_noise(&self, noise: &Self::Noise, primary: &[u8], candidate: &[u8]) -> (Vec<u8>, Vec<u8>);

    fn compare(&self, candidate: &[u8], primary: &[u8]) -> BodyComparison;

    /// Detects noise between Primary and Secondary and strips it from Primary and Candidate.
    fn cancel_noise(
        &self,
        primary: &[u8],
        secondary: &[u8],
        candidate: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), NoiseError> {
        let noise = self.detect_noise(primary, secondary)?;
        Ok(self.remove_noise(&noise, primary, candidate))
    }
}

#[derive(Debug, Clone, Default)]
pub struct JsonDocument {
    mode: DifferenceMode,
    ignored_pointers: Vec<String>,
}

impl JsonDocument {
    pub fn new(mode: DifferenceMode) -> Self {
        Self {
            mode,
            ignored_pointers: Vec::new(),
        }
    }

    /// Pointers that are always masked, whether or not they were detected as noise.
    pub fn ignore_pointers(&mut self, pointers: Vec<String>) {
        self.ignored_pointers = pointers;
    }
}

impl DocumentKind for JsonDocument {
    type Noise = JsonNoise;

    fn detect_noise(&self, primary: &[u8], secondary: &[u8]) -> Result<JsonNoise, NoiseError> {
        JsonNoise::detect(primary, secondary, &self.ignored_pointers)
    }

    fn remove_noise(&self, noise: &JsonNoise, primary: &[u8], candidate: &[u8]) -> (Vec<u8>, Vec<u8>) {
        noise.remove(primary, candidate)
    }

    fn compare(&self, candidate: &[u8], primary: &[u8]) -> BodyComparison {
        compare_documents(candidate, primary, self.mode)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlainTextDocument {
    levenshtein_percentage: u8,
}

impl PlainTextDocument {
    pub fn new(levenshtein_percentage: u8) -> Self {
        Self {
            levenshtein_percentage,
        }
    }
}

impl DocumentKind for PlainTextDocument {
    type Noise = PlainTextNoise;

    fn detect_noise(&self, primary: &[u8], secondary: &[u8]) -> Result<PlainTextNoise, NoiseError> {
        Ok(PlainTextNoise::detect(primary, secondary))
    }

    fn remove_noise(&self, noise: &PlainTextNoise, primary: &[u8], candidate: &[u8]) -> (Vec<u8>, Vec<u8>) {
        noise.remove(primary, candidate)
    }

    /// Exact match at a 100% threshold, otherwise similarity must be strictly above it.
    fn compare(&self, candidate: &[u8], primary: &[u8]) -> BodyComparison {
        if self.levenshtein_percentage >= 100 {
            return if candidate == primary {
                BodyComparison::equal()
            } else {
                BodyComparison::different("plain text content differs".to_string())
            };
        }

        let similarity = similarity_percent(primary, candidate);
        if similarity > self.levenshtein_percentage {
            BodyComparison::equal()
        } else {
            BodyComparison::different(format!(
                "plain text similarity {}% is not above the {}% threshold",
                similarity, self.levenshtein_percentage
            ))
        }
    }
}

/// The body format picked for one request.
#[derive(Debug, Clone)]
pub enum Document {
    Json(JsonDocument),
    PlainText(PlainTextDocument),
}

impl Document {
    /// `application/json` and `text/plain` select themselves. Any other content type is JSON
    /// unless `force_plain_text` is set.
    pub fn select(content_type: Option<&str>, config: &ProxyConfig) -> Self {
        let content_type = content_type.unwrap_or_default();
        let plain = if content_type.starts_with("application/json") {
            false
        } else if content_type.starts_with("text/plain") {
            true
        } else {
            config.force_plain_text
        };

        if plain {
            Document::PlainText(PlainTextDocument::new(config.levenshtein_percentage))
        } else {
            Document::Json(JsonDocument::new(config.difference_mode))
        }
    }

    pub fn cancel_noise(
        &self,
        primary: &[u8],
        secondary: &[u8],
        candidate: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), NoiseError> {
        match self {
            Document::Json(json) => json.cancel_noise(primary, secondary, candidate),
            Document::PlainText(plain) => plain.cancel_noise(primary, secondary, candidate),
        }
    }

    pub fn compare(&self, candidate: &[u8], primary: &[u8]) -> BodyComparison {
        match self {
            Document::Json(json) => json.compare(candidate, primary),
            Document::PlainText(plain) => plain.compare(candidate, primary),
        }
    }
}
