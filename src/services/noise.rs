//! Noise detection between Primary and Secondary, and the masks it produces.
//!
//! Primary and Secondary run the same known-good code, so whatever differs between them
//! (timestamps, request ids, ...) is noise and is stripped from both Primary and Candidate
//! before they are compared.

use json_patch::{PatchOperation, RemoveOperation};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::models::{Backend, NoiseError};

/// JSON noise: the pointers whose values differ between Primary and Secondary, plus manual ones.
#[derive(Debug, Clone, Default)]
pub struct JsonNoise {
    mask: Vec<RemoveOperation>,
}

impl JsonNoise {
    /// Diffs Primary against Secondary. Only value replacements are accepted as noise; any key
    /// or element added or removed means the two disagree on shape and detection fails.
    ///
    /// `manual` pointers are appended unconditionally.
    pub fn detect(primary: &[u8], secondary: &[u8], manual: &[String]) -> Result<Self, NoiseError> {
        let mut mask = Vec::new();

        if primary != secondary {
            let primary: Value = serde_json::from_slice(primary).map_err(|source| NoiseError::InvalidJson {
                backend: Backend::Primary,
                source,
            })?;
            let secondary: Value = serde_json::from_slice(secondary).map_err(|source| NoiseError::InvalidJson {
                backend: Backend::Secondary,
                source,
            })?;

            for operation in json_patch::diff(&primary, &secondary).0 {
                match operation {
                    PatchOperation::Replace(replace) => mask.push(RemoveOperation { path: replace.path }),
                    other => return Err(unexpected_operation(&other)),
                }
            }
        }

        for pointer in manual {
            match serde_json::from_value::<RemoveOperation>(json!({ "path": pointer })) {
                Ok(remove) => mask.push(remove),
                Err(e) => warn!(pointer = %pointer, error = %e, "Skipping malformed ignored value pointer"),
            }
        }

        debug!(pointers = mask.len(), "JSON noise detected");
        Ok(Self { mask })
    }

    pub fn contains_noise(&self) -> bool {
        !self.mask.is_empty()
    }

    pub fn pointers(&self) -> impl Iterator<Item = String> + '_ {
        self.mask.iter().map(|remove| remove.path.to_string())
    }

    /// Applies the mask independently to both documents.
    ///
    /// Pointers missing from a document are skipped, and a document that is not valid JSON
    /// passes through unchanged so the comparison reports it.
    pub fn remove(&self, primary: &[u8], candidate: &[u8]) -> (Vec<u8>, Vec<u8>) {
        if !self.contains_noise() {
            return (primary.to_vec(), candidate.to_vec());
        }

        (self.mask_document(primary), self.mask_document(candidate))
    }

    /// Removals run last to first so dropping an array element never shifts a pending index.
    fn mask_document(&self, document: &[u8]) -> Vec<u8> {
        let Ok(mut value) = serde_json::from_slice::<Value>(document) else {
            return document.to_vec();
        };
        for remove in self.mask.iter().rev() {
            let operation = [PatchOperation::Remove(remove.clone())];
            if let Err(e) = json_patch::patch(&mut value, &operation) {
                debug!(pointer = %remove.path, error = %e, "Noise pointer not present in document");
            }
        }
        serde_json::to_vec(&value).unwrap_or_else(|_| document.to_vec())
    }
}

fn unexpected_operation(operation: &PatchOperation) -> NoiseError {
    let described = serde_json::to_value(operation).unwrap_or_default();
    let field = |name: &str| described[name].as_str().unwrap_or_default().to_string();
    NoiseError::UnexpectedOperation {
        op: field("op"),
        pointer: field("path"),
    }
}

/// Plain-text noise: the first byte position where Primary and Secondary diverge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlainTextNoise {
    index: usize,
    noise: bool,
}

impl PlainTextNoise {
    pub fn detect(primary: &[u8], secondary: &[u8]) -> Self {
        let diverges_at = primary
            .iter()
            .enumerate()
            .find(|&(index, byte)| secondary.get(index) != Some(byte))
            .map(|(index, _)| index);

        match diverges_at {
            Some(index) => Self { index, noise: true },
            None if secondary.len() > primary.len() => Self {
                index: primary.len().saturating_sub(1),
                noise: true,
            },
            None => Self::default(),
        }
    }

    pub fn contains_noise(&self) -> bool {
        self.noise
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Truncates both bodies to the common stable prefix.
    ///
    /// When the texts diverge at byte 0 nothing is truncated: cutting both to empty would make
    /// any two payloads compare equal.
    pub fn remove(&self, primary: &[u8], candidate: &[u8]) -> (Vec<u8>, Vec<u8>) {
        if !self.noise || self.index == 0 {
            return (primary.to_vec(), candidate.to_vec());
        }

        let primary_end = self.index.min(primary.len());
        let candidate_end = self.index.min(candidate.len());
        (primary[..primary_end].to_vec(), candidate[..candidate_end].to_vec())
    }
}
