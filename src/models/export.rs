use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::DifferenceMode;

/// One backend call as written to the results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub url: String,
    pub content: String,
    #[serde(rename = "status")]
    pub status_code: u16,
}

impl Interaction {
    pub fn new(url: &str, content: &[u8], status_code: u16) -> Self {
        Self {
            url: url.to_string(),
            content: String::from_utf8_lossy(content).into_owned(),
            status_code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interactions {
    pub primary: Interaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Interaction>,
    pub candidate: Interaction,
    pub difference_mode: String,
    pub result: bool,
    #[serde(rename = "processedDate")]
    pub processed: DateTime<Utc>,
}

impl Interactions {
    pub fn new(
        primary: Interaction,
        secondary: Option<Interaction>,
        candidate: Interaction,
        difference_mode: DifferenceMode,
        result: bool,
    ) -> Self {
        Self {
            primary,
            secondary,
            candidate,
            difference_mode: difference_mode.to_string(),
            result,
            processed: Utc::now(),
        }
    }
}
