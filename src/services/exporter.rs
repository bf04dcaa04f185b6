use std::io;
use std::path::Path;
use tokio::fs;

use crate::models::Interactions;

/// Writes the interactions of one request to `path` as a single JSON document, replacing any previous content.
pub async fn export_to_file(path: &Path, interactions: &Interactions) -> io::Result<()> {
    let mut json = serde_json::to_vec(interactions)?;
    json.push(b'\n');
    fs::write(path, json).await
}
