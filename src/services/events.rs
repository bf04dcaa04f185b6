use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::Interactions;
use crate::services::exporter::export_to_file;
use crate::services::stats::{ErrorData, StatsStore};

/// Where comparison outcomes are reported. None of these calls can fail the request.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record_success(&self, method: &str, path: &str, primary: Duration, candidate: Duration);

    async fn record_error(&self, method: &str, path: &str, error: ErrorData);

    async fn export_interactions(&self, path: &Path, interactions: &Interactions);
}

/// Reports to the in-memory stats store and exports interactions to disk.
pub struct ProxyEvents {
    stats: Arc<StatsStore>,
}

impl ProxyEvents {
    pub fn new(stats: Arc<StatsStore>) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl EventSink for ProxyEvents {
    async fn record_success(&self, method: &str, path: &str, primary: Duration, candidate: Duration) {
        let success = self.stats.record_success(method, path, primary, candidate).await;
        debug!(method, path, success, "Recorded equal response");
    }

    async fn record_error(&self, method: &str, path: &str, error: ErrorData) {
        let errors = self.stats.record_error(method, path, error).await;
        debug!(method, path, errors, "Recorded regression");
    }

    async fn export_interactions(&self, path: &Path, interactions: &Interactions) {
        if let Err(e) = export_to_file(path, interactions).await {
            warn!(path = %path.display(), error = %e, "Failed to export interactions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DifferenceMode, Interaction};

    #[tokio::test]
    async fn test_events_feed_stats() {
        let stats = Arc::new(StatsStore::new());
        let events = ProxyEvents::new(stats.clone());

        events
            .record_success("GET", "/a", Duration::from_millis(4), Duration::from_millis(6))
            .await;
        events.record_error("GET", "/a", ErrorData::default()).await;

        let entry = stats.find_entry("GET", "/a").await.unwrap();
        assert_eq!(entry.success, 1);
        assert_eq!(entry.errors, 1);
        assert_eq!(entry.average_candidate_duration, 6.0);
    }

    #[tokio::test]
    async fn test_export_failure_is_swallowed() {
        let events = ProxyEvents::new(Arc::new(StatsStore::new()));
        let interactions = Interactions::new(
            Interaction::new("http://primary/", b"", 200),
            None,
            Interaction::new("http://candidate/", b"", 200),
            DifferenceMode::Strict,
            true,
        );
        events
            .export_interactions(Path::new("/nonexistent/dir/results.json"), &interactions)
            .await;
    }
}
