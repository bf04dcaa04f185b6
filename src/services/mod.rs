pub mod document;
pub mod events;
pub mod exporter;
pub mod header_diff;
pub mod http_client;
pub mod json_comparison;
pub mod noise;
pub mod orchestrator;
pub mod similarity;
pub mod stats;

pub use document::{Document, DocumentKind, JsonDocument, PlainTextDocument};
pub use events::{EventSink, ProxyEvents};
pub use http_client::{BackendFetcher, ReqwestFetcher};
pub use orchestrator::Orchestrator;
pub use stats::{Entry, ErrorData, StatsStore, UrlCall};
