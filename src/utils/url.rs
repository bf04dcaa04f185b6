use axum::http::Uri;

/// Rewrites `original` onto `base`: scheme, host and port come from `base`, path and query are kept verbatim.
pub fn create_url(original: &Uri, base: &str) -> String {
    let base = base.strip_suffix('/').unwrap_or(base);
    let request_uri = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");

    format!("{}{}", base, request_uri)
}
