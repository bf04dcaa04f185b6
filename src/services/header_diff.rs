use axum::http::HeaderMap;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderComparison {
    pub equal: bool,
    /// One line per differing key, `key: <candidate> => <primary>`.
    pub diff: String,
}

/// Compares two header collections as unordered key sets.
///
/// Keys in `excluded` skip the value check only; a key present on one side alone is still a difference.
pub fn compare_headers(candidate: &HeaderMap, primary: &HeaderMap, excluded: &[String]) -> HeaderComparison {
    let candidate = collect(candidate);
    let primary = collect(primary);
    let is_excluded = |key: &str| excluded.iter().any(|e| e.eq_ignore_ascii_case(key));

    let mut lines = BTreeMap::new();
    for (key, primary_values) in &primary {
        match candidate.get(key) {
            Some(_) if is_excluded(key) => {}
            Some(candidate_values) if candidate_values == primary_values => {}
            Some(candidate_values) => {
                lines.insert(
                    key.clone(),
                    format!("{}: {} => {}", key, render(candidate_values), render(primary_values)),
                );
            }
            None => {
                lines.insert(key.clone(), format!("{}: => {}", key, render(primary_values)));
            }
        }
    }
    for (key, candidate_values) in &candidate {
        if !primary.contains_key(key) {
            lines.insert(key.clone(), format!("{}: {} =>", key, render(candidate_values)));
        }
    }

    HeaderComparison {
        equal: lines.is_empty(),
        diff: lines.into_values().collect::<Vec<_>>().join("\n"),
    }
}

fn collect(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        collected
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    collected
}

fn render(values: &[String]) -> String {
    format!("[{}]", values.join(" "))
}
