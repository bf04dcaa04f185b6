use serde_json::Value;
use std::fmt::Write;

use crate::models::DifferenceMode;

const INDENT: &str = "    ";

/// How a Candidate document relates to the Primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchOutcome {
    FullMatch,
    /// Candidate has everything Primary has, plus extra object keys or trailing array elements.
    SupersetMatch,
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyComparison {
    pub equal: bool,
    pub diff: Option<String>,
}

impl BodyComparison {
    pub fn equal() -> Self {
        Self {
            equal: true,
            diff: None,
        }
    }

    pub fn different(diff: String) -> Self {
        Self {
            equal: false,
            diff: Some(diff),
        }
    }
}

/// Compares two raw JSON documents under the given difference mode.
pub fn compare_documents(candidate: &[u8], primary: &[u8], mode: DifferenceMode) -> BodyComparison {
    if candidate == primary {
        return BodyComparison::equal();
    }

    let candidate: Value = match serde_json::from_slice(candidate) {
        Ok(value) => value,
        Err(e) => return BodyComparison::different(format!("Candidate is not a valid JSON document: {}", e)),
    };
    let primary: Value = match serde_json::from_slice(primary) {
        Ok(value) => value,
        Err(e) => return BodyComparison::different(format!("Primary is not a valid JSON document: {}", e)),
    };

    compare_values(&candidate, &primary, mode)
}

pub fn compare_values(candidate: &Value, primary: &Value, mode: DifferenceMode) -> BodyComparison {
    let equal = match mode {
        DifferenceMode::Strict => classify(candidate, primary) == MatchOutcome::FullMatch,
        DifferenceMode::Subset => classify(candidate, primary) != MatchOutcome::Mismatch,
        DifferenceMode::Schema => same_shape(candidate, primary),
    };

    if equal {
        BodyComparison::equal()
    } else {
        BodyComparison::different(render_diff(candidate, primary))
    }
}

pub fn classify(candidate: &Value, primary: &Value) -> MatchOutcome {
    match (candidate, primary) {
        (Value::Object(candidate), Value::Object(primary)) => {
            let mut outcome = if candidate.len() > primary.len() {
                MatchOutcome::SupersetMatch
            } else {
                MatchOutcome::FullMatch
            };
            for (key, primary_value) in primary {
                match candidate.get(key) {
                    Some(candidate_value) => outcome = outcome.max(classify(candidate_value, primary_value)),
                    None => return MatchOutcome::Mismatch,
                }
            }
            outcome
        }
        (Value::Array(candidate), Value::Array(primary)) => {
            if candidate.len() < primary.len() {
                return MatchOutcome::Mismatch;
            }
            let outcome = if candidate.len() > primary.len() {
                MatchOutcome::SupersetMatch
            } else {
                MatchOutcome::FullMatch
            };
            candidate
                .iter()
                .zip(primary)
                .map(|(c, p)| classify(c, p))
                .fold(outcome, MatchOutcome::max)
        }
        (Value::Number(c), Value::Number(p)) if c.as_f64() == p.as_f64() => MatchOutcome::FullMatch,
        (candidate, primary) if candidate == primary => MatchOutcome::FullMatch,
        _ => MatchOutcome::Mismatch,
    }
}

/// Same object keys, same array lengths and the same value kind everywhere; scalar values are ignored.
pub fn same_shape(candidate: &Value, primary: &Value) -> bool {
    match (candidate, primary) {
        (Value::Object(candidate), Value::Object(primary)) => {
            candidate.len() == primary.len()
                && primary.iter().all(|(key, primary_value)| {
                    candidate
                        .get(key)
                        .is_some_and(|candidate_value| same_shape(candidate_value, primary_value))
                })
        }
        (Value::Array(candidate), Value::Array(primary)) => {
            candidate.len() == primary.len()
                && candidate.iter().zip(primary).all(|(c, p)| same_shape(c, p))
        }
        (Value::Null, Value::Null)
        | (Value::Bool(_), Value::Bool(_))
        | (Value::Number(_), Value::Number(_))
        | (Value::String(_), Value::String(_)) => true,
        _ => false,
    }
}

/// Renders the Candidate document with differences marked against Primary.
///
/// Changed values read `candidate => primary`. Keys and trailing elements only in Candidate are
/// prefixed with `+`, those only in Primary with `-`.
pub fn render_diff(candidate: &Value, primary: &Value) -> String {
    let mut out = String::new();
    render_pair(&mut out, candidate, primary, 0);
    out
}

fn render_pair(out: &mut String, candidate: &Value, primary: &Value, depth: usize) {
    match (candidate, primary) {
        (Value::Object(candidate), Value::Object(primary)) => {
            out.push_str("{\n");
            let mut entries: Vec<(char, &String, Option<&Value>, Option<&Value>)> = Vec::new();
            for (key, candidate_value) in candidate {
                let marker = if primary.contains_key(key) { ' ' } else { '+' };
                entries.push((marker, key, Some(candidate_value), primary.get(key)));
            }
            for (key, primary_value) in primary {
                if !candidate.contains_key(key) {
                    entries.push(('-', key, None, Some(primary_value)));
                }
            }
            let count = entries.len();
            for (i, (marker, key, candidate_value, primary_value)) in entries.into_iter().enumerate() {
                let prefix = if marker == ' ' { String::new() } else { marker.to_string() };
                let _ = write!(out, "{}{}{:?}: ", INDENT.repeat(depth + 1), prefix, key);
                match (candidate_value, primary_value) {
                    (Some(c), Some(p)) => render_pair(out, c, p, depth + 1),
                    (Some(value), None) | (None, Some(value)) => render_value(out, value, depth + 1),
                    (None, None) => {}
                }
                out.push_str(if i + 1 < count { ",\n" } else { "\n" });
            }
            let _ = write!(out, "{}}}", INDENT.repeat(depth));
        }
        (Value::Array(candidate), Value::Array(primary)) => {
            out.push_str("[\n");
            let count = candidate.len().max(primary.len());
            for i in 0..count {
                out.push_str(&INDENT.repeat(depth + 1));
                match (candidate.get(i), primary.get(i)) {
                    (Some(c), Some(p)) => render_pair(out, c, p, depth + 1),
                    (Some(value), None) => {
                        out.push('+');
                        render_value(out, value, depth + 1);
                    }
                    (None, Some(value)) => {
                        out.push('-');
                        render_value(out, value, depth + 1);
                    }
                    (None, None) => {}
                }
                out.push_str(if i + 1 < count { ",\n" } else { "\n" });
            }
            let _ = write!(out, "{}]", INDENT.repeat(depth));
        }
        (candidate, primary) if classify(candidate, primary) == MatchOutcome::FullMatch => {
            render_value(out, candidate, depth);
        }
        (candidate, primary) => {
            render_value(out, candidate, depth);
            out.push_str(" => ");
            render_value(out, primary, depth);
        }
    }
}

fn render_value(out: &mut String, value: &Value, depth: usize) {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    let continuation = format!("\n{}", INDENT.repeat(depth));
    // serde_json indents with two spaces; re-indent nested lines to our width.
    let reindented: Vec<String> = pretty
        .lines()
        .map(|line| {
            let spaces = line.len() - line.trim_start_matches(' ').len();
            format!("{}{}", INDENT.repeat(spaces / 2), line.trim_start_matches(' '))
        })
        .collect();
    out.push_str(&reindented.join(&continuation));
}
