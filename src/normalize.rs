use crate::backend::ExecutionResult;
use crate::types::Outcome;
use serde::Deserialize;

/// Failure-kind tags a backend uses to mark skipped tests and hard errors,
/// as opposed to plain assertion failures. These are opaque backend
/// conventions, so each display service carries its own vocabulary.
#[derive(Debug, Clone)]
pub struct TagVocabulary {
    pub skip_tags: Vec<String>,
    pub error_tags: Vec<String>,
}

impl Default for TagVocabulary {
    fn default() -> Self {
        Self {
            skip_tags: vec!["skip".into(), "pending_implementation".into()],
            error_tags: vec!["error".into(), "unexpected_error".into()],
        }
    }
}

impl TagVocabulary {
    fn is_skip(&self, kind: &str) -> bool {
        self.skip_tags.iter().any(|t| t == kind)
    }

    fn is_error(&self, kind: &str) -> bool {
        self.error_tags.iter().any(|t| t == kind)
    }
}

/// One record of the result payload: a JSON array with exactly one of these.
/// `failures` entries are `[kind, detail, ...]` arrays; only the kind tag
/// matters for classification.
#[derive(Debug, Deserialize)]
struct RawRecord {
    failures: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    #[allow(dead_code)]
    assertions: u64,
}

/// Classify a raw backend payload into a canonical outcome.
///
/// Precedence: structurally invalid payload -> error; any skip-tagged
/// failure -> skip; any error-tagged failure -> error; any failure at
/// all -> fail; otherwise pass. A transport failure is always an error,
/// never a silent pass.
pub fn normalize(result: &ExecutionResult, tags: &TagVocabulary) -> Outcome {
    let raw = match result {
        ExecutionResult::Transported(raw) => raw,
        ExecutionResult::TransportFailure(_) => return Outcome::Error,
    };
    let records: Vec<RawRecord> = match serde_json::from_str(raw) {
        Ok(records) => records,
        Err(_) => return Outcome::Error,
    };
    if records.len() != 1 {
        return Outcome::Error;
    }
    let kinds: Vec<&str> = records[0]
        .failures
        .iter()
        .filter_map(|entry| entry.first().and_then(|v| v.as_str()))
        .collect();

    if kinds.iter().any(|k| tags.is_skip(k)) {
        return Outcome::Skip;
    }
    if kinds.iter().any(|k| tags.is_error(k)) {
        return Outcome::Error;
    }
    if records[0].failures.is_empty() {
        Outcome::Pass
    } else {
        Outcome::Fail
    }
}
