use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical classification of one case's result.
///
/// Outcomes are compared for equality only; there is no severity ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::Skip => "skip",
            Outcome::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// category -> test name -> outcome.
///
/// BTreeMap keeps both levels lexicographically sorted, so serialized
/// results files are deterministic and diff-friendly.
pub type ResultSet = BTreeMap<String, BTreeMap<String, Outcome>>;

/// One persisted run: which display service, which configuration variant,
/// and the outcome of every case that was executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub display: String,
    pub config: String,
    pub results: ResultSet,
}

/// Three-way diff of an actual ResultSet against an expected one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonReport {
    /// Present in actual, no entry in expected: (category, test, actual).
    pub unexpected: Vec<(String, String, Outcome)>,
    /// Present in both but disagreeing: (category, test, expected, actual).
    pub incorrect: Vec<(String, String, Outcome, Outcome)>,
    /// Present in expected, absent from actual: (category, test, expected).
    pub missing: Vec<(String, String, Outcome)>,
}

impl ComparisonReport {
    /// The run verdict: true iff actual matched expected exactly.
    pub fn is_clean(&self) -> bool {
        self.unexpected.is_empty() && self.incorrect.is_empty() && self.missing.is_empty()
    }
}

/// Per-run outcome counters for the human summary line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl RunSummary {
    pub fn count(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Pass => self.passed += 1,
            Outcome::Fail => self.failed += 1,
            Outcome::Skip => self.skipped += 1,
            Outcome::Error => self.errored += 1,
        }
    }
}
