use crate::types::{Outcome, Report, ResultSet};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A second write for the same (category, test) key means the run tried to
/// execute one case twice. That is a harness bug, so it is rejected instead
/// of silently overwritten.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("duplicate result for {category}/{test_name}: case reported twice in one run")]
    Duplicate { category: String, test_name: String },
}

/// Accumulates the outcomes of one run and persists them keyed by
/// (display, config). Holds no cross-run state.
#[derive(Debug, Clone)]
pub struct ReportResults {
    display: String,
    config: String,
    results: ResultSet,
}

impl ReportResults {
    pub fn new(display: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            config: config.into(),
            results: ResultSet::new(),
        }
    }

    pub fn report(
        &mut self,
        outcome: Outcome,
        test_name: &str,
        category: &str,
    ) -> Result<(), ReportError> {
        let by_test = self.results.entry(category.to_string()).or_default();
        if by_test.contains_key(test_name) {
            return Err(ReportError::Duplicate {
                category: category.to_string(),
                test_name: test_name.to_string(),
            });
        }
        by_test.insert(test_name.to_string(), outcome);
        Ok(())
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn to_report(&self) -> Report {
        Report {
            display: self.display.clone(),
            config: self.config.clone(),
            results: self.results.clone(),
        }
    }

    /// Serialize the accumulated results to the deterministic per-(display,
    /// config) location under `results_root`, creating directories as needed.
    /// Returns the written path. Output is byte-stable for a given ResultSet.
    pub fn complete(&self, results_root: &Path) -> Result<PathBuf> {
        let dir = results_dir(results_root, &self.display);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create results dir {}", dir.display()))?;
        let path = dir.join(results_filename(&self.config));
        let out = serde_yaml::to_string(&self.to_report())
            .context("failed to serialize results")?;
        fs::write(&path, out)
            .with_context(|| format!("failed to write results file {}", path.display()))?;
        Ok(path)
    }
}

pub fn results_dir(root: &Path, display: &str) -> PathBuf {
    root.join(display)
}

pub fn results_filename(config: &str) -> String {
    format!("results-{config}.yaml")
}

/// Where a run for (display, config) lands.
pub fn results_path(root: &Path, display: &str, config: &str) -> PathBuf {
    results_dir(root, display).join(results_filename(config))
}

/// The trusted baseline for (display, config), beneath the same display root.
pub fn expected_path(root: &Path, display: &str, config: &str) -> PathBuf {
    results_dir(root, display)
        .join("expected")
        .join(results_filename(config))
}

/// The backend-agnostic ground-truth baseline shared by all displays.
pub fn ideal_path(root: &Path) -> PathBuf {
    root.join("ideal.yaml")
}

pub fn load_report(path: &Path) -> Result<Report> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read results file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse results file {}", path.display()))
}
