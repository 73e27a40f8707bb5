use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use walkdir::WalkDir;

pub const CASE_EXTENSION: &str = "sspec";

/// A structurally invalid case file. This aborts the whole sweep: a corrupt
/// fixture means the corpus is broken, not the backend under test.
#[derive(Debug, Error)]
pub enum MalformedCaseError {
    #[error("malformed case file {path}: expected at least 2 labeled segments, found {found}")]
    TooFewSegments { path: PathBuf, found: usize },
    #[error("malformed case file {path}: invalid front matter: {source}")]
    FrontMatter {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// One discovered case file. `category` is the forward-slash relative
/// directory path under the store root ("." for cases at the root itself);
/// `test_name` is the file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRef {
    pub file: PathBuf,
    pub category: String,
    pub test_name: String,
}

/// The case store: every `.sspec` file under a root directory, grouped by
/// category. Computed once by `discover` and passed around as a value.
#[derive(Debug, Clone)]
pub struct CaseStore {
    root: PathBuf,
    categories: Vec<String>,
    by_category: BTreeMap<String, Vec<CaseRef>>,
}

impl CaseStore {
    /// Scan `root` recursively for case files and derive the sorted list of
    /// unique categories from their parent directories.
    pub fn discover(root: &Path) -> Result<Self> {
        let mut by_category: BTreeMap<String, Vec<CaseRef>> = BTreeMap::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| {
                format!("failed to scan case store at {}", root.display())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != CASE_EXTENSION) {
                continue;
            }
            let category = category_of(root, path);
            let test_name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            by_category.entry(category.clone()).or_default().push(CaseRef {
                file: path.to_path_buf(),
                category,
                test_name,
            });
        }
        for refs in by_category.values_mut() {
            refs.sort_by(|a, b| a.test_name.cmp(&b.test_name));
        }
        let categories = by_category.keys().cloned().collect();
        Ok(Self {
            root: root.to_path_buf(),
            categories,
            by_category,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Unique categories, lexicographically sorted.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// All cases, grouped by category, deterministic order.
    pub fn cases(&self) -> impl Iterator<Item = &CaseRef> {
        self.by_category.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.is_empty()
    }
}

fn category_of(root: &Path, file: &Path) -> String {
    let parent = file.parent().unwrap_or(root);
    let rel = parent.strip_prefix(root).unwrap_or(parent);
    if rel.as_os_str().is_empty() {
        return ".".to_string();
    }
    // Canonical separator is "/" regardless of platform.
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// A parsed case file: YAML front matter plus the ordered, labeled segments.
/// Segment bodies are opaque payload, trimmed but otherwise untouched.
#[derive(Debug, Clone)]
pub struct LoadedCase {
    pub metadata: BTreeMap<String, serde_yaml::Value>,
    pub segments: IndexMap<String, String>,
}

impl LoadedCase {
    /// First segment body, conventionally labeled "app code".
    pub fn app_code(&self) -> &str {
        self.segments
            .get_index(0)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }

    /// Second segment body, conventionally labeled "test code".
    pub fn test_code(&self) -> &str {
        self.segments
            .get_index(1)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }
}

/// A segment marker line: three or more dashes, whitespace, a label.
/// A bare `---` line is front-matter punctuation, not a marker.
fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^-{3,}[ \t]+(\S[^\r\n]*?)[ \t\r]*$").unwrap())
}

/// Parse a case file into front matter and segments.
///
/// Returns `MalformedCaseError` (through anyhow, downcastable) when the file
/// yields fewer than two segments or unparseable front matter. Never returns
/// partial data.
pub fn load_case(path: &Path) -> Result<LoadedCase> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read case file {}", path.display()))?;
    parse_case(&content, path)
}

/// Parse already-read case file text. `path` is only used in error messages.
pub fn parse_case(content: &str, path: &Path) -> Result<LoadedCase> {
    let mut segments: IndexMap<String, String> = IndexMap::new();
    let mut front_end = content.len();
    let mut pending: Option<(String, usize)> = None;

    for m in marker_regex().find_iter(content) {
        let label = marker_regex()
            .captures(m.as_str())
            .and_then(|c| c.get(1))
            .map(|g| g.as_str().to_lowercase())
            .unwrap_or_default();
        if let Some((prev_label, body_start)) = pending.take() {
            let body = content[body_start..m.start()].trim();
            segments.insert(prev_label, body.to_string());
        } else {
            front_end = m.start();
        }
        pending = Some((label, m.end()));
    }
    if let Some((last_label, body_start)) = pending {
        let body = content[body_start..].trim();
        segments.insert(last_label, body.to_string());
    }

    if segments.len() < 2 {
        return Err(MalformedCaseError::TooFewSegments {
            path: path.to_path_buf(),
            found: segments.len(),
        }
        .into());
    }

    let metadata = parse_front_matter(&content[..front_end], path)?;
    Ok(LoadedCase { metadata, segments })
}

fn parse_front_matter(
    text: &str,
    path: &Path,
) -> Result<BTreeMap<String, serde_yaml::Value>> {
    // Tolerate a leading `---` YAML document marker.
    let trimmed = text.trim();
    let body = trimmed.strip_prefix("---").unwrap_or(trimmed).trim();
    if body.is_empty() {
        return Ok(BTreeMap::new());
    }
    let parsed: Option<BTreeMap<String, serde_yaml::Value>> = serde_yaml::from_str(body)
        .map_err(|source| MalformedCaseError::FrontMatter {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parsed.unwrap_or_default())
}
