use crate::normalize::TagVocabulary;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use wait_timeout::ChildExt;

/// 60 seconds per case. GUI backends boot a whole toolkit per invocation,
/// so this is deliberately generous.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Granularity of the child-wait loop; bounds how long cancellation can lag.
const WAIT_SLICE: Duration = Duration::from_millis(100);

// Environment handshake recognized by every display service.
pub const ENV_TEST_CODE: &str = "SHOES_SPEC_TEST";
pub const ENV_DISPLAY_SERVICE: &str = "SCARPE_DISPLAY_SERVICE";
pub const ENV_EXPORT_FILE: &str = "SHOES_MINITEST_EXPORT_FILE";
pub const ENV_CLASS_NAME: &str = "SHOES_MINITEST_CLASS_NAME";
pub const ENV_METHOD_NAME: &str = "SHOES_MINITEST_METHOD_NAME";
const ENV_HTML_RENDERER: &str = "SCARPE_HTML_RENDERER";

const EXPORT_FILENAME: &str = "sspec_results.json";

/// Run-wide cancellation signal, shared between the Ctrl-C watcher and every
/// in-flight child-wait loop.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One case handed to a display service: identity plus opaque payloads.
/// Consumed by exactly one `execute` call.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub category: String,
    pub test_name: String,
    pub app_code: String,
    pub test_code: String,
    pub extra_env: Vec<(String, String)>,
}

/// Either the raw result-file contents, or the reason no valid result could
/// be obtained. A transport failure is never a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Transported(String),
    TransportFailure(String),
}

/// A toolkit backend plus one configuration variant of it. The generic
/// adapter is parameterized by this instead of one hand-written runner per
/// backend.
#[derive(Debug, Clone)]
pub struct DisplayService {
    /// Backend identifier, e.g. "scarpe-webview". Keys the results file.
    pub display: String,
    /// Configuration variant, e.g. "local-calzini".
    pub config: String,
    /// Value of the display-service selector variable seen by the child.
    pub selector: String,
    /// Backend executable, resolved on PATH at execution time.
    pub runner: String,
    /// Interpreter the runner is launched through, if any.
    pub runtime: Option<String>,
    /// Config-specific environment overrides, e.g. the HTML renderer.
    pub extra_env: Vec<(String, String)>,
    /// Failure-kind tags this backend emits for skips and errors.
    pub tags: TagVocabulary,
    pub timeout: Duration,
    /// Suppress the child's stdout/stderr.
    pub quiet: bool,
}

impl DisplayService {
    /// Known backends and their configuration variants; the first config is
    /// the default.
    pub fn known() -> &'static [(&'static str, &'static [&'static str])] {
        &[
            ("niente", &["local"]),
            ("scarpe-webview", &["local-calzini", "local-tiranti"]),
            ("gtk-scarpe", &["local-gtk"]),
        ]
    }

    /// Look up a built-in backend/config pair.
    pub fn builtin(display: &str, config: Option<&str>) -> Result<Self> {
        let mut svc = match display {
            "niente" => Self {
                display: "niente".into(),
                config: "local".into(),
                selector: "niente".into(),
                runner: "scarpe".into(),
                runtime: Some("ruby".into()),
                extra_env: vec![],
                tags: TagVocabulary::default(),
                timeout: DEFAULT_TIMEOUT,
                quiet: false,
            },
            "scarpe-webview" => Self {
                display: "scarpe-webview".into(),
                config: "local-calzini".into(),
                selector: "wv_local".into(),
                runner: "scarpe".into(),
                runtime: Some("ruby".into()),
                extra_env: vec![(ENV_HTML_RENDERER.into(), "calzini".into())],
                tags: TagVocabulary::default(),
                timeout: DEFAULT_TIMEOUT,
                quiet: false,
            },
            "gtk-scarpe" => Self {
                display: "gtk-scarpe".into(),
                config: "local-gtk".into(),
                selector: "gtk-scarpe".into(),
                runner: "gtk-scarpe".into(),
                runtime: Some("ruby".into()),
                extra_env: vec![],
                tags: TagVocabulary::default(),
                timeout: DEFAULT_TIMEOUT,
                quiet: false,
            },
            other => {
                let names: Vec<&str> = Self::known().iter().map(|(n, _)| *n).collect();
                return Err(anyhow!(
                    "unknown display service '{}', known: {}",
                    other,
                    names.join(", ")
                ));
            }
        };
        if let Some(config) = config {
            match (display, config) {
                ("niente", "local") | ("scarpe-webview", "local-calzini") | ("gtk-scarpe", "local-gtk") => {}
                ("scarpe-webview", "local-tiranti") => {
                    svc.config = "local-tiranti".into();
                    svc.extra_env = vec![(ENV_HTML_RENDERER.into(), "tiranti".into())];
                }
                (_, other) => {
                    let configs = Self::known()
                        .iter()
                        .find(|(n, _)| *n == display)
                        .map(|(_, c)| c.join(", "))
                        .unwrap_or_default();
                    return Err(anyhow!(
                        "unknown config '{}' for display service '{}', known: {}",
                        other,
                        display,
                        configs
                    ));
                }
            }
        }
        Ok(svc)
    }

    /// Check that the runner executable can be found at all. Fail fast on
    /// configuration errors instead of erroring every single case.
    pub fn validate(&self) -> Result<()> {
        self.resolved_runner().map(|_| ())
    }

    fn resolved_runner(&self) -> Result<PathBuf> {
        let cmd = Path::new(&self.runner);
        if cmd.components().count() > 1 {
            if cmd.exists() {
                return Ok(cmd.to_path_buf());
            }
            return Err(anyhow!("runner executable {} not found", cmd.display()));
        }
        which::which(&self.runner)
            .with_context(|| format!("runner '{}' not found in PATH", self.runner))
    }

    /// Run one case out of process and collect its raw result payload.
    ///
    /// All artifacts (app code, test code, result export) live in a fresh
    /// per-invocation temp directory, removed on every exit path when the
    /// guard drops. The export path therefore never pre-exists, so a stale
    /// result from an earlier run can never be mistaken for this one's.
    pub fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancelFlag,
    ) -> Result<ExecutionResult> {
        let workdir = tempfile::Builder::new()
            .prefix("sspec-")
            .tempdir()
            .context("failed to create temp dir for case artifacts")?;
        let app_file = workdir.path().join("app_code");
        let test_file = workdir.path().join("test_code");
        let export_file = workdir.path().join(EXPORT_FILENAME);
        fs::write(&app_file, &request.app_code)
            .with_context(|| format!("failed to write {}", app_file.display()))?;
        fs::write(&test_file, &request.test_code)
            .with_context(|| format!("failed to write {}", test_file.display()))?;

        let runner = match self.resolved_runner() {
            Ok(path) => path,
            Err(e) => return Ok(ExecutionResult::TransportFailure(e.to_string())),
        };

        let mut cmd = match &self.runtime {
            Some(runtime) => {
                let mut c = Command::new(runtime);
                c.arg(&runner);
                c
            }
            None => Command::new(&runner),
        };
        cmd.arg("--dev")
            .arg(&app_file)
            .stdin(Stdio::null())
            .stdout(if self.quiet { Stdio::null() } else { Stdio::inherit() })
            .stderr(if self.quiet { Stdio::null() } else { Stdio::inherit() });

        // The handshake is scoped to this child only; the parent environment
        // is never mutated, which keeps concurrent invocations independent.
        cmd.env(ENV_TEST_CODE, &test_file)
            .env(ENV_DISPLAY_SERVICE, &self.selector)
            .env(ENV_EXPORT_FILE, &export_file)
            .env(ENV_CLASS_NAME, request.category.replace('/', "_"))
            .env(ENV_METHOD_NAME, &request.test_name);
        for (name, value) in self.extra_env.iter().chain(request.extra_env.iter()) {
            cmd.env(name, value);
        }

        debug!(
            display = %self.display,
            category = %request.category,
            test = %request.test_name,
            "spawning backend"
        );
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Ok(ExecutionResult::TransportFailure(format!(
                    "failed to launch '{}': {}",
                    runner.display(),
                    e
                )));
            }
        };

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(ExecutionResult::TransportFailure("run cancelled".into()));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(ExecutionResult::TransportFailure(format!(
                    "timed out after {} s",
                    self.timeout.as_secs()
                )));
            }
            match child.wait_timeout(WAIT_SLICE.min(remaining))? {
                Some(status) => break status,
                None => continue,
            }
        };

        if !status.success() {
            return Ok(ExecutionResult::TransportFailure(format!(
                "backend exited with {}",
                status
            )));
        }
        if !export_file.exists() {
            return Ok(ExecutionResult::TransportFailure("no result file".into()));
        }
        let raw = fs::read_to_string(&export_file)
            .with_context(|| format!("failed to read {}", export_file.display()))?;
        Ok(ExecutionResult::Transported(raw))
    }
}
