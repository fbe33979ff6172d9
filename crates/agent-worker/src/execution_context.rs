// Per-step execution context: the mutable state that directives act on.
// Holds variables, outputs, intra-action state, path additions, annotations,
// and log presentation flags. One context per step; the engine takes it by
// `&mut`, so no locking is needed around the context itself.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use agent_common::SecretMasker;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Issues (annotations)
// ---------------------------------------------------------------------------

/// Severity of a log annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
    Notice,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueSeverity::Error => write!(f, "error"),
            IssueSeverity::Warning => write!(f, "warning"),
            IssueSeverity::Notice => write!(f, "notice"),
        }
    }
}

/// A log annotation attached to the step (error, warning, or notice),
/// optionally carrying a source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub col: Option<u32>,
}

impl Issue {
    /// Create an issue with just a severity and message.
    pub fn new(severity: IssueSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: None,
            line: None,
            col: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Mutable execution state for one step.
///
/// Directives from both the inline and file-based channels land here through
/// the applier; nothing else mutates these maps while a step is processed.
pub struct ExecutionContext {
    /// Display name for this context (step name), used as the log prefix.
    display_name: String,

    /// Variables visible to subsequent steps (environment overlay).
    pub variables: HashMap<String, String>,

    /// Step outputs.
    pub outputs: HashMap<String, String>,

    /// State persisted across invocations of the same action (pre/main/post).
    pub intra_action_state: HashMap<String, String>,

    /// Entries prepended to the executable search path, in arrival order.
    pub prepend_path: Vec<String>,

    /// Annotations recorded for this step.
    pub issues: Vec<Issue>,

    /// Paths of the provisioned file-command files, keyed by exported
    /// environment variable name (`ENV_FILE`, `OUTPUT_FILE`, ...).
    pub file_command_paths: HashMap<String, PathBuf>,

    /// Temp directory where file-command files are provisioned.
    pub temp_directory: PathBuf,

    /// Secret masker applied to every log line.
    secret_masker: SecretMasker,

    /// Captured log lines for this context.
    log_lines: Vec<String>,

    /// Current log group nesting depth.
    group_depth: u32,

    /// Whether debug output is written.
    pub write_debug: bool,

    /// Cancellation token for the owning step.
    cancel_token: CancellationToken,
}

impl ExecutionContext {
    /// Create a context for one step.
    pub fn new(display_name: impl Into<String>, temp_directory: impl Into<PathBuf>) -> Self {
        Self {
            display_name: display_name.into(),
            variables: HashMap::new(),
            outputs: HashMap::new(),
            intra_action_state: HashMap::new(),
            prepend_path: Vec::new(),
            issues: Vec::new(),
            file_command_paths: HashMap::new(),
            temp_directory: temp_directory.into(),
            secret_masker: SecretMasker::new(),
            log_lines: Vec::new(),
            group_depth: 0,
            write_debug: true,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Use a shared secret masker (e.g. the job-wide one).
    pub fn with_secret_masker(mut self, masker: SecretMasker) -> Self {
        self.secret_masker = masker;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn secret_masker(&self) -> &SecretMasker {
        &self.secret_masker
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// All log lines recorded in this context.
    pub fn log_lines(&self) -> &[String] {
        &self.log_lines
    }

    pub fn group_depth(&self) -> u32 {
        self.group_depth
    }

    // -----------------------------------------------------------------------
    // State mutators (called by the applier)
    // -----------------------------------------------------------------------

    /// Set a variable for subsequent steps. Secret values are also
    /// registered with the masker.
    pub fn set_variable(&mut self, name: &str, value: &str, is_secret: bool) {
        if is_secret {
            self.secret_masker.add_value(value);
        }
        self.variables.insert(name.to_string(), value.to_string());
    }

    /// Set a step output. Later writes to the same key win.
    pub fn set_output(&mut self, key: &str, value: &str) {
        self.outputs.insert(key.to_string(), value.to_string());
    }

    /// Save intra-action state for a later invocation of the same action.
    pub fn set_intra_action_state(&mut self, key: &str, value: &str) {
        self.intra_action_state
            .insert(key.to_string(), value.to_string());
    }

    /// Prepend an entry to the executable search path.
    pub fn prepend_path_entry(&mut self, entry: &str) {
        self.prepend_path.push(entry.to_string());
    }

    /// Register a value with the secret masker.
    pub fn add_mask(&mut self, value: &str) {
        self.secret_masker.add_value(value);
    }

    /// Record an annotation and write it to the log.
    pub fn annotate(&mut self, issue: Issue) {
        let mut location = String::new();
        if let Some(ref file) = issue.file {
            location.push_str(file);
            if let Some(line) = issue.line {
                location.push_str(&format!(":{line}"));
                if let Some(col) = issue.col {
                    location.push_str(&format!(":{col}"));
                }
            }
            location.push_str(": ");
        }
        let rendered = format!("{}{}", location, issue.message);
        match issue.severity {
            IssueSeverity::Error => self.error(&rendered),
            IssueSeverity::Warning => self.warning(&rendered),
            IssueSeverity::Notice => self.notice(&rendered),
        }
        self.issues.push(issue);
    }

    // -----------------------------------------------------------------------
    // Logging
    // -----------------------------------------------------------------------

    /// Write a plain output line.
    pub fn write(&mut self, message: &str) {
        let masked = self.secret_masker.mask(message);
        tracing::info!(target: "step", "[{}] {}", self.display_name, masked);
        self.log_lines.push(masked);
    }

    /// Write a debug line (only when debug output is enabled).
    pub fn debug(&mut self, message: &str) {
        if self.write_debug {
            let masked = self.secret_masker.mask(message);
            tracing::debug!(target: "step", "[{}] {}", self.display_name, masked);
            self.log_lines.push(format!("##[debug]{masked}"));
        }
    }

    /// Write a warning line.
    pub fn warning(&mut self, message: &str) {
        let masked = self.secret_masker.mask(message);
        tracing::warn!(target: "step", "[{}] {}", self.display_name, masked);
        self.log_lines.push(format!("##[warning]{masked}"));
    }

    /// Write an error line.
    pub fn error(&mut self, message: &str) {
        let masked = self.secret_masker.mask(message);
        tracing::error!(target: "step", "[{}] {}", self.display_name, masked);
        self.log_lines.push(format!("##[error]{masked}"));
    }

    /// Write a notice line.
    pub fn notice(&mut self, message: &str) {
        let masked = self.secret_masker.mask(message);
        tracing::info!(target: "step", "[{}] notice: {}", self.display_name, masked);
        self.log_lines.push(format!("##[notice]{masked}"));
    }

    /// Open a collapsible log group.
    pub fn begin_group(&mut self, name: &str) {
        let masked = self.secret_masker.mask(name);
        tracing::info!(target: "step", "[{}] >> {}", self.display_name, masked);
        self.log_lines.push(format!("##[group]{masked}"));
        self.group_depth += 1;
    }

    /// Close the innermost log group. A stray end-group is ignored.
    pub fn end_group(&mut self) {
        if self.group_depth == 0 {
            return;
        }
        self.group_depth -= 1;
        self.log_lines.push("##[endgroup]".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ctx() -> ExecutionContext {
        ExecutionContext::new("test-step", std::env::temp_dir())
    }

    #[test]
    fn test_set_variable_secret_registers_mask() {
        let mut ctx = make_ctx();
        ctx.set_variable("TOKEN", "s3cr3t", true);
        ctx.write("the value is s3cr3t");
        assert_eq!(ctx.log_lines().last().unwrap(), "the value is ***");
    }

    #[test]
    fn test_annotation_rendering() {
        let mut ctx = make_ctx();
        let mut issue = Issue::new(IssueSeverity::Error, "boom");
        issue.file = Some("src/main.rs".to_string());
        issue.line = Some(10);
        issue.col = Some(3);
        ctx.annotate(issue);
        assert_eq!(ctx.issues.len(), 1);
        assert_eq!(ctx.log_lines().last().unwrap(), "##[error]src/main.rs:10:3: boom");
    }

    #[test]
    fn test_group_depth_never_underflows() {
        let mut ctx = make_ctx();
        ctx.end_group();
        assert_eq!(ctx.group_depth(), 0);
        ctx.begin_group("build");
        ctx.end_group();
        ctx.end_group();
        assert_eq!(ctx.group_depth(), 0);
    }

    #[test]
    fn test_last_write_wins_on_outputs() {
        let mut ctx = make_ctx();
        ctx.set_output("a", "1");
        ctx.set_output("a", "2");
        assert_eq!(ctx.outputs.get("a"), Some(&"2".to_string()));
    }
}
