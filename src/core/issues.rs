//! Append-only diagnostics for one processing run.
//!
//! Every stage records its problems here instead of raising past its
//! boundary: attribute coercion, document loading, per-file extraction.
//! The tracker is read once at the end of a run to print the grouped
//! report and derive the process exit code.

/// Severity of one recorded issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Data is imperfect but the row/file was still emitted.
    Warning,
    /// A specific file or record was skipped; the batch continued.
    Error,
    /// A file could not be loaded at all, or the run itself failed.
    Fatal,
}

/// Final status of a run, derived from the recorded issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// No errors or fatals recorded.
    Ok,
    /// The run produced output but some files or records failed.
    Degraded,
    /// The run could not produce useful output.
    Fatal,
}

impl RunStatus {
    /// Process exit code for orchestrating scripts: 0 / 1 / 2.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Degraded => 1,
            Self::Fatal => 2,
        }
    }
}

/// Collects warnings, errors, and fatals for one run.
///
/// File-scoped fatals (one unreadable XML among many) are recorded with
/// [`fatal`](Self::fatal) and degrade the run to exit code 1 — the batch
/// still produced output. Run-scoped failures (no input files, output
/// artifact unwritable) go through [`abort`](Self::abort) and force exit
/// code 2.
#[derive(Debug, Default)]
pub struct IssueTracker {
    warnings: Vec<String>,
    errors: Vec<String>,
    fatals: Vec<String>,
    aborted: bool,
}

impl IssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning; processing and emission continue.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Record an error: one file or record was skipped.
    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Record a file-scoped fatal: one file could not be loaded at all.
    pub fn fatal(&mut self, message: impl Into<String>) {
        self.fatals.push(message.into());
    }

    /// Record a run-scoped fatal and mark the whole run as failed.
    pub fn abort(&mut self, message: impl Into<String>) {
        self.fatals.push(message.into());
        self.aborted = true;
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn fatals(&self) -> &[String] {
        &self.fatals
    }

    /// Derive the final status of the run.
    pub fn status(&self) -> RunStatus {
        if self.aborted {
            RunStatus::Fatal
        } else if !self.errors.is_empty() || !self.fatals.is_empty() {
            RunStatus::Degraded
        } else {
            RunStatus::Ok
        }
    }

    /// Process exit code: 0 clean, 1 degraded, 2 fatal.
    pub fn exit_code(&self) -> u8 {
        self.status().exit_code()
    }

    /// Print all issues to stderr, grouped by severity (warnings, then
    /// errors, then fatals). Never fails.
    pub fn report(&self, prefix: &str) {
        let label = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}: ")
        };
        for msg in &self.warnings {
            eprintln!("{label}WARNING: {msg}");
        }
        for msg in &self.errors {
            eprintln!("{label}ERROR: {msg}");
        }
        for msg in &self.fatals {
            eprintln!("{label}FATAL: {msg}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_run_is_ok() {
        let mut issues = IssueTracker::new();
        issues.warn("attribute missing");
        assert_eq!(issues.status(), RunStatus::Ok);
        assert_eq!(issues.exit_code(), 0);
    }

    #[test]
    fn errors_degrade() {
        let mut issues = IssueTracker::new();
        issues.error("file skipped");
        assert_eq!(issues.status(), RunStatus::Degraded);
        assert_eq!(issues.exit_code(), 1);
    }

    #[test]
    fn file_fatal_degrades_but_does_not_abort() {
        let mut issues = IssueTracker::new();
        issues.fatal("malformed XML 'a.xml'");
        assert_eq!(issues.status(), RunStatus::Degraded);
        assert_eq!(issues.exit_code(), 1);
        assert_eq!(issues.fatals().len(), 1);
    }

    #[test]
    fn abort_forces_fatal_status() {
        let mut issues = IssueTracker::new();
        issues.warn("w");
        issues.abort("no XML files found");
        assert_eq!(issues.status(), RunStatus::Fatal);
        assert_eq!(issues.exit_code(), 2);
    }

    #[test]
    fn buckets_preserve_order() {
        let mut issues = IssueTracker::new();
        issues.warn("first");
        issues.warn("second");
        assert_eq!(issues.warnings(), &["first", "second"]);
    }
}
