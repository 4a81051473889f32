//! Recursive Session Reporting
//!
//! In recursive mode each package's build-run-collect-merge-route cycle is
//! independent: one broken package must not prevent its siblings from
//! completing. The orchestrator records each package's outcome here and
//! reports them package by package at the end, with a non-zero exit if any
//! failed.

use crate::result::CubrirError;
use crate::summary::{CoverageSummary, ScopeSummary};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of one package's coverage run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageOutcome {
    /// Package the run covered
    pub package_id: String,
    /// Where the merged profile was routed, if the run succeeded
    pub profile_path: Option<PathBuf>,
    /// Coverage figures, if the run succeeded
    pub summary: Option<CoverageSummary>,
    /// Failure description, if it did not
    pub error: Option<String>,
}

impl PackageOutcome {
    /// Record a completed package run
    #[must_use]
    pub fn succeeded(
        package_id: impl Into<String>,
        profile_path: impl Into<PathBuf>,
        summary: CoverageSummary,
    ) -> Self {
        Self {
            package_id: package_id.into(),
            profile_path: Some(profile_path.into()),
            summary: Some(summary),
            error: None,
        }
    }

    /// Record a failed package run
    #[must_use]
    pub fn failed(package_id: impl Into<String>, error: &CubrirError) -> Self {
        Self {
            package_id: package_id.into(),
            profile_path: None,
            summary: None,
            error: Some(error.to_string()),
        }
    }

    /// Whether the package run completed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// One presentation line naming the package and its result
    #[must_use]
    pub fn report_line(&self) -> String {
        match (&self.summary, &self.error) {
            (Some(summary), _) => {
                let scope = ScopeSummary {
                    packages: vec![self.package_id.clone()],
                    summary: *summary,
                };
                format!("{}: {}", self.package_id, scope.report_line())
            }
            (None, Some(error)) => format!("{}: FAILED: {error}", self.package_id),
            (None, None) => format!("{}: no result recorded", self.package_id),
        }
    }
}

/// Ordered per-package outcomes of one recursive session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionReport {
    outcomes: Vec<PackageOutcome>,
}

impl SessionReport {
    /// Create an empty session report
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one package's outcome
    pub fn record(&mut self, outcome: PackageOutcome) {
        self.outcomes.push(outcome);
    }

    /// All outcomes in run order
    #[must_use]
    pub fn outcomes(&self) -> &[PackageOutcome] {
        &self.outcomes
    }

    /// Packages whose run failed
    #[must_use]
    pub fn failed(&self) -> Vec<&PackageOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.is_success())
            .collect()
    }

    /// Whether every package completed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(PackageOutcome::is_success)
    }

    /// One presentation line per package, in run order
    #[must_use]
    pub fn report_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(PackageOutcome::report_line)
            .collect()
    }

    /// Export to JSON
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
