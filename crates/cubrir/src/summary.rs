//! Coverage Summary Statistics
//!
//! A block counts as covered iff its hit count is positive; every block
//! contributes its statement count to the denominator and, when covered,
//! to the numerator. Summaries are derived from profiles on demand and
//! never stored independently.

use crate::profile::CoverProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statement-coverage figures for one package or one scope union
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Total instrumented statements
    pub statements_total: u64,
    /// Statements in blocks that ran at least once
    pub statements_covered: u64,
}

impl CoverageSummary {
    /// Derive the summary for a single profile
    #[must_use]
    pub fn of(profile: &CoverProfile) -> Self {
        Self {
            statements_total: profile.total_statements(),
            statements_covered: profile.covered_statements(),
        }
    }

    /// Fold another summary into this one (scope union)
    pub fn absorb(&mut self, other: Self) {
        self.statements_total += other.statements_total;
        self.statements_covered += other.statements_covered;
    }

    /// Percentage of statements covered, 0.0 for an empty scope
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.statements_total == 0 {
            return 0.0;
        }
        (self.statements_covered as f64 / self.statements_total as f64) * 100.0
    }

    /// Whether the scope contains no instrumented statements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements_total == 0
    }
}

/// Aggregate figure for the set of packages counted together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeSummary {
    /// Packages named in the scope, in reporting order
    pub packages: Vec<String>,
    /// Union figures over exactly those packages
    pub summary: CoverageSummary,
}

impl ScopeSummary {
    /// The `coverage: NN.N% of statements [...]` line handed to the
    /// orchestrator for presentation. One decimal place; the package list
    /// is spelled out only for a cross-package scope.
    #[must_use]
    pub fn report_line(&self) -> String {
        if self.summary.is_empty() {
            return "coverage: [no statements]".to_string();
        }
        if self.packages.len() > 1 {
            format!(
                "coverage: {:.1}% of statements in {}",
                self.summary.percent(),
                self.packages.join(", ")
            )
        } else {
            format!("coverage: {:.1}% of statements", self.summary.percent())
        }
    }
}

impl fmt::Display for ScopeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report_line())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn summary(covered: u64, total: u64) -> CoverageSummary {
        CoverageSummary {
            statements_total: total,
            statements_covered: covered,
        }
    }

    #[test]
    fn test_percent_known_fixture() {
        assert_eq!(summary(8, 10).percent(), 80.0);
    }

    #[test]
    fn test_percent_empty_scope_is_zero() {
        assert_eq!(summary(0, 0).percent(), 0.0);
        assert!(summary(0, 0).is_empty());
    }

    #[test]
    fn test_absorb_sums_both_sides() {
        let mut union = summary(8, 10);
        union.absorb(summary(2, 4));
        assert_eq!(union, summary(10, 14));
    }

    #[test]
    fn test_report_line_single_package() {
        let scope = ScopeSummary {
            packages: vec!["coverage_fixture".to_string()],
            summary: summary(8, 10),
        };
        assert_eq!(scope.report_line(), "coverage: 80.0% of statements");
    }

    #[test]
    fn test_report_line_cross_package_union() {
        // 10/14 across the union, not either package's own figure
        let scope = ScopeSummary {
            packages: vec![
                "coverage_fixture".to_string(),
                "coverage_fixture/external_coverage_fixture".to_string(),
            ],
            summary: summary(10, 14),
        };
        assert_eq!(
            scope.report_line(),
            "coverage: 71.4% of statements in coverage_fixture, coverage_fixture/external_coverage_fixture"
        );
    }

    #[test]
    fn test_report_line_no_statements() {
        let scope = ScopeSummary {
            packages: vec!["empty".to_string()],
            summary: summary(0, 0),
        };
        assert_eq!(scope.report_line(), "coverage: [no statements]");
    }

    #[test]
    fn test_one_decimal_rounding() {
        // 5/7 = 71.428..., must render as 71.4, never 71.43 or 71
        let scope = ScopeSummary {
            packages: vec!["a".to_string(), "b".to_string()],
            summary: summary(5, 7),
        };
        assert!(scope.report_line().starts_with("coverage: 71.4% "));
    }
}
