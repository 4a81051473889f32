//! Coverage Aggregator
//!
//! Entry point for one package run: takes the raw profile blob each worker
//! produced (collected by the orchestrator after all workers terminated),
//! parses, merges, and derives the summary figures for the requested scope.
//!
//! A worker that crashed early leaves an empty or truncated blob; that
//! worker's contribution is discarded with a recorded warning rather than
//! failing the run. Only when *every* worker output is empty or garbled
//! does the aggregation fail, because a report with no data is not a valid
//! result. A parsable profile with all-zero counters is different: it is
//! discarded only while siblings carry signal. When every parsable worker
//! executed nothing, that is a real 0% run and reports as one.

use crate::merge::{merge_profiles, MergedSet};
use crate::profile::CoverProfile;
use crate::result::{CubrirError, CubrirResult};
use crate::summary::{CoverageSummary, ScopeSummary};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One worker's raw profile blob plus its declared package.
///
/// Arrival order is irrelevant: the merge is order-independent by
/// construction.
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    /// Package the worker was measuring
    pub package_id: String,
    /// Raw profile text (possibly empty on crash)
    pub raw: String,
}

impl WorkerOutput {
    /// Create a worker output record
    #[must_use]
    pub fn new(package_id: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            raw: raw.into(),
        }
    }
}

/// Outcome of aggregating one package run
#[derive(Debug)]
pub struct AggregateResult {
    primary_package: String,
    merged: MergedSet,
    scope: ScopeSummary,
    warnings: Vec<String>,
}

impl AggregateResult {
    /// The merged per-package profiles
    #[must_use]
    pub fn merged(&self) -> &MergedSet {
        &self.merged
    }

    /// Union summary over the requested scope
    #[must_use]
    pub fn scope_summary(&self) -> &ScopeSummary {
        &self.scope
    }

    /// The `coverage: NN.N% of statements [...]` presentation line
    #[must_use]
    pub fn report_line(&self) -> String {
        self.scope.report_line()
    }

    /// Per-package summaries for every package that contributed blocks
    #[must_use]
    pub fn package_summaries(&self) -> BTreeMap<String, CoverageSummary> {
        self.merged
            .profiles()
            .map(|(package, profile)| (package.to_string(), CoverageSummary::of(profile)))
            .collect()
    }

    /// Warnings recorded for discarded worker outputs
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Serialize the whole merged run back to the raw text format: one
    /// mode header, every block in deterministic order.
    #[must_use]
    pub fn render(&self) -> String {
        self.merged.combined(self.primary_package.clone()).render()
    }

    /// The merged run collapsed into a single profile (for routing)
    #[must_use]
    pub fn combined_profile(&self) -> CoverProfile {
        self.merged.combined(self.primary_package.clone())
    }
}

/// Aggregate the worker outputs of one package run.
///
/// `scope` names the packages whose statements count toward the aggregate
/// percentage (cross-package mode); when empty, the scope defaults to the
/// declared package of every usable worker.
///
/// # Errors
///
/// - [`CubrirError::NoProfilesProduced`] when every worker output is empty
///   or garbled. A parsable zero-hit profile does not count as garbled: a
///   run where no worker executed anything reports 0% coverage.
/// - [`CubrirError::InconsistentBlockDefinition`] /
///   [`CubrirError::ModeMismatch`] when contributing profiles came from
///   different builds (always fatal, never papered over).
pub fn aggregate(outputs: &[WorkerOutput], scope: &[String]) -> CubrirResult<AggregateResult> {
    let primary_package = scope
        .first()
        .cloned()
        .or_else(|| outputs.first().map(|output| output.package_id.clone()))
        .unwrap_or_default();

    let mut kept = Vec::new();
    let mut zero_runs = Vec::new();
    let mut warnings = Vec::new();

    for output in outputs {
        if output.raw.trim().is_empty() {
            discard(
                &mut warnings,
                format!("worker profile for {} was empty; discarding", output.package_id),
            );
            continue;
        }
        match CoverProfile::parse(output.package_id.clone(), &output.raw) {
            Ok(profile) if profile.is_empty_run() => zero_runs.push(profile),
            Ok(profile) => kept.push(profile),
            // A garbled blob costs one worker's contribution, not the run
            Err(err @ CubrirError::MalformedProfile { .. }) => {
                discard(&mut warnings, err.to_string());
            }
            Err(err) => return Err(err),
        }
    }

    if kept.is_empty() {
        // Every parsable worker executed nothing: a legitimate 0% run,
        // not a missing result
        kept = zero_runs;
    } else {
        for profile in &zero_runs {
            discard(
                &mut warnings,
                format!(
                    "worker profile for {} reported zero executed statements; discarding",
                    profile.package_id()
                ),
            );
        }
    }

    if kept.is_empty() {
        return Err(CubrirError::NoProfilesProduced {
            package: primary_package,
        });
    }

    let effective_scope: Vec<String> = if scope.is_empty() {
        let mut declared: Vec<String> = kept
            .iter()
            .map(|profile| profile.package_id().to_string())
            .collect();
        declared.sort();
        declared.dedup();
        declared
    } else {
        scope.to_vec()
    };

    let merged = merge_profiles(kept)?;
    let scope_summary = merged.scope_summary(&effective_scope);
    debug!(
        package = %primary_package,
        percent = scope_summary.summary.percent(),
        "aggregated package run"
    );

    Ok(AggregateResult {
        primary_package,
        merged,
        scope: scope_summary,
        warnings,
    })
}

fn discard(warnings: &mut Vec<String>, message: String) {
    warn!("{message}");
    warnings.push(message);
}
