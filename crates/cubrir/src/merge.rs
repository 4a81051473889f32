//! Profile Merger
//!
//! Combines N per-worker profiles into one profile per distinct package,
//! keyed by block identity, with hit counts summed. Output ordering is
//! deterministic and independent of worker count or completion order: the
//! merged serialization of a 1-worker run and a 4-worker run of the same
//! suite is byte-identical. Parallel execution must be observationally
//! equivalent to serial execution from the report's point of view.
//!
//! A statement-count or mode disagreement between contributors means the
//! profiles came from different binaries; that is fatal, never silently
//! merged.

use crate::profile::{CoverMode, CoverProfile};
use crate::result::{CubrirError, CubrirResult};
use crate::summary::{CoverageSummary, ScopeSummary};
use std::collections::BTreeMap;
use tracing::debug;

/// One merged profile per distinct package, plus the shared cover mode
#[derive(Debug, Clone, Default)]
pub struct MergedSet {
    mode: CoverMode,
    profiles: BTreeMap<String, CoverProfile>,
}

/// Merge parsed worker profiles into one [`MergedSet`].
///
/// Blocks are grouped by their owning package (the file path's directory,
/// falling back to the profile's declared package for bare file names) and
/// summed per block key.
///
/// # Errors
///
/// - [`CubrirError::ModeMismatch`] when contributing profiles carry
///   different cover modes.
/// - [`CubrirError::InconsistentBlockDefinition`] when the same block key
///   appears with different statement counts.
pub fn merge_profiles(
    profiles: impl IntoIterator<Item = CoverProfile>,
) -> CubrirResult<MergedSet> {
    let mut merged: Option<MergedSet> = None;

    for profile in profiles {
        let mode = profile.mode();
        let set = merged.get_or_insert_with(|| MergedSet {
            mode,
            profiles: BTreeMap::new(),
        });
        if set.mode != mode {
            return Err(CubrirError::ModeMismatch {
                left: set.mode.name().to_string(),
                right: mode.name().to_string(),
            });
        }

        let declared = profile.package_id().to_string();
        for (key, stats) in profile.blocks() {
            let owner = key
                .package_id()
                .map_or_else(|| declared.clone(), str::to_string);
            set.profiles
                .entry(owner.clone())
                .or_insert_with(|| CoverProfile::new(owner, set.mode))
                .add(key.clone(), *stats)?;
        }
    }

    let merged = merged.unwrap_or_default();
    debug!(
        packages = merged.profiles.len(),
        mode = merged.mode.name(),
        "merged worker profiles"
    );
    Ok(merged)
}

impl MergedSet {
    /// Shared cover mode of all contributors
    #[must_use]
    pub fn mode(&self) -> CoverMode {
        self.mode
    }

    /// Whether no profile contributed any blocks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Distinct package IDs, in deterministic order
    pub fn package_ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Merged profile for one package
    #[must_use]
    pub fn get(&self, package_id: &str) -> Option<&CoverProfile> {
        self.profiles.get(package_id)
    }

    /// Iterate merged profiles in package order
    pub fn profiles(&self) -> impl Iterator<Item = (&str, &CoverProfile)> {
        self.profiles
            .iter()
            .map(|(package, profile)| (package.as_str(), profile))
    }

    /// Summary for one package, `None` if it contributed no blocks
    #[must_use]
    pub fn summary_for(&self, package_id: &str) -> Option<CoverageSummary> {
        self.profiles.get(package_id).map(CoverageSummary::of)
    }

    /// Union summary over exactly the packages named in `scope`.
    ///
    /// Packages incidentally present in raw data but not named are excluded
    /// from both numerator and denominator; named packages without data
    /// contribute zero.
    #[must_use]
    pub fn scope_summary(&self, scope: &[String]) -> ScopeSummary {
        let mut summary = CoverageSummary::default();
        for package in scope {
            if let Some(per_package) = self.summary_for(package) {
                summary.absorb(per_package);
            }
        }
        ScopeSummary {
            packages: scope.to_vec(),
            summary,
        }
    }

    /// Collapse the whole set into a single profile (one mode header, all
    /// blocks in global key order) for serialization or routing.
    #[must_use]
    pub fn combined(&self, label: impl Into<String>) -> CoverProfile {
        let mut combined = CoverProfile::new(label, self.mode);
        for profile in self.profiles.values() {
            for (key, stats) in profile.blocks() {
                // Keys are unique across packages (distinct file paths),
                // so this cannot hit the consistency check.
                let _ = combined.add(key.clone(), *stats);
            }
        }
        combined
    }
}
