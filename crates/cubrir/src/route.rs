//! Package Coverage Router
//!
//! Decides where one package's merged profile lands on disk and gets it
//! there all-or-nothing: bytes are staged to a temporary file in the
//! destination directory and atomically persisted, so a failed package run
//! never leaves a partial profile behind.
//!
//! Placement rules, in priority order:
//! 1. explicit output directory differing from the package's own directory
//!    (append or move semantics, directory tree auto-created);
//! 2. custom file name inside the package directory (overwrite);
//! 3. default `<package>.coverprofile` inside the package directory.
//!
//! "Append" is a semantic merge, not byte concatenation: two independently
//! merged profiles may still share blocks (the same package covered by two
//! package runs in one recursive session), and concatenating them would
//! double count and produce an invalid multi-mode file. The destination is
//! re-parsed and merged before rewriting.
//!
//! Writes to a destination shared between package runs (rule 1 output
//! directories) are serialized on a per-path lock: the append cycle re-reads
//! the destination before rewriting it, and two runs interleaving that cycle
//! would silently drop one side's counts.

use crate::merge::merge_profiles;
use crate::profile::CoverProfile;
use crate::result::{CubrirError, CubrirResult};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tempfile::NamedTempFile;
use tracing::debug;

/// Where one package run's merged profile should land.
///
/// Pure routing data; consumed once per package run.
#[derive(Debug, Clone)]
pub struct OutputPlacement {
    /// The package's own directory (the default destination)
    pub package_dir: PathBuf,
    /// Caller-requested file name, if any
    pub file_name: Option<String>,
    /// Caller-requested shared output directory, if any
    pub output_dir: Option<PathBuf>,
    /// Merge into an existing same-named file instead of replacing it
    pub append_if_exists: bool,
}

impl OutputPlacement {
    /// Default placement inside the package's own directory
    #[must_use]
    pub fn in_package_dir(package_dir: impl Into<PathBuf>) -> Self {
        Self {
            package_dir: package_dir.into(),
            file_name: None,
            output_dir: None,
            append_if_exists: false,
        }
    }

    /// Request a custom file name
    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Request a shared output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Merge into an existing destination file instead of replacing it
    #[must_use]
    pub const fn with_append(mut self, append: bool) -> Self {
        self.append_if_exists = append;
        self
    }
}

/// Default per-package profile name: the package path's base name with the
/// `.coverprofile` extension.
#[must_use]
pub fn default_file_name(package_id: &str) -> String {
    let base = package_id.rsplit('/').next().unwrap_or(package_id);
    let base = if base.is_empty() { "coverage" } else { base };
    format!("{base}.coverprofile")
}

/// Route one package's merged profile to its destination.
///
/// Returns the path the profile ended up at.
///
/// # Errors
///
/// [`CubrirError::OutputPlacement`] on directory creation or write
/// failure; parse/merge errors from the destination file when appending.
pub fn route(profile: &CoverProfile, placement: &OutputPlacement) -> CubrirResult<PathBuf> {
    let default_name = default_file_name(profile.package_id());

    match &placement.output_dir {
        Some(output_dir) if output_dir != &placement.package_dir => {
            std::fs::create_dir_all(output_dir)
                .map_err(|err| CubrirError::placement(output_dir.clone(), err.to_string()))?;

            if let Some(name) = &placement.file_name {
                // Rule 1, explicit name: write straight into the shared dir
                let dest = output_dir.join(name);
                write_or_append(profile, &dest, placement.append_if_exists)?;
                Ok(dest)
            } else {
                // Move semantics: produce the file in its natural location
                // first, then relocate into the shared dir
                let natural = placement.package_dir.join(&default_name);
                write_atomic(&natural, &profile.render())?;
                relocate(profile, &natural, output_dir, placement.append_if_exists)
            }
        }
        _ => {
            // Rules 2 and 3: inside the package's own directory, custom
            // name wins, existing files are replaced
            let name = placement.file_name.as_deref().unwrap_or(&default_name);
            let dest = placement.package_dir.join(name);
            write_atomic(&dest, &profile.render())?;
            Ok(dest)
        }
    }
}

/// Move a produced profile into the shared output directory, renaming to
/// disambiguate by package path when another package already claimed the
/// base name.
fn relocate(
    profile: &CoverProfile,
    natural: &Path,
    output_dir: &Path,
    append_if_exists: bool,
) -> CubrirResult<PathBuf> {
    let base = natural
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_else(|| default_file_name(profile.package_id()).into());
    let dest = output_dir.join(&base);

    let lock = lock_for(&dest);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

    if dest.exists() {
        if append_if_exists {
            merge_and_persist(profile, &dest, true)?;
            std::fs::remove_file(natural)
                .map_err(|err| CubrirError::placement(natural.to_path_buf(), err.to_string()))?;
            debug!(dest = %dest.display(), "appended relocated profile");
            return Ok(dest);
        }
        // Another package already owns this base name: flatten the full
        // package path into the file name
        let disambiguated =
            output_dir.join(format!("{}.coverprofile", profile.package_id().replace('/', "_")));
        rename(natural, &disambiguated)?;
        return Ok(disambiguated);
    }

    rename(natural, &dest)?;
    Ok(dest)
}

fn rename(from: &Path, to: &Path) -> CubrirResult<()> {
    std::fs::rename(from, to)
        .map_err(|err| CubrirError::placement(to.to_path_buf(), err.to_string()))
}

// One lock per shared destination; the map itself is guarded
static DEST_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// Lock guarding one destination file. Keyed on the canonical parent
/// directory joined with the file name, so differently-spelled paths to the
/// same file share a lock even before the file exists.
fn lock_for(dest: &Path) -> Arc<Mutex<()>> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let key = parent.canonicalize().map_or_else(
        |_| dest.to_path_buf(),
        |dir| dir.join(dest.file_name().unwrap_or_default()),
    );
    let mut registry = DEST_LOCKS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(registry.entry(key).or_default())
}

fn write_or_append(profile: &CoverProfile, dest: &Path, append: bool) -> CubrirResult<()> {
    let lock = lock_for(dest);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    merge_and_persist(profile, dest, append)
}

/// Caller must hold the destination's lock.
fn merge_and_persist(profile: &CoverProfile, dest: &Path, append: bool) -> CubrirResult<()> {
    if append && dest.exists() {
        let existing_text = std::fs::read_to_string(dest)
            .map_err(|err| CubrirError::placement(dest.to_path_buf(), err.to_string()))?;
        let existing = CoverProfile::parse(profile.package_id(), &existing_text)?;
        let merged = merge_profiles(vec![existing, profile.clone()])?;
        return write_atomic(dest, &merged.combined(profile.package_id()).render());
    }
    write_atomic(dest, &profile.render())
}

/// Stage to a temp file next to the destination, then atomically persist.
fn write_atomic(dest: &Path, contents: &str) -> CubrirResult<()> {
    let dir = dest.parent().filter(|p| !p.as_os_str().is_empty());
    let dir = dir.unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir)
        .map_err(|err| CubrirError::placement(dest.to_path_buf(), err.to_string()))?;
    staged
        .write_all(contents.as_bytes())
        .map_err(|err| CubrirError::placement(dest.to_path_buf(), err.to_string()))?;
    staged
        .persist(dest)
        .map_err(|err| CubrirError::placement(dest.to_path_buf(), err.to_string()))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PROFILE: &str = "\
mode: count
fixture/fixture.go:5.1,7.2 2 1
fixture/fixture.go:9.1,11.2 3 0
";

    fn fixture_profile() -> CoverProfile {
        CoverProfile::parse("fixture", PROFILE).unwrap()
    }

    #[test]
    fn test_default_name_uses_package_base() {
        assert_eq!(default_file_name("fixture"), "fixture.coverprofile");
        assert_eq!(
            default_file_name("coverage_fixture/external"),
            "external.coverprofile"
        );
    }

    #[test]
    fn test_rule3_default_placement_in_package_dir() {
        let pkg = tempdir().unwrap();
        let placement = OutputPlacement::in_package_dir(pkg.path());

        let dest = route(&fixture_profile(), &placement).unwrap();
        assert_eq!(dest, pkg.path().join("fixture.coverprofile"));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), PROFILE);
    }

    #[test]
    fn test_rule2_custom_name_overwrites_no_stray_default() {
        let pkg = tempdir().unwrap();
        std::fs::write(pkg.path().join("coverage.txt"), "stale").unwrap();
        let placement =
            OutputPlacement::in_package_dir(pkg.path()).with_file_name("coverage.txt");

        let dest = route(&fixture_profile(), &placement).unwrap();
        assert_eq!(dest, pkg.path().join("coverage.txt"));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), PROFILE);
        // exactly one profile file: the custom name, no default-named stray
        assert!(!pkg.path().join("fixture.coverprofile").exists());
    }

    #[test]
    fn test_rule1_custom_name_into_created_nested_dir() {
        let pkg = tempdir().unwrap();
        let out = pkg.path().join("reports/nested/cover");
        let placement = OutputPlacement::in_package_dir(pkg.path())
            .with_file_name("coverage.txt")
            .with_output_dir(&out);

        let dest = route(&fixture_profile(), &placement).unwrap();
        assert_eq!(dest, out.join("coverage.txt"));
        assert!(dest.exists());
    }

    #[test]
    fn test_append_is_semantic_merge_not_concatenation() {
        let pkg = tempdir().unwrap();
        let out = tempdir().unwrap();
        let placement = OutputPlacement::in_package_dir(pkg.path())
            .with_file_name("all.coverprofile")
            .with_output_dir(out.path())
            .with_append(true);

        let first = route(&fixture_profile(), &placement).unwrap();
        let second = route(&fixture_profile(), &placement).unwrap();
        assert_eq!(first, second);

        let contents = std::fs::read_to_string(&second).unwrap();
        // shared blocks summed once each, no duplicated lines
        assert_eq!(contents.matches("mode:").count(), 1);
        assert_eq!(contents.matches("fixture/fixture.go:5.1,7.2").count(), 1);
        assert!(contents.contains("fixture/fixture.go:5.1,7.2 2 2"));
    }

    #[test]
    fn test_append_rejects_profile_from_other_build() {
        let out = tempdir().unwrap();
        let pkg = tempdir().unwrap();
        std::fs::write(
            out.path().join("all.coverprofile"),
            "mode: set\nfixture/fixture.go:5.1,7.2 2 1\n",
        )
        .unwrap();
        let placement = OutputPlacement::in_package_dir(pkg.path())
            .with_file_name("all.coverprofile")
            .with_output_dir(out.path())
            .with_append(true);

        let err = route(&fixture_profile(), &placement).unwrap_err();
        assert!(matches!(err, CubrirError::ModeMismatch { .. }));
    }

    #[test]
    fn test_concurrent_appends_to_shared_file_lose_no_counts() {
        let out = tempdir().unwrap();
        let pkgs: Vec<_> = (0..4).map(|_| tempdir().unwrap()).collect();

        let handles: Vec<_> = pkgs
            .iter()
            .map(|pkg| {
                let placement = OutputPlacement::in_package_dir(pkg.path())
                    .with_file_name("all.coverprofile")
                    .with_output_dir(out.path())
                    .with_append(true);
                let profile = fixture_profile();
                std::thread::spawn(move || route(&profile, &placement).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents =
            std::fs::read_to_string(out.path().join("all.coverprofile")).unwrap();
        // each run contributed one hit; all four survive the interleaving
        assert!(contents.contains("fixture/fixture.go:5.1,7.2 2 4"));
        assert_eq!(contents.matches("mode:").count(), 1);
    }

    #[test]
    fn test_move_semantics_relocates_not_copies() {
        let pkg = tempdir().unwrap();
        let out = tempdir().unwrap();
        let placement =
            OutputPlacement::in_package_dir(pkg.path()).with_output_dir(out.path());

        let dest = route(&fixture_profile(), &placement).unwrap();
        assert_eq!(dest, out.path().join("fixture.coverprofile"));
        assert!(dest.exists());
        // relocated, not copied: nothing remains at the natural location
        assert!(!pkg.path().join("fixture.coverprofile").exists());
    }

    #[test]
    fn test_move_collision_disambiguates_by_package_path() {
        let out = tempdir().unwrap();
        let pkg_a = tempdir().unwrap();
        let pkg_b = tempdir().unwrap();

        let profile_a =
            CoverProfile::parse("a/util", "mode: count\na/util/u.go:1.1,2.2 1 1\n").unwrap();
        let profile_b =
            CoverProfile::parse("b/util", "mode: count\nb/util/u.go:1.1,2.2 1 1\n").unwrap();

        let dest_a = route(
            &profile_a,
            &OutputPlacement::in_package_dir(pkg_a.path()).with_output_dir(out.path()),
        )
        .unwrap();
        let dest_b = route(
            &profile_b,
            &OutputPlacement::in_package_dir(pkg_b.path()).with_output_dir(out.path()),
        )
        .unwrap();

        assert_eq!(dest_a, out.path().join("util.coverprofile"));
        assert_eq!(dest_b, out.path().join("b_util.coverprofile"));
        assert!(dest_a.exists());
        assert!(dest_b.exists());
    }

    #[test]
    fn test_move_with_append_merges_colliding_package_runs() {
        let out = tempdir().unwrap();
        let pkg = tempdir().unwrap();
        let placement = OutputPlacement::in_package_dir(pkg.path())
            .with_output_dir(out.path())
            .with_append(true);

        let first = route(&fixture_profile(), &placement).unwrap();
        let second = route(&fixture_profile(), &placement).unwrap();
        assert_eq!(first, second);

        let contents = std::fs::read_to_string(&second).unwrap();
        assert!(contents.contains("fixture/fixture.go:5.1,7.2 2 2"));
        // the natural-location staging file was cleaned up
        assert!(!pkg.path().join("fixture.coverprofile").exists());
    }

    #[test]
    fn test_unwritable_output_dir_is_placement_error() {
        let pkg = tempdir().unwrap();
        // a plain file where the output directory should go
        let blocker = pkg.path().join("outdir");
        std::fs::write(&blocker, "file, not a dir").unwrap();

        let placement = OutputPlacement::in_package_dir(pkg.path())
            .with_file_name("coverage.txt")
            .with_output_dir(&blocker);
        let err = route(&fixture_profile(), &placement).unwrap_err();
        assert!(matches!(err, CubrirError::OutputPlacement { .. }));
    }

    #[test]
    fn test_output_dir_equal_to_package_dir_uses_default_rules() {
        let pkg = tempdir().unwrap();
        let placement = OutputPlacement::in_package_dir(pkg.path())
            .with_output_dir(pkg.path().to_path_buf());

        let dest = route(&fixture_profile(), &placement).unwrap();
        // same dir: no move dance, just the default per-package name
        assert_eq!(dest, pkg.path().join("fixture.coverprofile"));
    }
}
