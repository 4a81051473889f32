//! Cover Profile Model and Parser
//!
//! One raw profile per worker process, in the well-known line format:
//!
//! ```text
//! mode: count
//! fixture/fixture.go:5.20,7.2 2 3
//! fixture/fixture.go:9.13,11.2 1 0
//! ```
//!
//! Parsing is a pure transform: raw text in, [`CoverProfile`] out, no side
//! effects. Rendering is the exact inverse, with blocks emitted in key order
//! so a profile's serialization never depends on how it was assembled.

use crate::result::{CubrirError, CubrirResult};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

/// Coverage counting mode, fixed at instrumentation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoverMode {
    /// Did the block run at all (counters clamped to 0/1)
    #[default]
    Set,
    /// How many times did the block run
    Count,
    /// Like `count`, incremented atomically
    Atomic,
}

impl CoverMode {
    /// Parse a mode name from the profile header
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "set" => Some(Self::Set),
            "count" => Some(Self::Count),
            "atomic" => Some(Self::Atomic),
            _ => None,
        }
    }

    /// Get the header name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Count => "count",
            Self::Atomic => "atomic",
        }
    }
}

impl fmt::Display for CoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of one instrumented block: file plus source span.
///
/// Stable across runs of the same compiled package; this is the merge key.
/// The derived `Ord` is `(file, start_line, start_col, end_line, end_col)`,
/// which is also the serialization order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockKey {
    /// Source file, import-path style (`pkg/sub/file.go`)
    pub file: String,
    /// Span start line (1-based)
    pub start_line: u32,
    /// Span start column
    pub start_col: u32,
    /// Span end line
    pub end_line: u32,
    /// Span end column
    pub end_col: u32,
}

impl BlockKey {
    /// Package that owns this block, derived from the file path's
    /// directory component. `None` for a bare file name.
    #[must_use]
    pub fn package_id(&self) -> Option<&str> {
        self.file.rfind('/').map(|idx| &self.file[..idx])
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}.{},{}.{}",
            self.file, self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

/// Per-block counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStats {
    /// Statements in the block, fixed at instrumentation time
    pub statements: u32,
    /// Times the block ran (summed across workers after a merge)
    pub hits: u64,
}

/// One measured run's statement coverage for one package scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverProfile {
    package_id: String,
    mode: CoverMode,
    blocks: BTreeMap<BlockKey, BlockStats>,
}

impl CoverProfile {
    /// Create an empty profile for a package
    #[must_use]
    pub fn new(package_id: impl Into<String>, mode: CoverMode) -> Self {
        Self {
            package_id: package_id.into(),
            mode,
            blocks: BTreeMap::new(),
        }
    }

    /// Parse one worker's raw profile text.
    ///
    /// # Errors
    ///
    /// Returns [`CubrirError::MalformedProfile`] if the mode header is
    /// missing or unrecognized, or a record line cannot be decoded.
    pub fn parse(package_id: impl Into<String>, text: &str) -> CubrirResult<Self> {
        let package_id = package_id.into();
        let mut profile = None;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match &mut profile {
                None => {
                    let mode = Self::parse_mode_header(&package_id, line_no, line)?;
                    profile = Some(Self::new(package_id.clone(), mode));
                }
                Some(profile) => {
                    let (key, stats) = parse_block_line(&package_id, line_no, line)?;
                    profile.add(key, stats)?;
                }
            }
        }

        profile.ok_or_else(|| {
            CubrirError::malformed(package_id, 1, "missing mode header")
        })
    }

    fn parse_mode_header(package: &str, line_no: usize, line: &str) -> CubrirResult<CoverMode> {
        let name = line.strip_prefix("mode: ").ok_or_else(|| {
            CubrirError::malformed(package, line_no, format!("expected mode header, got {line:?}"))
        })?;
        CoverMode::from_name(name.trim()).ok_or_else(|| {
            CubrirError::malformed(package, line_no, format!("unrecognized cover mode {name:?}"))
        })
    }

    /// Add a block, summing hits if the key is already present.
    ///
    /// # Errors
    ///
    /// Returns [`CubrirError::InconsistentBlockDefinition`] if the key is
    /// present with a different statement count.
    pub fn add(&mut self, key: BlockKey, stats: BlockStats) -> CubrirResult<()> {
        match self.blocks.entry(key) {
            Entry::Vacant(slot) => {
                let _ = slot.insert(stats);
            }
            Entry::Occupied(mut slot) => {
                if slot.get().statements != stats.statements {
                    return Err(CubrirError::InconsistentBlockDefinition {
                        block: slot.key().to_string(),
                        left_statements: slot.get().statements,
                        right_statements: stats.statements,
                    });
                }
                slot.get_mut().hits += stats.hits;
            }
        }
        Ok(())
    }

    /// Serialize back to the raw text format: mode header, then one line
    /// per block in key order. `set` mode renders counters clamped to 0/1.
    #[must_use]
    pub fn render(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "mode: {}", self.mode);
        for (key, stats) in &self.blocks {
            let hits = match self.mode {
                CoverMode::Set => u64::from(stats.hits > 0),
                CoverMode::Count | CoverMode::Atomic => stats.hits,
            };
            let _ = writeln!(out, "{key} {} {hits}", stats.statements);
        }
        out
    }

    /// Package this profile was declared for
    #[must_use]
    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Cover mode
    #[must_use]
    pub fn mode(&self) -> CoverMode {
        self.mode
    }

    /// Iterate blocks in key order
    pub fn blocks(&self) -> impl Iterator<Item = (&BlockKey, &BlockStats)> {
        self.blocks.iter()
    }

    /// Number of instrumented blocks
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total instrumented statements
    #[must_use]
    pub fn total_statements(&self) -> u64 {
        self.blocks
            .values()
            .map(|stats| u64::from(stats.statements))
            .sum()
    }

    /// Statements in blocks that ran at least once
    #[must_use]
    pub fn covered_statements(&self) -> u64 {
        self.blocks
            .values()
            .filter(|stats| stats.hits > 0)
            .map(|stats| u64::from(stats.statements))
            .sum()
    }

    /// Whether this run executed no statements at all.
    ///
    /// An early worker crash leaves either an empty block table or a table
    /// of all-zero counters; both carry no coverage signal.
    #[must_use]
    pub fn is_empty_run(&self) -> bool {
        self.covered_statements() == 0
    }
}

fn parse_block_line(
    package: &str,
    line_no: usize,
    line: &str,
) -> CubrirResult<(BlockKey, BlockStats)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(CubrirError::malformed(
            package,
            line_no,
            format!("expected 3 fields, got {}", fields.len()),
        ));
    }

    let location = fields[0];
    let colon = location.rfind(':').ok_or_else(|| {
        CubrirError::malformed(package, line_no, "missing ':' between file and span")
    })?;
    let file = &location[..colon];
    let span = &location[colon + 1..];

    let (start, end) = span.split_once(',').ok_or_else(|| {
        CubrirError::malformed(package, line_no, "missing ',' between span endpoints")
    })?;
    let (start_line, start_col) = parse_position(package, line_no, start)?;
    let (end_line, end_col) = parse_position(package, line_no, end)?;

    let statements: u32 = parse_counter(package, line_no, fields[1], "statement count")?;
    let hits: u64 = parse_counter(package, line_no, fields[2], "hit count")?;

    Ok((
        BlockKey {
            file: file.to_string(),
            start_line,
            start_col,
            end_line,
            end_col,
        },
        BlockStats { statements, hits },
    ))
}

fn parse_position(package: &str, line_no: usize, pos: &str) -> CubrirResult<(u32, u32)> {
    let (line, col) = pos.split_once('.').ok_or_else(|| {
        CubrirError::malformed(package, line_no, format!("malformed position {pos:?}"))
    })?;
    let line = line.parse().map_err(|_| {
        CubrirError::malformed(package, line_no, format!("non-numeric line in {pos:?}"))
    })?;
    let col = col.parse().map_err(|_| {
        CubrirError::malformed(package, line_no, format!("non-numeric column in {pos:?}"))
    })?;
    Ok((line, col))
}

fn parse_counter<T: std::str::FromStr>(
    package: &str,
    line_no: usize,
    field: &str,
    what: &str,
) -> CubrirResult<T> {
    field.parse().map_err(|_| {
        CubrirError::malformed(package, line_no, format!("invalid {what} {field:?}"))
    })
}
