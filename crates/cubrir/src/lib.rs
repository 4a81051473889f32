//! Cubrir: Coverage Aggregation for Parallel Test Runners
//!
//! Cubrir (Spanish: "to cover") merges the per-worker statement-coverage
//! profiles a parallel test run produces into one aggregate report that is
//! numerically identical to a serial run of the same suite.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    CUBRIR Architecture                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   worker 1 ──┐                                                   │
//! │   worker 2 ──┼──► Parse ──► Merge ──► Summarize ──► Route        │
//! │   worker N ──┘   (profile)  (merge)   (summary)    (route)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers are independent OS processes with process-local counters; the
//! aggregation runs single-threaded after they have all terminated. The
//! central property is determinism: merged output is byte-identical
//! regardless of worker count or completion order.
//!
//! The test-execution engine, process spawning, and package discovery live
//! outside this crate; it consumes their output and hands placement
//! decisions back.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod aggregate;
mod merge;
mod profile;
mod result;
mod route;
mod session;
mod summary;

pub use aggregate::{aggregate, AggregateResult, WorkerOutput};
pub use merge::{merge_profiles, MergedSet};
pub use profile::{BlockKey, BlockStats, CoverMode, CoverProfile};
pub use result::{CubrirError, CubrirResult};
pub use route::{default_file_name, route, OutputPlacement};
pub use session::{PackageOutcome, SessionReport};
pub use summary::{CoverageSummary, ScopeSummary};
