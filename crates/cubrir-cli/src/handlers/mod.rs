//! Command handlers

mod merge;
mod report;

pub use merge::execute_merge;
pub use report::execute_report;
