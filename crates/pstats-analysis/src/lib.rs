//! Filtering and analysis tools for profiler stats.
//!
//! This crate provides:
//! - Shell-style glob translation to anchored regular expressions
//! - Ordered filename filter sets, including the built-in garbage patterns
//! - The reducer that drops matching call sites and caller edges
//! - Reduction metrics and summary reports

pub mod config;
pub mod error;
pub mod filter;
pub mod glob;
pub mod metrics;
pub mod reducer;
pub mod report;

pub use config::FilterConfig;
pub use error::FilterError;
pub use filter::{FilenameFilter, FilterKind, FilterSet};
pub use metrics::{FilterHits, ReductionMetrics};
pub use reducer::{included_filenames, Reducer, Reduction};
pub use report::Report;
