//! Core types and schemas for Python profiler stats dumps.
//!
//! This crate defines the data structures shared by the rest of the
//! workspace:
//! - a codec for the subset of Python's `marshal` format that `pstats`
//!   dumps are written in
//! - a typed model of the stats table (`Profile`)
//! - the common error type

pub mod error;
pub mod marshal;
pub mod stats;

pub use error::{Error, Result};
pub use marshal::{PyStr, Value};
pub use stats::{CallSite, CallerStats, FunctionStats, Profile};
