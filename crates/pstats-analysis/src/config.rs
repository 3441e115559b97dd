use crate::{FilterError, FilterSet};
use serde::{Deserialize, Serialize};

/// User-facing filter options, as collected from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Globs for filenames to exclude.
    pub globs: Vec<String>,
    /// Also exclude standard-library paths and synthetic frames.
    pub remove_garbage: bool,
}

impl FilterConfig {
    pub fn new(globs: Vec<String>) -> Self {
        Self {
            globs,
            remove_garbage: false,
        }
    }

    pub fn with_remove_garbage(mut self, remove_garbage: bool) -> Self {
        self.remove_garbage = remove_garbage;
        self
    }

    /// Compile the configured patterns. Built-in patterns come first.
    pub fn build(&self) -> Result<FilterSet, FilterError> {
        let filters = FilterSet::from_globs(&self.globs)?;
        Ok(if self.remove_garbage {
            filters.with_garbage_patterns()
        } else {
            filters
        })
    }
}
