//! Ordered sets of filename filters.

use crate::{glob, FilterError};
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard library and third-party install trees, for any Python version.
const PYTHON_LIB_PATTERN: &str = r"^(?s-u:.)*lib[\\/]python\d*(?:\.\d+)?[\\/]";

/// Names the interpreter gives frames that have no source file.
const SYNTHETIC_FRAME_PATTERN: &str = r"^(?:~|<string>|<frozen (?s-u:.)*>)";

/// Where a filter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// A user-supplied glob.
    Glob,
    /// One of the patterns added by `--remove-garbage`.
    Builtin,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::Glob => write!(f, "glob"),
            FilterKind::Builtin => write!(f, "builtin"),
        }
    }
}

/// A compiled filename matcher.
#[derive(Debug, Clone)]
pub struct FilenameFilter {
    source: String,
    kind: FilterKind,
    regex: Regex,
}

impl FilenameFilter {
    /// Compile a user glob.
    pub fn glob(pattern: &str) -> Result<Self, FilterError> {
        Ok(Self {
            source: pattern.to_string(),
            kind: FilterKind::Glob,
            regex: glob::compile(pattern)?,
        })
    }

    fn builtin(name: &str, pattern: &str) -> Self {
        Self {
            source: name.to_string(),
            kind: FilterKind::Builtin,
            regex: Regex::new(pattern).expect("built-in pattern is valid"),
        }
    }

    /// The glob as given, or the name of a built-in pattern.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Match against a filename's marshal bytes.
    pub fn is_match(&self, filename: impl AsRef<[u8]>) -> bool {
        self.regex.is_match(filename.as_ref())
    }
}

/// The two patterns `--remove-garbage` adds, in order.
pub fn garbage_patterns() -> Vec<FilenameFilter> {
    vec![
        FilenameFilter::builtin("python-lib", PYTHON_LIB_PATTERN),
        FilenameFilter::builtin("synthetic-frames", SYNTHETIC_FRAME_PATTERN),
    ]
}

/// Filters applied in order; a filename is excluded by the first match.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<FilenameFilter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_globs<I, S>(globs: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let filters = globs
            .into_iter()
            .map(|g| FilenameFilter::glob(g.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filters })
    }

    /// Put the built-in garbage patterns ahead of the existing filters.
    pub fn with_garbage_patterns(mut self) -> Self {
        let mut filters = garbage_patterns();
        filters.append(&mut self.filters);
        self.filters = filters;
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilenameFilter> {
        self.filters.iter()
    }

    /// First filter that matches `filename`.
    pub fn matching(&self, filename: impl AsRef<[u8]>) -> Option<&FilenameFilter> {
        let filename = filename.as_ref();
        self.filters.iter().find(|f| f.is_match(filename))
    }

    pub fn excludes(&self, filename: impl AsRef<[u8]>) -> bool {
        self.matching(filename).is_some()
    }

    pub fn includes(&self, filename: impl AsRef<[u8]>) -> bool {
        !self.excludes(filename)
    }
}
