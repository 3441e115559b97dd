use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
