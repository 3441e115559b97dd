use crate::FilterKind;
use serde::{Deserialize, Serialize};

/// What a reduction removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReductionMetrics {
    pub entries_before: usize,
    pub entries_after: usize,
    pub caller_edges_before: usize,
    pub caller_edges_after: usize,
    pub inline_time_before: f64,
    pub inline_time_after: f64,
    /// One record per filter, in filter order.
    pub filter_hits: Vec<FilterHits>,
}

/// Top-level entries a single filter was the first to match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterHits {
    pub pattern: String,
    pub kind: FilterKind,
    pub removed_entries: usize,
}

impl ReductionMetrics {
    pub fn entries_removed(&self) -> usize {
        self.entries_before - self.entries_after
    }

    pub fn caller_edges_removed(&self) -> usize {
        self.caller_edges_before - self.caller_edges_after
    }

    /// Filters that did not remove any top-level entry.
    pub fn unused_filters(&self) -> impl Iterator<Item = &FilterHits> {
        self.filter_hits.iter().filter(|h| h.removed_entries == 0)
    }
}
