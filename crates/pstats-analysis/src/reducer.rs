use crate::metrics::{FilterHits, ReductionMetrics};
use crate::FilterSet;
use itertools::Itertools;
use pstats_core::{Profile, PyStr};

/// Drops call sites whose filename is matched by a filter set.
pub struct Reducer {
    filters: FilterSet,
}

/// A reduced profile and what was taken out of it.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub profile: Profile,
    pub metrics: ReductionMetrics,
}

impl Reducer {
    pub fn new(filters: FilterSet) -> Self {
        Self { filters }
    }

    /// Return a copy of `profile` without excluded entries or caller edges.
    /// The input is left untouched.
    pub fn reduce(&self, profile: &Profile) -> Reduction {
        let mut hits: Vec<FilterHits> = self
            .filters
            .iter()
            .map(|f| FilterHits {
                pattern: f.source().to_string(),
                kind: f.kind(),
                removed_entries: 0,
            })
            .collect();

        for filename in profile.filenames() {
            if let Some(index) = self.filters.iter().position(|f| f.is_match(filename)) {
                hits[index].removed_entries += 1;
            }
        }

        let mut reduced = profile.clone();
        reduced.retain_filenames(|filename| self.filters.includes(filename));

        let metrics = ReductionMetrics {
            entries_before: profile.len(),
            entries_after: reduced.len(),
            caller_edges_before: profile.caller_edge_count(),
            caller_edges_after: reduced.caller_edge_count(),
            inline_time_before: profile.total_inline_time(),
            inline_time_after: reduced.total_inline_time(),
            filter_hits: hits,
        };

        tracing::info!(
            entries_before = metrics.entries_before,
            entries_after = metrics.entries_after,
            caller_edges_removed = metrics.caller_edges_removed(),
            "reduced profile"
        );
        for unused in metrics.unused_filters() {
            tracing::warn!(
                pattern = %unused.pattern,
                kind = %unused.kind,
                "filter matched no entries"
            );
        }

        Reduction {
            profile: reduced,
            metrics,
        }
    }
}

/// Deduplicated, sorted filenames of the top-level entries.
pub fn included_filenames(profile: &Profile) -> Vec<PyStr> {
    profile
        .filenames()
        .sorted_unstable()
        .dedup()
        .cloned()
        .collect()
}
