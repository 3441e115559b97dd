use crate::metrics::ReductionMetrics;
use std::fmt::Write;

/// Generates human-readable and machine-readable reduction summaries.
pub struct Report<'a> {
    metrics: &'a ReductionMetrics,
}

impl<'a> Report<'a> {
    pub fn new(metrics: &'a ReductionMetrics) -> Self {
        Self { metrics }
    }

    /// Generate a human-readable text report.
    pub fn to_text(&self) -> String {
        let m = self.metrics;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Entries:      {} -> {} ({} removed)",
            m.entries_before,
            m.entries_after,
            m.entries_removed()
        );
        let _ = writeln!(
            out,
            "Caller edges: {} -> {} ({} removed)",
            m.caller_edges_before,
            m.caller_edges_after,
            m.caller_edges_removed()
        );
        let _ = writeln!(
            out,
            "Inline time:  {:.6}s -> {:.6}s",
            m.inline_time_before, m.inline_time_after
        );
        if !m.filter_hits.is_empty() {
            let _ = writeln!(out, "Filters:");
            for hit in &m.filter_hits {
                let _ = writeln!(
                    out,
                    "  {:<8} {:<40} {:>8}",
                    hit.kind.to_string(),
                    hit.pattern,
                    hit.removed_entries
                );
            }
        }
        out
    }

    /// Generate a JSON report.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FilterHits, FilterKind};

    fn metrics() -> ReductionMetrics {
        ReductionMetrics {
            entries_before: 10,
            entries_after: 4,
            caller_edges_before: 20,
            caller_edges_after: 5,
            inline_time_before: 2.0,
            inline_time_after: 0.5,
            filter_hits: vec![FilterHits {
                pattern: "*/site-packages/*".to_string(),
                kind: FilterKind::Glob,
                removed_entries: 6,
            }],
        }
    }

    #[test]
    fn text_report_lists_totals_and_filters() {
        let metrics = metrics();
        let text = Report::new(&metrics).to_text();
        assert!(text.contains("Entries:      10 -> 4 (6 removed)"));
        assert!(text.contains("Caller edges: 20 -> 5 (15 removed)"));
        assert!(text.contains("Inline time:  2.000000s -> 0.500000s"));
        assert!(text.contains("*/site-packages/*"));
    }

    #[test]
    fn json_report_round_trips_metrics() {
        let metrics = metrics();
        let json = Report::new(&metrics).to_json().unwrap();
        assert!(json.contains("\"kind\": \"glob\""));
        let parsed: ReductionMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metrics);
    }
}
