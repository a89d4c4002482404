//! Named event counters collected over a run.

use std::io::Write;

use rustc_hash::FxHashMap;

use crate::errors::*;
use crate::motif::Divergence;

pub const TOTAL_SEQS: &str = "total_seqs";
pub const TOTAL_PASSED: &str = "total_passed";
pub const TOTAL_REJECTED: &str = "total_rejected";
pub const TOTAL_FULL_LENGTH: &str = "total_full_length";
pub const WITH_TRAILER: &str = "with_trailer";

pub const SHORT_REJECTED: &str = "short_rejected";
pub const BOTH_REJECTED: &str = "both_rejected";
pub const T_LOOP_REJECTED: &str = "t_loop_rejected";
pub const ACCEPTOR_REJECTED: &str = "acceptor_rejected";

pub const PASSED_STAGE: &str = "passed";
pub const REJECTED_STAGE: &str = "rejected";

pub const SUBSEQ_MATCH: &str = "anticodon.subseq_match";

pub const REJECTED_BY_PREFIX: &str = "rejected_by.";

const REPORT_PADDING: usize = 55;

/// Flat counter map. Counts only ever go up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsAggregator {
    counts: FxHashMap<String, u64>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&mut self, key: &str) {
        self.add(key, 1);
    }

    pub fn add(&mut self, key: &str, n: u64) {
        if let Some(c) = self.counts.get_mut(key) {
            *c += n;
        } else {
            self.counts.insert(key.to_owned(), n);
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Add all counts from another aggregator. Merging is commutative, so
    /// per-worker aggregators can be folded in any order.
    pub fn merge(&mut self, other: &StatsAggregator) {
        for (k, &v) in &other.counts {
            self.add(k, v);
        }
    }

    /// Count the divergence of the single window retained for a sequence.
    pub fn record_divergence(&mut self, stage: &str, divergence: Divergence) {
        match divergence {
            Divergence::None => self.incr(&format!("{stage}.no_divergence")),
            Divergence::TLoop(pos) => {
                self.incr(&format!("{stage}.t_loop_divergence"));
                if let Some(pos) = pos {
                    self.incr(&format!("{stage}.t_loop_divergence_at_{pos}"));
                }
            }
            Divergence::Acceptor(pos) => {
                self.incr(&format!("{stage}.acceptor_divergence"));
                if let Some(pos) = pos {
                    self.incr(&format!("{stage}.acceptor_divergence_at_{pos}"));
                }
            }
        }
    }

    /// All counters sorted by key.
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut res = self
            .counts
            .iter()
            .map(|(k, &v)| (k.as_str(), v))
            .collect::<Vec<_>>();
        res.sort_unstable();
        res
    }

    /// Write `key\tvalue` rows sorted by key.
    pub fn write_tsv(&self, writer: impl Write) -> Result<()> {
        let mut w = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(writer);

        w.write_record(["key", "value"])?;
        for (k, v) in self.sorted() {
            w.write_record([k, v.to_string().as_str()])?;
        }
        w.flush().map_err(|e| Error::BytesIo(Box::new(e)))?;

        Ok(())
    }

    /// Write the indented human-readable report.
    ///
    /// Canonical counters come first in their fixed hierarchy, followed by
    /// every other counter (anticodon and rule counters) sorted by key.
    pub fn write_report(&self, mut writer: impl Write) -> Result<()> {
        let mut lines = Vec::new();

        lines.push(("Total seqs", self.get(TOTAL_SEQS), 1));
        lines.push(("Total full-length", self.get(TOTAL_FULL_LENGTH), 1));
        lines.push(("With trailer", self.get(WITH_TRAILER), 1));
        lines.push(("Total passed", self.get(TOTAL_PASSED), 1));
        let passed = self.divergence_lines(PASSED_STAGE);
        lines.extend(passed.iter().map(|(l, v, d)| (l.as_str(), *v, *d)));
        lines.push(("Total failed", self.get(TOTAL_REJECTED), 1));
        lines.push(("T-loop seq rejected", self.get(T_LOOP_REJECTED), 2));
        lines.push(("Acceptor seq rejected", self.get(ACCEPTOR_REJECTED), 2));
        lines.push(("Both rejected", self.get(BOTH_REJECTED), 2));
        lines.push(("Short rejected", self.get(SHORT_REJECTED), 2));
        let rejected = self.divergence_lines(REJECTED_STAGE);
        lines.extend(rejected.iter().map(|(l, v, d)| (l.as_str(), *v, *d)));

        let mut out = String::new();
        for (label, value, level) in lines {
            out.push_str(&format_line(label, value, level));
        }

        let known = known_keys();
        for (k, v) in self.sorted() {
            if !known.iter().any(|known| known == k) {
                out.push_str(&format_line(k, v, 1));
            }
        }

        writer
            .write_all(out.as_bytes())
            .map_err(|e| Error::BytesIo(Box::new(e)))
    }

    fn divergence_lines(&self, stage: &str) -> Vec<(String, u64, usize)> {
        let mut lines = Vec::new();

        if stage == PASSED_STAGE {
            lines.push((
                "No divergence".to_owned(),
                self.get(&format!("{stage}.no_divergence")),
                2,
            ));
        }

        lines.push((
            "T-loop divergence".to_owned(),
            self.get(&format!("{stage}.t_loop_divergence")),
            2,
        ));
        for (pos, _) in crate::motif::T_LOOP_POSITIONS {
            lines.push((
                format!("Divergence at pos {pos}"),
                self.get(&format!("{stage}.t_loop_divergence_at_{pos}")),
                3,
            ));
        }

        lines.push((
            "Acceptor divergence".to_owned(),
            self.get(&format!("{stage}.acceptor_divergence")),
            2,
        ));
        for (pos, _) in crate::motif::ACCEPTOR_POSITIONS {
            lines.push((
                format!("Divergence at pos {pos}"),
                self.get(&format!("{stage}.acceptor_divergence_at_{pos}")),
                3,
            ));
        }

        lines
    }
}

fn known_keys() -> Vec<String> {
    let mut keys = [
        TOTAL_SEQS,
        TOTAL_PASSED,
        TOTAL_REJECTED,
        TOTAL_FULL_LENGTH,
        WITH_TRAILER,
        SHORT_REJECTED,
        BOTH_REJECTED,
        T_LOOP_REJECTED,
        ACCEPTOR_REJECTED,
    ]
    .iter()
    .map(|k| k.to_string())
    .collect::<Vec<_>>();

    for stage in [PASSED_STAGE, REJECTED_STAGE] {
        keys.push(format!("{stage}.no_divergence"));
        keys.push(format!("{stage}.t_loop_divergence"));
        keys.push(format!("{stage}.acceptor_divergence"));
        for (pos, _) in crate::motif::T_LOOP_POSITIONS {
            keys.push(format!("{stage}.t_loop_divergence_at_{pos}"));
        }
        for (pos, _) in crate::motif::ACCEPTOR_POSITIONS {
            keys.push(format!("{stage}.acceptor_divergence_at_{pos}"));
        }
    }

    keys
}

fn format_line(label: &str, value: u64, level: usize) -> String {
    let indent = match level {
        1 => 0,
        2 => 4,
        _ => 12,
    };
    let tabs = "\t".repeat(level.saturating_sub(1).min(2));
    let pad = REPORT_PADDING.saturating_sub(indent + label.len());

    format!("{tabs}{label} {}\t{value}\n", " ".repeat(pad))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incr_and_merge() {
        let mut a = StatsAggregator::new();
        a.incr(TOTAL_SEQS);
        a.incr(TOTAL_SEQS);
        a.incr(TOTAL_PASSED);

        let mut b = StatsAggregator::new();
        b.incr(TOTAL_SEQS);
        b.add("rejected_by.min_length", 4);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.get(TOTAL_SEQS), 3);
        assert_eq!(ab.get(TOTAL_PASSED), 1);
        assert_eq!(ab.get("rejected_by.min_length"), 4);
        assert_eq!(ab.get("missing"), 0);
    }

    #[test]
    fn test_record_divergence() {
        let mut stats = StatsAggregator::new();
        stats.record_divergence(PASSED_STAGE, Divergence::None);
        stats.record_divergence(PASSED_STAGE, Divergence::TLoop(Some(3)));
        stats.record_divergence(REJECTED_STAGE, Divergence::Acceptor(Some(-1)));

        assert_eq!(stats.get("passed.no_divergence"), 1);
        assert_eq!(stats.get("passed.t_loop_divergence"), 1);
        assert_eq!(stats.get("passed.t_loop_divergence_at_3"), 1);
        assert_eq!(stats.get("rejected.acceptor_divergence"), 1);
        assert_eq!(stats.get("rejected.acceptor_divergence_at_-1"), 1);
    }

    #[test]
    fn test_write_tsv() {
        let mut stats = StatsAggregator::new();
        stats.add(TOTAL_SEQS, 10);
        stats.add(TOTAL_PASSED, 7);

        let mut buf = Vec::new();
        stats.write_tsv(&mut buf).unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "key\tvalue\ntotal_passed\t7\ntotal_seqs\t10\n"
        );
    }

    #[test]
    fn test_write_report() {
        let mut stats = StatsAggregator::new();
        stats.add(TOTAL_SEQS, 3);
        stats.add("anticodon.type_i", 2);

        let mut buf = Vec::new();
        stats.write_report(&mut buf).unwrap();
        let report = String::from_utf8(buf).unwrap();

        let first = report.lines().next().unwrap();
        assert!(first.starts_with("Total seqs "));
        assert!(first.ends_with("\t3"));
        assert_eq!(first.len(), REPORT_PADDING + 1 + 2);
        assert!(report.contains("\t\tDivergence at pos -3"));
        assert!(report.lines().last().unwrap().starts_with("anticodon.type_i "));
    }
}
