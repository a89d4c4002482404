//! Run driver: reads records, classifies them, and hands accepted reads to a
//! profile sink.

use thread_local::*;

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::anticodon::*;
use crate::classify::*;
use crate::diagnostics::*;
use crate::errors::*;
use crate::input::*;
use crate::motif::score_window;
use crate::profile::*;
use crate::rules::*;
use crate::stats::*;
use crate::trailer::*;

/// Log progress each time this many more reads have been processed.
pub const PROGRESS_EVERY: usize = 100_000;

pub enum SortMode {
    /// Fixed motif thresholds.
    Canonical,
    /// Configurable rule chain, with per-rule diagnostics.
    Rules(FilterRuleSet),
}

/// Counters and diagnostics gathered over a whole run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: StatsAggregator,
    pub diagnostics: Diagnostics,
}

impl RunSummary {
    pub fn merge(&mut self, other: RunSummary) {
        self.stats.merge(&other.stats);
        self.diagnostics.merge(other.diagnostics);
    }
}

struct Progress {
    total: AtomicUsize,
    passed: AtomicUsize,
}

impl Progress {
    fn update(&self, total: usize, passed: usize) {
        let p = self.passed.fetch_add(passed, Ordering::Relaxed) + passed;
        let before = self.total.fetch_add(total, Ordering::Relaxed);
        let t = before + total;

        if t / PROGRESS_EVERY > before / PROGRESS_EVERY {
            log::info!(
                "{p} :: {t} (num tRNAs :: num raw reads so far): {:.2}%",
                p as f64 * 100.0 / t as f64
            );
        }
    }
}

pub struct Sorter {
    sample_name: String,
    classifier: Classifier,
    extractor: AnticodonExtractor,
    rules: Option<RuleChain>,
    diagnostics_writer: Option<DiagnosticsWriter>,
}

impl Sorter {
    pub fn new(sample_name: impl Into<String>, mode: SortMode) -> Self {
        let (extractor, rules) = match mode {
            SortMode::Canonical => (AnticodonExtractor::default(), None),
            SortMode::Rules(rules) => {
                let chain = rules.build();
                (chain.extractor().clone(), Some(chain))
            }
        };

        Self {
            sample_name: sample_name.into(),
            classifier: Classifier::new(),
            extractor,
            rules,
            diagnostics_writer: None,
        }
    }

    /// Write rejected reads to per-rule files during the run instead of
    /// returning them in the [`RunSummary`].
    pub fn with_diagnostics_writer(mut self, writer: DiagnosticsWriter) -> Self {
        self.diagnostics_writer = Some(writer);
        self
    }

    pub fn sample_name(&self) -> &str {
        &self.sample_name
    }

    /// Classify one read, returning its profile row if it is a tRNA.
    pub fn process(
        &self,
        record: &SeqRecord,
        stats: &mut StatsAggregator,
        diagnostics: &mut Diagnostics,
    ) -> Option<ProfileRecord> {
        stats.incr(TOTAL_SEQS);
        let id = format!("{}_{}", self.sample_name, record.pos);

        let Some(rules) = &self.rules else {
            let (accepted, classified) = self.classifier.classify(&record.seq, stats);
            if !accepted {
                return None;
            }
            let offset = classified.best_offset.unwrap_or(0);
            return Some(self.post_process(id, classified, offset, None, stats));
        };

        let outcome = rules.evaluate(&id, &record.seq, stats, diagnostics);
        if !outcome.passed() {
            return None;
        }

        let offset = outcome.window_offset.unwrap_or(0);
        let mut classified = ClassificationRecord::new(&record.seq);
        if let Some(window) = window_at(&record.seq, offset) {
            classified.set_best(window, offset, score_window(window));
        }

        Some(self.post_process(id, classified, offset, outcome.hits, stats))
    }

    fn post_process(
        &self,
        id: String,
        mut record: ClassificationRecord,
        offset: usize,
        hits: Option<Vec<AnticodonHit>>,
        stats: &mut StatsAggregator,
    ) -> ProfileRecord {
        split_trailer(&mut record, offset);
        if record.trailer_length > 0 {
            stats.incr(WITH_TRAILER);
        }
        if full_length(&mut record) {
            stats.incr(TOTAL_FULL_LENGTH);
        }

        let hits =
            hits.unwrap_or_else(|| self.extractor.extract(&record.trimmed, record.full_length));
        count_hits(stats, &hits);
        record.anticodons = hits.into_iter().map(|h| h.anticodon).collect();

        ProfileRecord::from_classification(id, &record)
    }

    /// Sort every read in `input`, appending accepted reads to `sink` one
    /// chunk at a time.
    ///
    /// Each worker keeps its own counters, merged once all workers are done.
    /// Read IDs come from input positions, so the summary does not depend on
    /// the number of threads, though the order of rows in the sink may.
    pub fn run<S: ProfileSink + Send>(
        &self,
        input: &FastaInput,
        sink: &mut S,
        threads: usize,
    ) -> Result<RunSummary> {
        let threads = threads.max(1);
        log::info!(
            "Sorting reads for sample \"{}\" using {threads} thread(s)",
            self.sample_name
        );

        let locals: ThreadLocal<RefCell<RunSummary>> = ThreadLocal::new();
        let progress = Progress {
            total: AtomicUsize::new(0),
            passed: AtomicUsize::new(0),
        };
        {
            let shared_sink = Mutex::new(&mut *sink);

            if threads == 1 {
                self.work(input, &shared_sink, &locals, &progress)?;
            } else {
                let (sink, locals, progress) = (&shared_sink, &locals, &progress);

                std::thread::scope(|s| {
                    let handles = (0..threads)
                        .map(|_| s.spawn(move || self.work(input, sink, locals, progress)))
                        .collect::<Vec<_>>();

                    handles
                        .into_iter()
                        .try_for_each(|h| h.join().map_err(|_| Error::Worker)?)
                })?;
            }
        }

        sink.finish()?;

        let mut summary = RunSummary::default();
        for local in locals.into_iter() {
            summary.merge(local.into_inner());
        }

        if let Some(writer) = &self.diagnostics_writer {
            writer.flush(&mut summary.diagnostics)?;
        }

        log::info!(
            "Sorted {} reads: {} tRNAs, {} full length",
            summary.stats.get(TOTAL_SEQS),
            summary.stats.get(TOTAL_PASSED),
            summary.stats.get(TOTAL_FULL_LENGTH)
        );

        Ok(summary)
    }

    fn work<S: ProfileSink>(
        &self,
        input: &FastaInput,
        sink: &Mutex<&mut S>,
        locals: &ThreadLocal<RefCell<RunSummary>>,
        progress: &Progress,
    ) -> Result<()> {
        let local = locals.get_or(|| RefCell::new(RunSummary::default()));
        let mut local = local.borrow_mut();
        let RunSummary { stats, diagnostics } = &mut *local;

        let mut chunk = Vec::with_capacity(CHUNK_SIZE);

        while input.next_chunk(&mut chunk)? {
            let records = chunk
                .iter()
                .filter_map(|r| self.process(r, stats, diagnostics))
                .collect::<Vec<_>>();
            log::debug!(
                "Chunk ending at read {}: {} of {} accepted",
                chunk.last().map_or(0, |r| r.pos),
                records.len(),
                chunk.len()
            );
            progress.update(chunk.len(), records.len());

            if let Some(writer) = &self.diagnostics_writer {
                writer.maybe_flush(diagnostics)?;
            }

            if !records.is_empty() {
                sink.lock().unwrap().append(records)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FASTA: &str = "\
>r1 accepted
AACCGTTGAACTGAAAGGTTCCTGGGGTTCGAATCCCCATCTCTCCGCCA
>r2 rejected
GAGTACCAAGATCGGAAGAGCACACGTCTAGTTCTACAGTCCGACGATCATCCTTTGG
>r3 full length
AGGCTTGTAGCTCAGGTGGTTAGAGCGCACCCCTGATAAGGGTGAGGTCGGTGGTTCAAGTCCACTCAGGCCTACCA
>r4 trailer
ctccaggttcgagtcctggtagaacaaccaa
>r5 short
GTTCAAAACCA
";

    fn sort(mode: SortMode, fasta: &str, threads: usize) -> (MemoryProfile, RunSummary) {
        let input = FastaInput::from_reader(std::io::Cursor::new(fasta.as_bytes().to_vec())).unwrap();
        let mut profile = MemoryProfile::new();
        let summary = Sorter::new("s", mode)
            .run(&input, &mut profile, threads)
            .unwrap();
        (profile, summary)
    }

    #[test]
    fn test_canonical_run() {
        let (profile, summary) = sort(SortMode::Canonical, FASTA, 1);
        let stats = &summary.stats;

        assert_eq!(stats.get(TOTAL_SEQS), 5);
        assert_eq!(stats.get(TOTAL_PASSED), 3);
        assert_eq!(stats.get(TOTAL_REJECTED), 2);
        assert_eq!(stats.get(BOTH_REJECTED), 1);
        assert_eq!(stats.get(SHORT_REJECTED), 1);
        assert_eq!(stats.get(TOTAL_FULL_LENGTH), 1);
        assert_eq!(stats.get(WITH_TRAILER), 1);
        assert_eq!(stats.get("passed.no_divergence"), 3);
        assert_eq!(stats.get("rejected.t_loop_divergence_at_8"), 1);
        assert_eq!(stats.get("anticodon.type_i_at_9"), 1);
        assert!(summary.diagnostics.is_empty());

        let rows = profile.records();
        assert_eq!(
            rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["s_1", "s_3", "s_4"]
        );
        assert_eq!(rows[1].anticodon.as_deref(), Some("GAT"));
        assert!(rows[1].full_length);
        assert_eq!(rows[2].seq, "CTCCAGGTTCGAGTCCTGGTAGAACAACCA");
        assert_eq!(rows[2].three_trailer.as_deref(), Some("A"));
        assert_eq!(rows[2].t_loop, "GTTCGAGTC");
    }

    #[test]
    fn test_rules_run() {
        let (profile, summary) = sort(SortMode::Rules(FilterRuleSet::default()), FASTA, 1);
        let stats = &summary.stats;

        assert_eq!(stats.get(TOTAL_PASSED), 3);
        assert_eq!(stats.get("rejected_by.min_length"), 1);
        assert_eq!(stats.get("rejected_by.t_loop_and_acceptor"), 1);
        assert_eq!(profile.len(), 3);

        let diagnostics = &summary.diagnostics;
        assert_eq!(diagnostics.entries("min_length"), b"s_5\nGTTCAAAACCA\n");
        assert_eq!(
            diagnostics.rules(),
            vec![
                "min_length",
                "require_acceptor_A_at_-1",
                "require_t_loop_C_at_8",
                "t_loop_and_acceptor"
            ]
        );
        assert_eq!(profile.records()[2].trailer_length, 1);
    }

    #[test]
    fn test_rules_run_writes_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("filtered_sequences");
        let fasta = FASTA.repeat(300);

        let input = FastaInput::from_reader(std::io::Cursor::new(fasta.into_bytes())).unwrap();
        let mut profile = MemoryProfile::new();
        let summary = Sorter::new("s", SortMode::Rules(FilterRuleSet::default()))
            .with_diagnostics_writer(DiagnosticsWriter::new(&out, 1024))
            .run(&input, &mut profile, 2)
            .unwrap();

        assert!(summary.diagnostics.is_empty());
        assert_eq!(summary.stats.get("rejected_by.min_length"), 300);

        let min_length = std::fs::read_to_string(out.join("min_length")).unwrap();
        let mut ids = min_length
            .lines()
            .step_by(2)
            .map(|id| id.trim_start_matches("s_").parse::<usize>().unwrap())
            .collect::<Vec<_>>();
        ids.sort_unstable();
        assert_eq!(ids, (0..300).map(|i| i * 5 + 5).collect::<Vec<_>>());
        assert!(min_length.lines().skip(1).step_by(2).all(|s| s == "GTTCAAAACCA"));

        let t_loop = std::fs::read_to_string(out.join("t_loop_and_acceptor")).unwrap();
        assert_eq!(t_loop.lines().count(), 600);
        assert!(out.join("require_t_loop_C_at_8").is_file());
    }

    #[test]
    fn test_thread_count_does_not_change_summary() {
        let fasta = FASTA.repeat(200);
        let (single, expected) = sort(SortMode::Canonical, &fasta, 1);
        let (multi, summary) = sort(SortMode::Canonical, &fasta, 4);

        assert_eq!(summary.stats, expected.stats);
        assert_eq!(summary.stats.get(TOTAL_SEQS), 1000);

        let mut a = single.into_records();
        let mut b = multi.into_records();
        a.sort_by_key(|r| r.id.clone());
        b.sort_by_key(|r| r.id.clone());
        assert_eq!(a, b);
    }
}
