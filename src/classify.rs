//! Sliding-window classification of reads as tRNA.
//!
//! The window is anchored at the 3' end and moves outward one base at a time.
//! The first window scoring under [`ACCEPT_THRESHOLD`] is accepted; ties on
//! the best score keep the window closest to the 3' terminus.

use std::fmt;

use crate::motif::*;
use crate::stats::*;

/// A window must score strictly below this to be accepted.
pub const ACCEPT_THRESHOLD: usize = 2;

/// Larger than any score a window can reach.
pub const SCORE_SENTINEL: usize = usize::MAX;

/// Why a read was not accepted by the canonical classifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Shorter than one window.
    Short,
    Both,
    TLoop,
    Acceptor,
}

impl Rejection {
    pub fn name(&self) -> &'static str {
        use Rejection::*;
        match self {
            Short => "short",
            Both => "both-rejected",
            TLoop => "t-loop-rejected",
            Acceptor => "acceptor-rejected",
        }
    }

    pub fn stats_key(&self) -> &'static str {
        use Rejection::*;
        match self {
            Short => SHORT_REJECTED,
            Both => BOTH_REJECTED,
            TLoop => T_LOOP_REJECTED,
            Acceptor => ACCEPTOR_REJECTED,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything learned about one read during a classify-extract cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassificationRecord {
    pub sequence: Vec<u8>,
    pub best_window: Vec<u8>,
    pub best_offset: Option<usize>,
    pub best_score: usize,
    pub t_loop_error: bool,
    pub acceptor_error: bool,
    pub rejection: Option<Rejection>,
    pub full_length: bool,
    pub trimmed: Vec<u8>,
    pub trailer: Vec<u8>,
    pub trailer_length: usize,
    pub anticodons: Vec<String>,
}

impl ClassificationRecord {
    pub fn new(sequence: &[u8]) -> Self {
        Self {
            sequence: sequence.to_owned(),
            best_window: Vec::new(),
            best_offset: None,
            best_score: SCORE_SENTINEL,
            t_loop_error: true,
            acceptor_error: true,
            rejection: None,
            full_length: false,
            trimmed: Vec::new(),
            trailer: Vec::new(),
            trailer_length: 0,
            anticodons: Vec::new(),
        }
    }

    /// Adopt a window as the best seen so far.
    pub fn set_best(&mut self, window: &[u8], offset: usize, score: MotifScore) {
        self.best_window = window.to_owned();
        self.best_offset = Some(offset);
        self.best_score = score.total();
        self.t_loop_error = score.t_loop_error();
        self.acceptor_error = score.acceptor_error();
    }

    /// The 9-base T-loop at the start of the best window.
    pub fn t_loop(&self) -> &[u8] {
        &self.best_window[..self.best_window.len().min(T_LOOP_LEN)]
    }

    /// The 3-base acceptor end of the best window.
    pub fn acceptor(&self) -> &[u8] {
        &self.best_window[self.best_window.len().saturating_sub(ACCEPTOR.len())..]
    }

    pub fn divergence(&self) -> Divergence {
        Divergence::of(&self.best_window, self.t_loop_error, self.acceptor_error)
    }
}

/// Window at `offset` bases from the 3' end, if the read is long enough.
pub fn window_at(sequence: &[u8], offset: usize) -> Option<&[u8]> {
    let end = sequence.len().checked_sub(offset)?;
    let start = end.checked_sub(WINDOW_LEN)?;
    Some(&sequence[start..end])
}

/// Number of window offsets in a read (zero when it is shorter than a window).
pub fn num_windows(len: usize) -> usize {
    (len + 1).saturating_sub(WINDOW_LEN)
}

pub struct Classifier<S: WindowScorer = MotifScorer> {
    scorer: S,
}

impl Classifier<MotifScorer> {
    pub fn new() -> Self {
        Self {
            scorer: MotifScorer,
        }
    }
}

impl Default for Classifier<MotifScorer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: WindowScorer> Classifier<S> {
    pub fn with_scorer(scorer: S) -> Self {
        Self { scorer }
    }

    /// Slide the window outward from the 3' end.
    ///
    /// Returns the offset of the accepted window, or `None` if no window met
    /// the threshold. The record always holds the best window examined.
    pub fn scan(&self, sequence: &[u8]) -> (Option<usize>, ClassificationRecord) {
        let mut record = ClassificationRecord::new(sequence);

        for i in 0..num_windows(sequence.len()) {
            let start = sequence.len() - WINDOW_LEN - i;
            let window = &sequence[start..start + WINDOW_LEN];
            let score = self.scorer.score(window);

            if score.total() < record.best_score {
                record.set_best(window, i, score);
            }

            if score.total() < ACCEPT_THRESHOLD {
                return (Some(i), record);
            }
        }

        (None, record)
    }

    /// Classify a read and count the outcome.
    ///
    /// On acceptance `record.best_offset` is the number of trailing bases past
    /// the acceptor end.
    pub fn classify(
        &self,
        sequence: &[u8],
        stats: &mut StatsAggregator,
    ) -> (bool, ClassificationRecord) {
        let (accepted, mut record) = self.scan(sequence);

        if accepted.is_some() {
            stats.incr(TOTAL_PASSED);
            stats.record_divergence(PASSED_STAGE, record.divergence());
            return (true, record);
        }

        let rejection = match (record.t_loop_error, record.acceptor_error) {
            (true, true) if sequence.len() < WINDOW_LEN => Rejection::Short,
            (true, true) => Rejection::Both,
            (false, true) => Rejection::Acceptor,
            (true, false) => Rejection::TLoop,
            (false, false) => unreachable!("a window without motif errors is always accepted"),
        };

        stats.incr(TOTAL_REJECTED);
        stats.incr(rejection.stats_key());
        if rejection != Rejection::Short {
            stats.record_divergence(REJECTED_STAGE, record.divergence());
        }
        record.rejection = Some(rejection);

        (false, record)
    }
}
