use crate::anticodon::AnticodonExtractor;
use crate::classify::{num_windows, window_at};
use crate::rules::*;

pub const T_LOOP_AND_ACCEPTOR: &str = "t_loop_and_acceptor";

pub struct MotifRule {
    requirements: MotifRequirements,
}

impl MotifRule {
    const NAME: &'static str = T_LOOP_AND_ACCEPTOR;

    /// Require a 3'-anchored window that misses at most `max_missed` of the
    /// positional base requirements.
    pub fn new(requirements: MotifRequirements) -> Self {
        Self { requirements }
    }

    fn missed<'a>(&'a self, window: &'a [u8]) -> impl Iterator<Item = &'a PositionRequirement> {
        self.requirements
            .require
            .iter()
            .filter(move |r| !r.is_met(window))
    }

    /// Scan outward from the 3' end. Returns the offset of the first window
    /// within tolerance, or the requirements missed by the best window.
    pub fn scan(&self, sequence: &[u8]) -> std::result::Result<usize, Vec<PositionRequirement>> {
        let mut best: Option<Vec<PositionRequirement>> = None;

        for i in 0..num_windows(sequence.len()) {
            let Some(window) = window_at(sequence, i) else {
                break;
            };
            let missed = self.missed(window).copied().collect::<Vec<_>>();

            if missed.len() <= self.requirements.max_missed {
                return Ok(i);
            }

            if best.as_ref().map_or(true, |b| missed.len() < b.len()) {
                best = Some(missed);
            }
        }

        Err(best.unwrap_or_default())
    }
}

impl SeqFilter for MotifRule {
    fn check(&self, candidate: &mut Candidate, _extractor: &AnticodonExtractor) -> Verdict {
        match self.scan(candidate.sequence) {
            Ok(offset) => {
                candidate.window_offset = Some(offset);
                Verdict::Pass
            }
            Err(missed) => Verdict::Fail(missed.iter().map(|r| r.rule_name()).collect()),
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
