//! Locating the anticodon arm at fixed distances upstream of the T-loop
//! window and reading the anticodon out of its loop.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::motif::WINDOW_LEN;
use crate::stats::StatsAggregator;

/// Length of the anticodon arm: 5-base stem, 7-base loop, 5-base stem.
pub const ARM_LEN: usize = 17;
pub const STEM_LEN: usize = 5;

const LOOP_START: usize = 5;
const LOOP_LEN: usize = 6;

// read length gates for choosing which offset families to try
const TYPE_I_FULL_LENGTH_MAX: usize = 78;
const TYPE_II_FULL_LENGTH_MIN: usize = 81;
const TYPE_I_TRUNCATED_MIN: usize = 50;
const TYPE_II_TRUNCATED_MIN: usize = 67;

/// Structural class of a tRNA, by variable arm length.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArmType {
    TypeI,
    TypeII,
}

impl ArmType {
    pub fn name(&self) -> &'static str {
        match self {
            ArmType::TypeI => "type_i",
            ArmType::TypeII => "type_ii",
        }
    }
}

impl fmt::Display for ArmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tunables for the arm search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnticodonConfig {
    /// Distances between the arm and the T-loop window tried for Type I reads.
    pub type_i_offsets: Vec<usize>,
    /// Distances tried for Type II reads.
    pub type_ii_offsets: Vec<usize>,
    /// Stem positions allowed to not pair.
    pub max_pair_mismatches: usize,
    /// Bases allowed right before the anticodon (loop position 1).
    pub before_anticodon: String,
    /// Bases allowed right after the anticodon (loop position 5).
    pub after_anticodon: String,
}

impl Default for AnticodonConfig {
    fn default() -> Self {
        Self {
            type_i_offsets: vec![8, 9],
            type_ii_offsets: (16..=26).collect(),
            max_pair_mismatches: 1,
            before_anticodon: "T".to_owned(),
            after_anticodon: "AG".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnticodonHit {
    pub anticodon: String,
    pub offset: usize,
    pub arm_type: ArmType,
}

/// Whether two stem bases pair, allowing G-T wobble pairs.
pub fn pairs_with(a: u8, b: u8) -> bool {
    matches!(
        (a, b),
        (b'G', b'C') | (b'G', b'T') | (b'T', b'A') | (b'T', b'G') | (b'C', b'G') | (b'A', b'T')
    )
}

/// The arm ending `offset` bases upstream of the 3' window.
///
/// Returns `None` when the read is too short to contain it.
pub fn arm_at(sequence: &[u8], offset: usize) -> Option<&[u8]> {
    let end = sequence.len().checked_sub(WINDOW_LEN + offset)?;
    let start = end.checked_sub(ARM_LEN)?;
    Some(&sequence[start..end])
}

#[derive(Clone, Debug, Default)]
pub struct AnticodonExtractor {
    config: AnticodonConfig,
}

impl AnticodonExtractor {
    pub fn new(config: AnticodonConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnticodonConfig {
        &self.config
    }

    /// Count stem positions that fail to pair with their mirror position.
    pub fn pair_mismatches(&self, arm: &[u8]) -> usize {
        (0..STEM_LEN.min(arm.len()))
            .filter(|&k| !pairs_with(arm[k], arm[arm.len() - 1 - k]))
            .count()
    }

    /// Whether the arm's stem pairs within the configured tolerance.
    pub fn pair_check(&self, arm: &[u8]) -> bool {
        arm.len() >= 2 * STEM_LEN && self.pair_mismatches(arm) <= self.config.max_pair_mismatches
    }

    /// Read the anticodon from the arm's loop if the flanking bases allow it.
    pub fn read_anticodon<'a>(&self, arm: &'a [u8]) -> Option<&'a [u8]> {
        let a_loop = arm.get(LOOP_START..LOOP_START + LOOP_LEN)?;

        if self.config.before_anticodon.as_bytes().contains(&a_loop[1])
            && self.config.after_anticodon.as_bytes().contains(&a_loop[5])
        {
            Some(&a_loop[2..5])
        } else {
            None
        }
    }

    /// Offset families to search for a read of this length.
    pub fn families(&self, len: usize, full_length: bool) -> Vec<(ArmType, &[usize])> {
        let mut res = Vec::with_capacity(2);

        let type_i = if full_length {
            len < TYPE_I_FULL_LENGTH_MAX
        } else {
            len > TYPE_I_TRUNCATED_MIN
        };
        let type_ii = if full_length {
            len > TYPE_II_FULL_LENGTH_MIN
        } else {
            len > TYPE_II_TRUNCATED_MIN
        };

        if type_i {
            res.push((ArmType::TypeI, self.config.type_i_offsets.as_slice()));
        }
        if type_ii {
            res.push((ArmType::TypeII, self.config.type_ii_offsets.as_slice()));
        }

        res
    }

    /// Every anticodon found at any candidate offset.
    ///
    /// A read can yield several hits, particularly across the Type II offsets,
    /// since the variable arm length is not known. Offsets that run past the
    /// start of the read are skipped.
    pub fn extract(&self, sequence: &[u8], full_length: bool) -> Vec<AnticodonHit> {
        let mut hits = Vec::new();

        for (arm_type, offsets) in self.families(sequence.len(), full_length) {
            for &offset in offsets {
                let Some(arm) = arm_at(sequence, offset) else {
                    continue;
                };

                if !self.pair_check(arm) {
                    continue;
                }

                if let Some(anticodon) = self.read_anticodon(arm) {
                    hits.push(AnticodonHit {
                        anticodon: String::from_utf8_lossy(anticodon).into_owned(),
                        offset,
                        arm_type,
                    });
                }
            }
        }

        hits
    }

    pub fn anticodons(&self, sequence: &[u8], full_length: bool) -> Vec<String> {
        self.extract(sequence, full_length)
            .into_iter()
            .map(|h| h.anticodon)
            .collect()
    }
}

/// Count where anticodons were found.
pub fn count_hits(stats: &mut StatsAggregator, hits: &[AnticodonHit]) {
    for hit in hits {
        stats.incr(&format!("anticodon.{}", hit.arm_type));
        stats.incr(&format!("anticodon.{}_at_{}", hit.arm_type, hit.offset));
    }
}
