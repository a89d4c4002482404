//! Rule-driven classification.
//!
//! A [`FilterRuleSet`] is plain configuration, usually loaded from YAML. It is
//! compiled once into a [`RuleChain`], an ordered list of [`SeqFilter`]s that
//! every read is run through. The first rule a read fails names its rejection.
//!
//! Rules run in a fixed order:
//! * `min_length`: the read is strictly longer than the minimum
//! * `max_length`: the read is strictly shorter than the maximum
//! * `t_loop_and_acceptor`: some 3'-anchored window misses at most
//!   `max_missed` of the positional base requirements
//! * `anticodon_known`: an anticodon can be read from the trimmed read
//! * `arm_spacing`: an anticodon was found at an offset inside the configured bounds
//!
//! Here's the default rule set written as YAML:
//! ```yaml
//! min_length: 24
//! max_length: 200
//! t_loop_and_acceptor:
//!   max_missed: 1
//!   require:
//!     - { pos: 0, base: G }
//!     - { pos: 1, base: T }
//!     - { pos: 2, base: T }
//!     - { pos: 3, base: C }
//!     - { pos: 8, base: C }
//!     - { pos: -3, base: C }
//!     - { pos: -2, base: C }
//!     - { pos: -1, base: A }
//! anticodon_known: false
//! arm_spacing: ~
//! ```
//! Any field left out keeps its default, and `~` disables an optional rule.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::anticodon::*;
use crate::diagnostics::*;
use crate::errors::*;
use crate::stats::*;
use crate::trailer::split_at_offset;

mod length_rule;
pub use length_rule::*;

mod motif_rule;
pub use motif_rule::*;

mod anticodon_rule;
pub use anticodon_rule::*;

mod spacing_rule;
pub use spacing_rule::*;

/// A base required at a window position. Negative positions count from the
/// 3' end of the window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionRequirement {
    pub pos: isize,
    pub base: char,
}

impl PositionRequirement {
    pub fn new(pos: isize, base: char) -> Self {
        Self { pos, base }
    }

    /// Whether `window` has the required base. Positions outside the window
    /// never match.
    pub fn is_met(&self, window: &[u8]) -> bool {
        let idx = if self.pos < 0 {
            window.len() as isize + self.pos
        } else {
            self.pos
        };

        idx >= 0 && window.get(idx as usize).map(|&b| b as char) == Some(self.base)
    }

    /// Diagnostic name for reads whose best window misses this requirement.
    pub fn rule_name(&self) -> String {
        let motif = if self.pos < 0 { "acceptor" } else { "t_loop" };
        format!("require_{motif}_{}_at_{}", self.base, self.pos)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotifRequirements {
    pub require: Vec<PositionRequirement>,
    pub max_missed: usize,
}

impl Default for MotifRequirements {
    fn default() -> Self {
        let require = [
            (0, 'G'),
            (1, 'T'),
            (2, 'T'),
            (3, 'C'),
            (8, 'C'),
            (-3, 'C'),
            (-2, 'C'),
            (-1, 'A'),
        ]
        .into_iter()
        .map(|(pos, base)| PositionRequirement::new(pos, base))
        .collect();

        Self {
            require,
            max_missed: 1,
        }
    }
}

/// Inclusive bounds on the distance between the anticodon arm and the 3'
/// window, per arm type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArmSpacing {
    pub type_i: (usize, usize),
    pub type_ii: (usize, usize),
}

impl Default for ArmSpacing {
    fn default() -> Self {
        Self {
            type_i: (8, 9),
            type_ii: (16, 26),
        }
    }
}

impl ArmSpacing {
    pub fn contains(&self, hit: &AnticodonHit) -> bool {
        let (min, max) = match hit.arm_type {
            ArmType::TypeI => self.type_i,
            ArmType::TypeII => self.type_ii,
        };
        (min..=max).contains(&hit.offset)
    }
}

/// Which rules are active and how they are parameterized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterRuleSet {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub t_loop_and_acceptor: Option<MotifRequirements>,
    pub anticodon: AnticodonConfig,
    pub anticodon_known: bool,
    pub arm_spacing: Option<ArmSpacing>,
}

impl Default for FilterRuleSet {
    fn default() -> Self {
        Self {
            min_length: Some(24),
            max_length: Some(200),
            t_loop_and_acceptor: Some(MotifRequirements::default()),
            anticodon: AnticodonConfig::default(),
            anticodon_known: false,
            arm_spacing: None,
        }
    }
}

impl FilterRuleSet {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::InvalidRules { source: e })
    }

    pub fn from_file(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        let yaml = std::fs::read_to_string(file).map_err(|e| Error::FileIo {
            file: file.display().to_string(),
            source: Box::new(e),
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::InvalidRules { source: e })
    }

    pub fn with_min_length(mut self, min_length: Option<usize>) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn with_max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_motif_requirements(mut self, requirements: Option<MotifRequirements>) -> Self {
        self.t_loop_and_acceptor = requirements;
        self
    }

    pub fn with_anticodon(mut self, anticodon: AnticodonConfig) -> Self {
        self.anticodon = anticodon;
        self
    }

    pub fn with_anticodon_known(mut self, anticodon_known: bool) -> Self {
        self.anticodon_known = anticodon_known;
        self
    }

    pub fn with_arm_spacing(mut self, arm_spacing: Option<ArmSpacing>) -> Self {
        self.arm_spacing = arm_spacing;
        self
    }

    /// Compile the active rules into a chain, in evaluation order.
    pub fn build(&self) -> RuleChain {
        let mut filters: Vec<Box<dyn SeqFilter>> = Vec::new();

        if let Some(min) = self.min_length {
            filters.push(Box::new(MinLengthRule::new(min)));
        }
        if let Some(max) = self.max_length {
            filters.push(Box::new(MaxLengthRule::new(max)));
        }
        if let Some(requirements) = &self.t_loop_and_acceptor {
            filters.push(Box::new(MotifRule::new(requirements.clone())));
        }
        if self.anticodon_known {
            filters.push(Box::new(AnticodonKnownRule::new()));
        }
        if let Some(spacing) = self.arm_spacing {
            filters.push(Box::new(ArmSpacingRule::new(spacing)));
        }

        RuleChain {
            filters,
            extractor: AnticodonExtractor::new(self.anticodon.clone()),
        }
    }
}

/// A read as seen by the rules, with facts filled in as rules discover them.
pub struct Candidate<'a> {
    pub sequence: &'a [u8],
    /// Offset of the window that satisfied the motif rule.
    pub window_offset: Option<usize>,
    hits: Option<Vec<AnticodonHit>>,
}

impl<'a> Candidate<'a> {
    pub fn new(sequence: &'a [u8]) -> Self {
        Self {
            sequence,
            window_offset: None,
            hits: None,
        }
    }

    /// The read with the bases past the accepted window removed.
    pub fn trimmed(&self) -> &'a [u8] {
        split_at_offset(self.sequence, self.window_offset.unwrap_or(0)).0
    }

    /// Anticodons found in the trimmed read, extracted at most once.
    pub fn anticodon_hits(&mut self, extractor: &AnticodonExtractor) -> &[AnticodonHit] {
        if self.hits.is_none() {
            let trimmed = self.trimmed();
            let full_length = crate::trailer::is_full_length(trimmed);
            self.hits = Some(extractor.extract(trimmed, full_length));
        }
        self.hits.as_deref().unwrap_or(&[])
    }

    pub fn into_hits(self) -> Option<Vec<AnticodonHit>> {
        self.hits
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Failed, with extra diagnostic names to record the read under.
    Fail(Vec<String>),
}

impl Verdict {
    pub fn fail() -> Self {
        Verdict::Fail(Vec::new())
    }
}

/// One rule in a [`RuleChain`].
pub trait SeqFilter: Send + Sync {
    fn check(&self, candidate: &mut Candidate, extractor: &AnticodonExtractor) -> Verdict;

    fn name(&self) -> &'static str;
}

/// Result of running a read through a [`RuleChain`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleOutcome {
    /// The first rule the read failed, if any.
    pub rejected_by: Option<&'static str>,
    pub window_offset: Option<usize>,
    /// Anticodon hits, if any rule needed them.
    pub hits: Option<Vec<AnticodonHit>>,
}

impl RuleOutcome {
    pub fn passed(&self) -> bool {
        self.rejected_by.is_none()
    }
}

pub struct RuleChain {
    filters: Vec<Box<dyn SeqFilter>>,
    extractor: AnticodonExtractor,
}

impl RuleChain {
    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn extractor(&self) -> &AnticodonExtractor {
        &self.extractor
    }

    /// Run a read through every rule until one fails.
    ///
    /// Rejections are counted under `rejected_by.{rule}` and the read is
    /// recorded in the diagnostics under the rule's name.
    pub fn evaluate(
        &self,
        id: &str,
        sequence: &[u8],
        stats: &mut StatsAggregator,
        diagnostics: &mut Diagnostics,
    ) -> RuleOutcome {
        let mut candidate = Candidate::new(sequence);
        let mut rejected_by = None;

        for filter in &self.filters {
            if let Verdict::Fail(extra) = filter.check(&mut candidate, &self.extractor) {
                stats.incr(&format!("{REJECTED_BY_PREFIX}{}", filter.name()));
                diagnostics.record(filter.name(), id, sequence);
                for name in &extra {
                    diagnostics.record(name, id, sequence);
                }
                rejected_by = Some(filter.name());
                break;
            }
        }

        if rejected_by.is_some() {
            stats.incr(TOTAL_REJECTED);
        } else {
            stats.incr(TOTAL_PASSED);
        }

        RuleOutcome {
            rejected_by,
            window_offset: candidate.window_offset,
            hits: candidate.into_hits(),
        }
    }
}
