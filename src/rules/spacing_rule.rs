use crate::anticodon::AnticodonExtractor;
use crate::rules::*;

pub const ARM_SPACING: &str = "arm_spacing";

pub struct ArmSpacingRule {
    spacing: ArmSpacing,
}

impl ArmSpacingRule {
    const NAME: &'static str = ARM_SPACING;

    /// Reject reads without an anticodon arm at an allowed distance from the
    /// T-loop window.
    pub fn new(spacing: ArmSpacing) -> Self {
        Self { spacing }
    }
}

impl SeqFilter for ArmSpacingRule {
    fn check(&self, candidate: &mut Candidate, extractor: &AnticodonExtractor) -> Verdict {
        if candidate
            .anticodon_hits(extractor)
            .iter()
            .any(|h| self.spacing.contains(h))
        {
            Verdict::Pass
        } else {
            Verdict::fail()
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
