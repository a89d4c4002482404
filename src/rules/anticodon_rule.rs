use crate::anticodon::AnticodonExtractor;
use crate::rules::*;

pub const ANTICODON_KNOWN: &str = "anticodon_known";

pub struct AnticodonKnownRule;

impl AnticodonKnownRule {
    const NAME: &'static str = ANTICODON_KNOWN;

    /// Reject reads where no anticodon can be read from the trimmed sequence.
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnticodonKnownRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SeqFilter for AnticodonKnownRule {
    fn check(&self, candidate: &mut Candidate, extractor: &AnticodonExtractor) -> Verdict {
        if candidate.anticodon_hits(extractor).is_empty() {
            Verdict::fail()
        } else {
            Verdict::Pass
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anticodon_read_from_trimmed_sequence() {
        let extractor = AnticodonExtractor::default();
        let rule = AnticodonKnownRule::new();
        let trna = b"AGGCTTGTAGCTCAGGTGGTTAGAGCGCACCCCTGATAAGGGTGAGGTCGGTGGTTCAAGTCCACTCAGGCCTACCA";

        let mut candidate = Candidate::new(trna);
        assert_eq!(rule.check(&mut candidate, &extractor), Verdict::Pass);

        // the same read with a two base trailer is only found once the trailer is cut
        let with_trailer = [&trna[..], b"GG"].concat();
        let mut candidate = Candidate::new(&with_trailer);
        assert_eq!(rule.check(&mut candidate, &extractor), Verdict::fail());

        let mut candidate = Candidate::new(&with_trailer);
        candidate.window_offset = Some(2);
        assert_eq!(rule.check(&mut candidate, &extractor), Verdict::Pass);
        assert_eq!(candidate.into_hits().unwrap()[0].anticodon, "GAT");
    }
}
