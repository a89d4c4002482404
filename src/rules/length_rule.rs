use crate::anticodon::AnticodonExtractor;
use crate::rules::*;

pub const MIN_LENGTH: &str = "min_length";
pub const MAX_LENGTH: &str = "max_length";

pub struct MinLengthRule {
    min: usize,
}

impl MinLengthRule {
    const NAME: &'static str = MIN_LENGTH;

    /// Reject reads that are not strictly longer than `min`.
    pub fn new(min: usize) -> Self {
        Self { min }
    }
}

impl SeqFilter for MinLengthRule {
    fn check(&self, candidate: &mut Candidate, _extractor: &AnticodonExtractor) -> Verdict {
        if candidate.sequence.len() > self.min {
            Verdict::Pass
        } else {
            Verdict::fail()
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

pub struct MaxLengthRule {
    max: usize,
}

impl MaxLengthRule {
    const NAME: &'static str = MAX_LENGTH;

    /// Reject reads that are not strictly shorter than `max`.
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl SeqFilter for MaxLengthRule {
    fn check(&self, candidate: &mut Candidate, _extractor: &AnticodonExtractor) -> Verdict {
        if candidate.sequence.len() < self.max {
            Verdict::Pass
        } else {
            Verdict::fail()
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
    fn test_length_bounds_are_exclusive() {
        let extractor = AnticodonExtractor::default();
        let min = MinLengthRule::new(24);
        let max = MaxLengthRule::new(200);

        let seq = vec![b'A'; 24];
        assert_eq!(min.check(&mut Candidate::new(&seq), &extractor), Verdict::fail());
        let seq = vec![b'A'; 25];
        assert_eq!(min.check(&mut Candidate::new(&seq), &extractor), Verdict::Pass);

        let seq = vec![b'A'; 199];
        assert_eq!(max.check(&mut Candidate::new(&seq), &extractor), Verdict::Pass);
        let seq = vec![b'A'; 200];
        assert_eq!(max.check(&mut Candidate::new(&seq), &extractor), Verdict::fail());
    }
}
