//! Edit-distance scoring of a 3'-anchored window against the T-loop and
//! acceptor motifs.

/// Width of the window anchored at the 3' end of a read.
pub const WINDOW_LEN: usize = 24;

/// Length of the T-loop region at the start of a window.
pub const T_LOOP_LEN: usize = 9;

pub const T_LOOP_HEAD: &[u8] = b"GTTC";
pub const T_LOOP_TAIL: &[u8] = b"C";
pub const ACCEPTOR: &[u8] = b"CCA";

const T_LOOP_TAIL_POS: usize = 8;

/// Positions checked, in order, when attributing a T-loop divergence.
pub const T_LOOP_POSITIONS: [(usize, u8); 5] =
    [(0, b'G'), (1, b'T'), (2, b'T'), (3, b'C'), (8, b'C')];

/// Positions checked, in order, when attributing an acceptor divergence.
/// Offsets are relative to the end of the window.
pub const ACCEPTOR_POSITIONS: [(isize, u8); 3] = [(-3, b'C'), (-2, b'C'), (-1, b'A')];

/// Levenshtein distance with unit costs.
///
/// The motifs are at most four bases long, so a single rolling row is enough.
pub fn edit_distance(a: &[u8], b: &[u8]) -> usize {
    if a.is_empty() {
        return b.len();
    }

    if b.is_empty() {
        return a.len();
    }

    let mut row = (0..=b.len()).collect::<Vec<_>>();

    for (i, &ca) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;

        for (j, &cb) in b.iter().enumerate() {
            let up = row[j + 1];
            row[j + 1] = if ca == cb {
                diag
            } else {
                1 + diag.min(up).min(row[j])
            };
            diag = up;
        }
    }

    row[b.len()]
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MotifScore {
    pub t_loop: usize,
    pub acceptor: usize,
}

impl MotifScore {
    pub fn total(&self) -> usize {
        self.t_loop + self.acceptor
    }

    pub fn t_loop_error(&self) -> bool {
        self.t_loop >= 1
    }

    pub fn acceptor_error(&self) -> bool {
        self.acceptor >= 1
    }
}

/// Scores a window against the conserved motifs.
///
/// Implemented as a trait so the sliding-window scan can be driven by
/// alternative scorers.
pub trait WindowScorer {
    fn score(&self, window: &[u8]) -> MotifScore;
}

/// Scorer for the canonical `GTTC...C` T-loop and `CCA` acceptor.
#[derive(Copy, Clone, Debug, Default)]
pub struct MotifScorer;

impl WindowScorer for MotifScorer {
    fn score(&self, window: &[u8]) -> MotifScore {
        score_window(window)
    }
}

/// Score a window of at least 12 bases (T-loop head and tail plus acceptor).
///
/// Windows shorter than that score as if the missing bases were deletions.
pub fn score_window(window: &[u8]) -> MotifScore {
    let head = &window[..window.len().min(T_LOOP_HEAD.len())];
    let tail = window
        .get(T_LOOP_TAIL_POS..T_LOOP_TAIL_POS + 1)
        .unwrap_or(&[]);
    let acceptor = &window[window.len().saturating_sub(ACCEPTOR.len())..];

    MotifScore {
        t_loop: edit_distance(T_LOOP_HEAD, head) + edit_distance(T_LOOP_TAIL, tail),
        acceptor: edit_distance(ACCEPTOR, acceptor),
    }
}

/// Where the retained window first departs from the canonical motifs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Divergence {
    None,
    TLoop(Option<usize>),
    Acceptor(Option<isize>),
}

impl Divergence {
    /// Attribute a window's score to a single divergence.
    ///
    /// A T-loop error takes precedence over an acceptor error, and within a
    /// motif the first differing position wins.
    pub fn of(window: &[u8], t_loop_error: bool, acceptor_error: bool) -> Self {
        if t_loop_error {
            let pos = T_LOOP_POSITIONS
                .iter()
                .find(|&&(i, b)| window.get(i) != Some(&b))
                .map(|&(i, _)| i);
            Divergence::TLoop(pos)
        } else if acceptor_error {
            let pos = ACCEPTOR_POSITIONS
                .iter()
                .find(|&&(i, b)| {
                    let idx = window.len() as isize + i;
                    idx < 0 || window.get(idx as usize) != Some(&b)
                })
                .map(|&(i, _)| i);
            Divergence::Acceptor(pos)
        } else {
            Divergence::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance(b"GTTC", b"GTTC"), 0);
        assert_eq!(edit_distance(b"GTTC", b"GATC"), 1);
        assert_eq!(edit_distance(b"GTTC", b"TTCA"), 2);
        assert_eq!(edit_distance(b"CCA", b""), 3);
        assert_eq!(edit_distance(b"", b"C"), 1);
        assert_eq!(edit_distance(b"CCA", b"ACC"), 2);
        assert_eq!(edit_distance(b"kitten", b"sitting"), 3);
    }

    #[test]
    fn test_exact_motifs_score_zero() {
        let window = [&b"GTTCAAAAC"[..], b"XXXXXXXXXXXXXXX", b"CCA"].concat();
        let score = score_window(&window);

        assert_eq!(score.total(), 0);
        assert!(!score.t_loop_error());
        assert!(!score.acceptor_error());
    }

    #[test]
    fn test_score_components() {
        let window = b"GATCAAAAGAAAAAAAAAAAACCG";
        let score = MotifScorer.score(window);

        assert_eq!(score.t_loop, 2);
        assert_eq!(score.acceptor, 1);
        assert_eq!(score.total(), 3);
    }

    fn divergence(window: &[u8]) -> Divergence {
        let score = score_window(window);
        Divergence::of(window, score.t_loop_error(), score.acceptor_error())
    }

    #[test]
    fn test_divergence_precedence() {
        assert_eq!(
            divergence(b"GTACAAAACAAAAAAAAAAAACTA"),
            Divergence::TLoop(Some(2))
        );
        assert_eq!(
            divergence(b"GTTCAAAACAAAAAAAAAAAACTA"),
            Divergence::Acceptor(Some(-2))
        );
        assert_eq!(
            divergence(b"GTTCAAAAGAAAAAAAAAAAACCA"),
            Divergence::TLoop(Some(8))
        );
        assert_eq!(divergence(b"GTTCAAAACAAAAAAAAAAAACCA"), Divergence::None);
    }
}
