//! Splitting the 3' trailer off an accepted read and deciding whether the
//! remainder spans a complete tRNA.

use crate::classify::ClassificationRecord;

/// Exclusive length bounds for a full-length tRNA.
pub const FULL_LENGTH_BOUNDS: (usize, usize) = (70, 100);

/// Conserved D-arm positions required for full length.
pub const D_ARM_MARKERS: [(usize, u8); 2] = [(7, b'T'), (13, b'A')];

/// Split `sequence` so that the last `offset` bases become the trailer.
///
/// Returns `(trimmed, trailer)`. An offset larger than the sequence leaves an
/// empty trimmed part.
pub fn split_at_offset(sequence: &[u8], offset: usize) -> (&[u8], &[u8]) {
    sequence.split_at(sequence.len().saturating_sub(offset))
}

/// Trim the accepted window's trailing bases off the record's sequence.
pub fn split_trailer(record: &mut ClassificationRecord, offset: usize) {
    let (trimmed, trailer) = split_at_offset(&record.sequence, offset);
    record.trimmed = trimmed.to_owned();
    record.trailer = trailer.to_owned();
    record.trailer_length = trailer.len();
}

/// Whether a trimmed sequence is long enough and carries the D-arm markers.
pub fn is_full_length(trimmed: &[u8]) -> bool {
    let (min, max) = FULL_LENGTH_BOUNDS;

    trimmed.len() > min
        && trimmed.len() < max
        && D_ARM_MARKERS
            .iter()
            .all(|&(i, b)| trimmed.get(i) == Some(&b))
}

/// Decide and store the full-length flag for a trimmed record.
pub fn full_length(record: &mut ClassificationRecord) -> bool {
    record.full_length = is_full_length(&record.trimmed);
    record.full_length
}
