//! Sorting sequencing reads into tRNAs.
//!
//! # Overview
//! trnasort decides which reads in a FASTA/FASTQ file come from tRNA molecules, trims the
//! non-genomic 3' trailer off them, and reads off their anticodon.
//!
//! ## Classification
//! A 24 base window is anchored at the 3' end of each read and slid outward one base at a time.
//! Each window is scored by edit distance against the conserved T-loop (`GTTC` at the start plus
//! a `C` at position 8) and the `CCA` acceptor at its end. The first window scoring under 2 is
//! accepted. See [`Classifier`].
//!
//! Here's an accepted read, with the accepted window marked:
//! ```text
//! AACCGTTGAACTGAAAGGTTCCTGGGGTTCGAATCCCCATCTCTCCGCCA
//!                           |----------------------|
//!                           GTTCGAATC           CCA
//! ```
//!
//! Rejected reads are counted by why they were rejected (too short, T-loop, acceptor, or both)
//! and where their best window first diverged from the motifs.
//!
//! ## Post-processing
//! Bases past the accepted window form the 3' trailer and are cut off (see [`split_trailer`]).
//! The trimmed read is full length if it is 71 to 99 bases long and has the conserved D-arm bases.
//! The anticodon arm is then looked for at fixed distances upstream of the window (see
//! [`AnticodonExtractor`]).
//!
//! ## Rules
//! Instead of the fixed thresholds, reads can be run through a configurable [`FilterRuleSet`],
//! usually loaded from YAML. Reads failing a rule are kept as per-rule [`Diagnostics`].
//!
//! ## Running
//! A [`Sorter`] drives the whole thing over a [`FastaInput`], writing a [`ProfileRecord`] per tRNA
//! to a [`ProfileSink`] and returning the [`StatsAggregator`] counters for the run.

pub mod errors;

mod anticodon;
mod classify;
mod diagnostics;
mod input;
mod motif;
mod profile;
mod rules;
mod sorter;
mod stats;
mod trailer;

mod parse_utils;

// commonly used functions and types

pub use crate::anticodon::*;
pub use crate::classify::*;
pub use crate::diagnostics::*;
pub use crate::input::*;
pub use crate::motif::*;
pub use crate::parse_utils::*;
pub use crate::profile::*;
pub use crate::rules::*;
pub use crate::sorter::*;
pub use crate::stats::*;
pub use crate::trailer::*;
