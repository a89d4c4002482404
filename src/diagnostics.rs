//! Reads rejected by each rule.
//!
//! Each worker collects rejected reads in a [`Diagnostics`] buffer. With a
//! [`DiagnosticsWriter`] attached to the run, a buffer is appended to the
//! per-rule files whenever it grows past a byte threshold, and once more at
//! the end. Without one, everything stays in memory for the caller.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rustc_hash::FxHashMap;

use crate::errors::*;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: FxHashMap<String, Vec<u8>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read under a rule name as `{id}\n{sequence}\n`.
    pub fn record(&mut self, rule: &str, id: &str, sequence: &[u8]) {
        let buf = self.entries.entry(rule.to_owned()).or_default();
        buf.extend_from_slice(id.as_bytes());
        buf.push(b'\n');
        buf.extend_from_slice(sequence);
        buf.push(b'\n');
    }

    /// Everything recorded under a rule name.
    pub fn entries(&self, rule: &str) -> &[u8] {
        self.entries.get(rule).map(|b| b.as_slice()).unwrap_or(&[])
    }

    pub fn rules(&self) -> Vec<&str> {
        let mut res = self.entries.keys().map(|k| k.as_str()).collect::<Vec<_>>();
        res.sort_unstable();
        res
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes buffered across all rules.
    pub fn size(&self) -> usize {
        self.entries.values().map(|b| b.len()).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn merge(&mut self, other: Diagnostics) {
        for (rule, buf) in other.entries {
            self.entries.entry(rule).or_default().extend_from_slice(&buf);
        }
    }

    /// Append each rule's reads to a file named after the rule in `dir`.
    ///
    /// Files are opened in append mode so repeated runs accumulate.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        self.append_to_dir(dir)?;

        log::info!(
            "Wrote diagnostics for {} rules to \"{}\"",
            self.entries.len(),
            dir.display()
        );

        Ok(())
    }

    fn append_to_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| Error::FileIo {
            file: dir.display().to_string(),
            source: Box::new(e),
        })?;

        for rule in self.rules() {
            let path = dir.join(rule);
            let file_err = |e: std::io::Error| Error::FileIo {
                file: path.display().to_string(),
                source: Box::new(e),
            };

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(file_err)?;
            file.write_all(self.entries(rule)).map_err(file_err)?;
        }

        Ok(())
    }
}

/// Buffer size at which a worker's diagnostics are written out.
pub const DIAGNOSTICS_FLUSH_BYTES: usize = 1 << 20;

/// Shared writer for the per-rule diagnostic files of one run.
///
/// Workers flush their own [`Diagnostics`] through it; the lock keeps
/// concurrent flushes from interleaving inside a file.
pub struct DiagnosticsWriter {
    dir: PathBuf,
    flush_bytes: usize,
    written: Mutex<usize>,
}

impl DiagnosticsWriter {
    pub fn new(dir: impl Into<PathBuf>, flush_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            flush_bytes,
            written: Mutex::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Total bytes written so far.
    pub fn written(&self) -> usize {
        *self.written.lock().unwrap()
    }

    /// Flush `diagnostics` if it has reached the threshold.
    pub fn maybe_flush(&self, diagnostics: &mut Diagnostics) -> Result<()> {
        if diagnostics.size() >= self.flush_bytes {
            self.flush(diagnostics)?;
        }
        Ok(())
    }

    /// Append everything in `diagnostics` to the rule files and clear it.
    pub fn flush(&self, diagnostics: &mut Diagnostics) -> Result<()> {
        if diagnostics.is_empty() {
            return Ok(());
        }

        let size = diagnostics.size();
        let mut written = self.written.lock().unwrap();
        diagnostics.append_to_dir(&self.dir)?;
        *written += size;

        log::debug!(
            "Flushed {size} bytes of diagnostics to \"{}\" ({} total)",
            self.dir.display(),
            *written
        );

        diagnostics.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_merge() {
        let mut a = Diagnostics::new();
        a.record("min_length", "s_1", b"ACGT");

        let mut b = Diagnostics::new();
        b.record("min_length", "s_5", b"GG");
        b.record("require_t_loop_G_at_0", "s_5", b"GG");

        a.merge(b);

        assert_eq!(a.entries("min_length"), b"s_1\nACGT\ns_5\nGG\n");
        assert_eq!(a.rules(), vec!["min_length", "require_t_loop_G_at_0"]);
        assert!(a.entries("max_length").is_empty());
    }

    #[test]
    fn test_write_to_dir_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut diagnostics = Diagnostics::new();
        diagnostics.record("max_length", "s_2", b"ACGT");

        diagnostics.write_to_dir(dir.path()).unwrap();
        diagnostics.write_to_dir(dir.path()).unwrap();

        let written = std::fs::read_to_string(dir.path().join("max_length")).unwrap();
        assert_eq!(written, "s_2\nACGT\ns_2\nACGT\n");
    }

    #[test]
    fn test_writer_flushes_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("filtered_sequences");
        // "s_1\nACGT\n" is 9 bytes
        let writer = DiagnosticsWriter::new(&out, 18);

        let mut diagnostics = Diagnostics::new();
        diagnostics.record("min_length", "s_1", b"ACGT");
        assert_eq!(diagnostics.size(), 9);
        writer.maybe_flush(&mut diagnostics).unwrap();
        assert_eq!(writer.written(), 0);
        assert!(!out.exists());

        diagnostics.record("max_length", "s_2", b"ACGT");
        writer.maybe_flush(&mut diagnostics).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(writer.written(), 18);

        diagnostics.record("min_length", "s_3", b"GG");
        writer.flush(&mut diagnostics).unwrap();
        writer.flush(&mut diagnostics).unwrap();

        let min_length = std::fs::read_to_string(out.join("min_length")).unwrap();
        assert_eq!(min_length, "s_1\nACGT\ns_3\nGG\n");
        let max_length = std::fs::read_to_string(out.join("max_length")).unwrap();
        assert_eq!(max_length, "s_2\nACGT\n");
        assert_eq!(writer.written(), 25);
    }
}
