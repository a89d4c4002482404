use needletail::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::errors::*;

/// Records pulled from the reader per lock.
pub const CHUNK_SIZE: usize = 256;

/// One input record, with its 1-based position in the input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeqRecord {
    pub pos: usize,
    pub name: Vec<u8>,
    pub seq: Vec<u8>,
}

/// Shared FASTA/FASTQ reader that hands out chunks of records to workers.
pub struct FastaInput<'reader> {
    reader: Mutex<Box<dyn FastxReader + 'reader>>,
    origin: String,
    idx: AtomicUsize,
}

impl<'reader> FastaInput<'reader> {
    /// Stream records from a FASTA or FASTQ file, gzip compressed or not.
    pub fn from_file(file: impl AsRef<str>) -> Result<Self> {
        let reader = Mutex::new(parse_fastx_file(file.as_ref()).map_err(|e| Error::FileIo {
            file: file.as_ref().to_owned(),
            source: Box::new(e),
        })?);

        Ok(Self {
            reader,
            origin: format!("file: \"{}\"", file.as_ref()),
            idx: AtomicUsize::new(0),
        })
    }

    /// Stream records from an arbitrary `Read`er.
    pub fn from_reader(reader: impl std::io::Read + Send + 'reader) -> Result<Self> {
        let reader =
            Mutex::new(parse_fastx_reader(reader).map_err(|e| Error::BytesIo(Box::new(e)))?);

        Ok(Self {
            reader,
            origin: "bytes".to_owned(),
            idx: AtomicUsize::new(0),
        })
    }

    /// Number of records handed out so far.
    pub fn records_read(&self) -> usize {
        self.idx.load(Ordering::Relaxed)
    }

    /// Read up to [`CHUNK_SIZE`] records into `buf`, replacing its contents.
    ///
    /// Names are cut at the first whitespace and sequences are uppercased.
    /// Returns `false` once the input is exhausted and nothing was read.
    pub fn next_chunk(&self, buf: &mut Vec<SeqRecord>) -> Result<bool> {
        buf.clear();
        let mut reader = self.reader.lock().unwrap();

        for _ in 0..CHUNK_SIZE {
            let Some(record) = reader.next() else {
                break;
            };
            // positions are handed out under the lock so they follow input order
            let idx = self.idx.fetch_add(1, Ordering::Relaxed);
            let record = record.map_err(|e| Error::ParseRecord {
                origin: self.origin.clone(),
                idx,
                source: Box::new(e),
            })?;

            let id = record.id();
            let name = match memchr::memchr2(b' ', b'\t', id) {
                Some(end) => &id[..end],
                None => id,
            };

            buf.push(SeqRecord {
                pos: idx + 1,
                name: name.to_owned(),
                seq: record.seq().to_ascii_uppercase(),
            });
        }

        Ok(!buf.is_empty())
    }
}
