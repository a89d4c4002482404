//! The per-read profile table and where it gets stored.

use std::fs::File;
use std::io::{BufWriter, Write};

use flate2::{write::GzEncoder, Compression};
use memchr::memmem;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::classify::ClassificationRecord;
use crate::errors::*;

/// Column names of the profile table, in order.
pub const PROFILE_COLUMNS: [&str; 9] = [
    "ID",
    "Seq",
    "Three_trailer",
    "T_loop",
    "Acceptor",
    "Full_length",
    "Seq_length",
    "Trailer_length",
    "Anticodon",
];

/// One row of the profile table, for an accepted read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Seq")]
    pub seq: String,
    #[serde(rename = "Three_trailer")]
    pub three_trailer: Option<String>,
    #[serde(rename = "T_loop")]
    pub t_loop: String,
    #[serde(rename = "Acceptor")]
    pub acceptor: String,
    #[serde(
        rename = "Full_length",
        serialize_with = "serialize_flag",
        deserialize_with = "deserialize_flag"
    )]
    pub full_length: bool,
    #[serde(rename = "Seq_length")]
    pub seq_length: usize,
    #[serde(rename = "Trailer_length")]
    pub trailer_length: usize,
    #[serde(rename = "Anticodon")]
    pub anticodon: Option<String>,
}

fn serialize_flag<S: Serializer>(flag: &bool, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(if *flag { "True" } else { "False" })
}

fn deserialize_flag<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    let s = String::deserialize(d)?;
    match s.as_str() {
        "True" => Ok(true),
        "False" => Ok(false),
        _ => Err(serde::de::Error::custom(format!(
            "expected \"True\" or \"False\", found \"{s}\""
        ))),
    }
}

impl ProfileRecord {
    /// Build a row from a read that was accepted and post-processed.
    pub fn from_classification(id: impl Into<String>, record: &ClassificationRecord) -> Self {
        let text = |b: &[u8]| String::from_utf8_lossy(b).into_owned();

        Self {
            id: id.into(),
            seq: text(&record.trimmed),
            three_trailer: (!record.trailer.is_empty()).then(|| text(&record.trailer)),
            t_loop: text(record.t_loop()),
            acceptor: text(record.acceptor()),
            full_length: record.full_length,
            seq_length: record.trimmed.len(),
            trailer_length: record.trailer_length,
            anticodon: (!record.anticodons.is_empty()).then(|| record.anticodons.join(",")),
        }
    }

    pub fn anticodons(&self) -> impl Iterator<Item = &str> {
        self.anticodon.iter().flat_map(|a| a.split(','))
    }
}

/// Somewhere to put profile rows as they are produced.
pub trait ProfileSink {
    fn append(&mut self, records: Vec<ProfileRecord>) -> Result<()>;

    /// Flush anything still buffered. No rows may be appended afterwards.
    fn finish(&mut self) -> Result<()>;
}

/// Profile rows kept in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryProfile {
    records: Vec<ProfileRecord>,
}

impl MemoryProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ProfileRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [ProfileRecord] {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<ProfileRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ProfileSink for MemoryProfile {
    fn append(&mut self, mut records: Vec<ProfileRecord>) -> Result<()> {
        self.records.append(&mut records);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Tab-separated profile table, written in batches.
pub struct TsvProfileWriter {
    name: String,
    writer: Option<csv::Writer<Box<dyn Write + Send>>>,
    batch: Vec<ProfileRecord>,
    batch_size: usize,
    written: usize,
}

impl TsvProfileWriter {
    /// Write the table to a file, gzip compressed if the path ends with `.gz`.
    pub fn from_file(file: impl AsRef<str>, batch_size: usize) -> Result<Self> {
        let file = file.as_ref();
        let f = File::create(file).map_err(|e| Error::FileIo {
            file: file.to_owned(),
            source: Box::new(e),
        })?;

        let writer: Box<dyn Write + Send> = if file.ends_with(".gz") {
            Box::new(BufWriter::new(GzEncoder::new(f, Compression::default())))
        } else {
            Box::new(BufWriter::new(f))
        };

        Self::new(file, writer, batch_size)
    }

    /// Write the table to an arbitrary `Write`r.
    pub fn from_writer(writer: impl Write + Send + 'static, batch_size: usize) -> Result<Self> {
        Self::new("<writer>", Box::new(writer), batch_size)
    }

    fn new(name: &str, writer: Box<dyn Write + Send>, batch_size: usize) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(writer);
        writer.write_record(PROFILE_COLUMNS)?;

        Ok(Self {
            name: name.to_owned(),
            writer: Some(writer),
            batch: Vec::with_capacity(batch_size.min(1 << 16)),
            batch_size: batch_size.max(1),
            written: 0,
        })
    }

    /// Rows written out so far, excluding anything still batched.
    pub fn written(&self) -> usize {
        self.written
    }

    fn flush_batch(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(Error::config(format!(
                "profile table \"{}\" was already finished",
                self.name
            )));
        };

        let n = self.batch.len();
        log::info!("Writing {n} items in the buffer to \"{}\"", self.name);

        for record in self.batch.drain(..) {
            writer.serialize(record)?;
        }
        writer.flush().map_err(|e| Error::FileIo {
            file: self.name.clone(),
            source: Box::new(e),
        })?;
        self.written += n;

        Ok(())
    }
}

impl ProfileSink for TsvProfileWriter {
    fn append(&mut self, records: Vec<ProfileRecord>) -> Result<()> {
        for record in records {
            self.batch.push(record);

            if self.batch.len() >= self.batch_size {
                self.flush_batch()?;
            }
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_batch()?;

        if let Some(writer) = self.writer.take() {
            let mut inner = writer.into_inner().map_err(|e| Error::FileIo {
                file: self.name.clone(),
                source: Box::new(e.into_error()),
            })?;
            inner.flush().map_err(|e| Error::FileIo {
                file: self.name.clone(),
                source: Box::new(e),
            })?;
        }

        Ok(())
    }
}

/// Give reads without an anticodon the anticodon of an assigned read that
/// contains them.
///
/// The first containing read in table order wins. Returns the number of
/// reads that were assigned this way.
pub fn assign_by_subsequence(records: &mut [ProfileRecord]) -> usize {
    let assigned = records
        .iter()
        .filter_map(|r| Some((r.seq.clone(), r.anticodon.clone()?)))
        .collect::<Vec<_>>();

    let mut matched = 0;

    for record in records.iter_mut().filter(|r| r.anticodon.is_none()) {
        let finder = memmem::Finder::new(record.seq.as_bytes());

        if let Some((_, anticodon)) = assigned
            .iter()
            .find(|(seq, _)| finder.find(seq.as_bytes()).is_some())
        {
            record.anticodon = Some(anticodon.clone());
            matched += 1;
        }
    }

    matched
}

/// Which profile rows count towards an anticodon profile.
///
/// Only rows without a trailer and with a known anticodon are ever counted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileQuery {
    pub only_full_length: bool,
    /// Inclusive.
    pub min_length: Option<usize>,
    /// Inclusive.
    pub max_length: Option<usize>,
    /// Keep rows whose anticodon column is exactly one of these.
    pub anticodons: Option<Vec<String>>,
}

impl ProfileQuery {
    pub fn matches(&self, record: &ProfileRecord) -> bool {
        let Some(anticodon) = &record.anticodon else {
            return false;
        };

        record.three_trailer.is_none()
            && (!self.only_full_length || record.full_length)
            && self.min_length.map_or(true, |min| record.seq_length >= min)
            && self.max_length.map_or(true, |max| record.seq_length <= max)
            && self
                .anticodons
                .as_ref()
                .map_or(true, |list| list.iter().any(|a| a == anticodon))
    }
}

/// Number of profile rows per anticodon.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnticodonProfile {
    counts: FxHashMap<String, u64>,
}

impl AnticodonProfile {
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a ProfileRecord>,
        query: &ProfileQuery,
    ) -> Self {
        let mut counts = FxHashMap::default();

        for record in records.into_iter().filter(|r| query.matches(r)) {
            for anticodon in record.anticodons() {
                *counts.entry(anticodon.to_owned()).or_insert(0) += 1;
            }
        }

        Self { counts }
    }

    pub fn get(&self, anticodon: &str) -> u64 {
        self.counts.get(anticodon).copied().unwrap_or(0)
    }

    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut res = self
            .counts
            .iter()
            .map(|(k, &v)| (k.as_str(), v))
            .collect::<Vec<_>>();
        res.sort_unstable();
        res
    }

    pub fn write_tsv(&self, writer: impl Write) -> Result<()> {
        let mut w = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(writer);

        w.write_record(["anticodon", "count"])?;
        for (k, v) in self.sorted() {
            w.write_record([k, v.to_string().as_str()])?;
        }
        w.flush().map_err(|e| Error::BytesIo(Box::new(e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn row(id: &str, seq: &str, anticodon: Option<&str>) -> ProfileRecord {
        ProfileRecord {
            id: id.to_owned(),
            seq: seq.to_owned(),
            three_trailer: None,
            t_loop: "GTTCAAATC".to_owned(),
            acceptor: "CCA".to_owned(),
            full_length: false,
            seq_length: seq.len(),
            trailer_length: 0,
            anticodon: anticodon.map(|a| a.to_owned()),
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_from_classification() {
        let mut record = ClassificationRecord::new(b"CTCCAGGTTCGAGTCCTGGTAGAACAACCAA");
        let window = crate::classify::window_at(&record.sequence, 1).unwrap().to_owned();
        record.set_best(&window, 1, crate::motif::score_window(&window));
        crate::trailer::split_trailer(&mut record, 1);

        let row = ProfileRecord::from_classification("s_1", &record);

        assert_eq!(row.seq, "CTCCAGGTTCGAGTCCTGGTAGAACAACCA");
        assert_eq!(row.three_trailer.as_deref(), Some("A"));
        assert_eq!(row.t_loop, "GTTCGAGTC");
        assert_eq!(row.acceptor, "CCA");
        assert_eq!(row.seq_length, 30);
        assert_eq!(row.trailer_length, 1);
        assert_eq!(row.anticodon, None);
    }

    #[test]
    fn test_tsv_writer() {
        let buf = SharedBuf::default();
        let mut writer = TsvProfileWriter::from_writer(buf.clone(), 2).unwrap();

        let mut first = row("s_1", "ACGT", Some("ACA,TAC"));
        first.full_length = true;
        writer
            .append(vec![first, row("s_2", "CCGT", None), row("s_4", "GG", None)])
            .unwrap();
        // a full batch was flushed, the last row is still buffered
        assert_eq!(buf.0.lock().unwrap().iter().filter(|&&b| b == b'\n').count(), 3);

        writer.finish().unwrap();
        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines = written.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], PROFILE_COLUMNS.join("\t"));
        assert_eq!(lines[1], "s_1\tACGT\t\tGTTCAAATC\tCCA\tTrue\t4\t0\tACA,TAC");
        assert_eq!(lines[2], "s_2\tCCGT\t\tGTTCAAATC\tCCA\tFalse\t4\t0\t");

        assert!(writer.append(vec![row("s_5", "A", None)]).is_ok());
        assert!(writer.finish().is_err());
    }

    #[test]
    fn test_tsv_round_trip_through_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.tsv.gz");
        let path = path.to_str().unwrap();

        let mut rows = vec![row("s_1", "ACGT", Some("GAT")), row("s_2", "CGT", None)];
        rows[1].three_trailer = Some("AA".to_owned());
        rows[1].trailer_length = 2;

        let mut writer = TsvProfileWriter::from_file(path, 10).unwrap();
        writer.append(rows.clone()).unwrap();
        writer.finish().unwrap();
        drop(writer);

        let decoder = flate2::read::GzDecoder::new(File::open(path).unwrap());
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(decoder);
        let read = reader
            .deserialize()
            .collect::<std::result::Result<Vec<ProfileRecord>, _>>()
            .unwrap();

        assert_eq!(read, rows);
    }

    #[test]
    fn test_assign_by_subsequence() {
        let mut rows = vec![
            row("s_1", "GGCCTTA", None),
            row("s_2", "AAGGCCTTAA", Some("GAT")),
            row("s_3", "AAGGCCTTAAT", Some("TTG")),
            row("s_4", "CCCC", None),
            row("s_5", "TTAA", None),
        ];

        assert_eq!(assign_by_subsequence(&mut rows), 2);
        assert_eq!(rows[0].anticodon.as_deref(), Some("GAT"));
        assert_eq!(rows[3].anticodon, None);
        assert_eq!(rows[4].anticodon.as_deref(), Some("GAT"));
    }

    #[test]
    fn test_anticodon_profile() {
        let mut rows = vec![
            row("s_1", "ACGTACGT", Some("GAT")),
            row("s_2", "ACGTACGTAC", Some("GAT")),
            row("s_3", "ACGTAC", Some("ACA,TAC")),
            row("s_4", "ACGTACGT", None),
            row("s_5", "ACGTACGT", Some("TTG")),
        ];
        rows[1].full_length = true;
        rows[4].three_trailer = Some("A".to_owned());

        let profile = AnticodonProfile::from_records(&rows, &ProfileQuery::default());
        assert_eq!(profile.sorted(), vec![("ACA", 1), ("GAT", 2), ("TAC", 1)]);

        let query = ProfileQuery {
            only_full_length: true,
            ..Default::default()
        };
        assert_eq!(AnticodonProfile::from_records(&rows, &query).sorted(), vec![("GAT", 1)]);

        let query = ProfileQuery {
            min_length: Some(6),
            max_length: Some(8),
            anticodons: Some(vec!["GAT".to_owned(), "ACA".to_owned()]),
            ..Default::default()
        };
        let profile = AnticodonProfile::from_records(&rows, &query);
        assert_eq!(profile.get("GAT"), 1);
        assert_eq!(profile.get("ACA"), 0);

        let mut buf = Vec::new();
        profile.write_tsv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "anticodon\tcount\nGAT\t1\n");
    }
}
