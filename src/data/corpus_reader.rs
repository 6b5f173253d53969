// ============================================================
// Layer 4 — Corpus Reader
// ============================================================
// Streams grouped rows out of the input CSV one at a time.
// Only the current row is held in memory, and the csv crate
// places no ceiling on field size, so multi-megabyte sentence
// blobs are fine.
//
// Rows come out as CorpusRow values that still hold the raw
// sentence blob. Decoding into a CorpusGroup is a separate
// step so that rows skipped on resume are never parsed.
//
// Reference: csv crate documentation (ReaderBuilder, StringRecord)

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::sentence_parser::decode_children;
use crate::domain::corpus::CorpusGroup;
use crate::domain::error::{Result, StanceError};

/// Column names of the input dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusColumns {
    /// Group identifier; the row index is used when the column is absent.
    pub group:     String,
    pub topic:     String,
    pub sentences: String,
}

impl Default for CorpusColumns {
    fn default() -> Self {
        Self {
            group:     "id".to_string(),
            topic:     "conclusion".to_string(),
            sentences: "sentences".to_string(),
        }
    }
}

/// One undecoded input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRow {
    pub index:         usize,
    pub group_key:     String,
    pub topic:         String,
    pub sentences_raw: String,
}

impl CorpusRow {
    /// Decode the sentence blob into a full group.
    pub fn decode(self) -> Result<CorpusGroup> {
        let children = decode_children(&self.sentences_raw, &self.group_key)?;
        Ok(CorpusGroup {
            index:     self.index,
            group_key: self.group_key,
            topic:     self.topic,
            children,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    group:     Option<usize>,
    topic:     usize,
    sentences: usize,
}

pub struct CorpusReader<R: Read> {
    records:    csv::StringRecordsIntoIter<R>,
    columns:    ColumnIndex,
    next_index: usize,
}

impl CorpusReader<File> {
    pub fn open(path: impl AsRef<Path>, columns: &CorpusColumns) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            StanceError::config(format!("cannot open input '{}': {e}", path.display()))
        })?;
        Self::from_reader(file, columns)
    }

    /// Count data rows with a streaming pass, for progress estimates.
    /// Ragged rows still count; the main pass decides what to do with them.
    pub fn count_rows(path: impl AsRef<Path>) -> Result<usize> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let mut record = csv::ByteRecord::new();
        let mut count  = 0usize;
        while reader.read_byte_record(&mut record)? {
            count += 1;
        }
        Ok(count)
    }
}

impl<R: Read> CorpusReader<R> {
    pub fn from_reader(input: R, columns: &CorpusColumns) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(input);
        let headers = reader.headers()?.clone();

        let find = |name: &str| headers.iter().position(|h| h == name);
        let required = |name: &str| {
            find(name).ok_or_else(|| {
                StanceError::config(format!("input is missing required column '{name}'"))
            })
        };

        let index = ColumnIndex {
            group:     find(&columns.group),
            topic:     required(&columns.topic)?,
            sentences: required(&columns.sentences)?,
        };
        if index.group.is_none() {
            tracing::warn!(
                "Input has no '{}' column, using row index as group key",
                columns.group
            );
        }

        Ok(Self { records: reader.into_records(), columns: index, next_index: 0 })
    }
}

impl<R: Read> Iterator for CorpusReader<R> {
    type Item = Result<CorpusRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        let index  = self.next_index;
        self.next_index += 1;

        let record = match record {
            Ok(r) => r,
            Err(e) if e.is_io_error() => return Some(Err(e.into())),
            Err(e) => return Some(Err(StanceError::corpus(format!("row {index}"), e.to_string()))),
        };

        let group_key = match self.columns.group {
            Some(col) => record.get(col).unwrap_or_default().to_string(),
            None      => index.to_string(),
        };
        let field = |col: usize, name: &str| {
            record
                .get(col)
                .map(str::to_string)
                .ok_or_else(|| StanceError::corpus(&group_key, format!("row {index} has no {name} field")))
        };

        Some(field(self.columns.topic, "topic").and_then(|topic| {
            Ok(CorpusRow {
                index,
                group_key: group_key.clone(),
                topic,
                sentences_raw: field(self.columns.sentences, "sentences")?,
            })
        }))
    }
}
