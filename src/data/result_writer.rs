// ============================================================
// Layer 4 — Result Writer
// ============================================================
// Writes classified sentences to the output CSV as they are
// produced. One group's rows go out as a contiguous block and
// the writer is flushed after every block, so an interrupted
// run always ends on a group boundary.
//
// Output header:
//   sent_id,topic_text,predicted_stance,sent_text

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::classification::ClassificationResult;
use crate::domain::corpus::ChildSentence;
use crate::domain::error::{Result, StanceError};

pub const OUTPUT_HEADER: [&str; 4] = ["sent_id", "topic_text", "predicted_stance", "sent_text"];

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    sent_id:          &'a str,
    topic_text:       &'a str,
    predicted_stance: &'a str,
    sent_text:        &'a str,
}

pub struct ResultWriter<W: Write> {
    writer:       csv::Writer<W>,
    rows_written: usize,
}

impl ResultWriter<File> {
    /// Open the output file. In append mode an existing non-empty file
    /// keeps its content and no second header is written.
    pub fn create(path: impl AsRef<Path>, append: bool) -> Result<Self> {
        let path = path.as_ref();
        let resume = append && path.metadata().map(|m| m.len() > 0).unwrap_or(false);

        let file = if resume {
            OpenOptions::new().append(true).open(path)
        } else {
            File::create(path)
        }
        .map_err(|e| StanceError::config(format!("cannot open output '{}': {e}", path.display())))?;

        if resume {
            tracing::info!("Appending to existing output '{}'", path.display());
        }
        Self::from_writer(file, !resume)
    }
}

impl<W: Write> ResultWriter<W> {
    pub fn from_writer(output: W, write_header: bool) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(output);
        if write_header {
            writer.write_record(OUTPUT_HEADER)?;
            writer.flush()?;
        }
        Ok(Self { writer, rows_written: 0 })
    }

    /// Write one group's results. `children` and `results` must line up
    /// one-to-one; a length mismatch writes nothing.
    pub fn write_group(
        &mut self,
        children: &[ChildSentence],
        results:  &[ClassificationResult],
    ) -> Result<usize> {
        if children.len() != results.len() {
            return Err(StanceError::engine(
                0,
                format!("{} results for {} sentences", results.len(), children.len()),
            ));
        }
        for (child, result) in children.iter().zip(results) {
            self.writer.serialize(OutputRow {
                sent_id:          &child.sent_id,
                topic_text:       &result.topic,
                predicted_stance: &result.predicted_label,
                sent_text:        &result.sentence,
            })?;
        }
        self.writer.flush()?;
        self.rows_written += results.len();
        Ok(results.len())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| StanceError::Io(std::io::Error::other(e.to_string())))
    }
}
