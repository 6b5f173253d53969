// ============================================================
// Layer 2 — Corpus Run (Streaming Corpus Driver)
// ============================================================
// Drives a whole corpus through the classifier, one group at
// a time, without ever holding more than one group in memory:
//
//   Init:     open reader + writer, header, progress, resume offset
//   PerGroup: read row
//             ├─ index < resume offset → skip (not even decoded)
//             ├─ decode children       → CorpusParse on bad data
//             ├─ classify_batch        → one result per child
//             ├─ write row block + flush
//             └─ checkpoint, progress line every N groups
//   Done:     flush, summary
//
// Stop requests (Ctrl-C) are honoured between groups only, so
// the output always ends on a complete group block.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::application::classifier::{ClassifierConfig, StanceClassifier};
use crate::data::{
    corpus_reader::{CorpusColumns, CorpusReader},
    result_writer::ResultWriter,
};
use crate::domain::classification::ClassificationResult;
use crate::domain::corpus::CorpusGroup;
use crate::domain::error::{Result, StanceError};
use crate::domain::traits::{StanceScorer, SubwordTokenizer};
use crate::infra::{checkpoint::RunCheckpoint, progress::ProgressState};

/// What to do with a group whose row or sentence list is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    #[default]
    Abort,
    Skip,
}

// ─── Run Configuration ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub input:          PathBuf,
    pub output:         PathBuf,
    pub classifier:     ClassifierConfig,
    /// Rows to skip before processing. None defers to the checkpoint.
    pub resume_offset:  Option<usize>,
    pub total_groups:   Option<usize>,
    /// Count input rows up front when no total is given.
    pub count_groups:   bool,
    pub progress_every: usize,
    pub on_malformed:   MalformedPolicy,
    pub checkpoint:     Option<PathBuf>,
    pub columns:        CorpusColumns,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input:          PathBuf::from("args_processed.csv"),
            output:         PathBuf::from("args_with_bert_stance.csv"),
            classifier:     ClassifierConfig::default(),
            resume_offset:  None,
            total_groups:   None,
            count_groups:   false,
            progress_every: 1000,
            on_malformed:   MalformedPolicy::Abort,
            checkpoint:     None,
            columns:        CorpusColumns::default(),
        }
    }
}

impl RunConfig {
    /// Check everything that can be checked before the model is loaded.
    pub fn validate(&self) -> Result<()> {
        self.classifier.validate()?;
        if self.progress_every == 0 {
            return Err(StanceError::config("progress interval must be a positive integer"));
        }
        if !self.input.is_file() {
            return Err(StanceError::config(format!(
                "input file '{}' does not exist",
                self.input.display()
            )));
        }
        if self.input == self.output {
            return Err(StanceError::config("input and output must be different files"));
        }
        Ok(())
    }

    /// Explicit offset first, then the checkpoint, then zero.
    pub fn effective_resume_offset(&self) -> Result<usize> {
        if let Some(offset) = self.resume_offset {
            return Ok(offset);
        }
        let Some(path) = &self.checkpoint else { return Ok(0) };
        match RunCheckpoint::new(path).load()? {
            Some(state) => {
                let input = self.input.display().to_string();
                if state.input != input {
                    tracing::warn!(
                        "Checkpoint '{}' was written for '{}', now reading '{}'",
                        path.display(), state.input, input
                    );
                }
                tracing::info!("Resuming from checkpoint at group {}", state.groups_processed);
                Ok(state.groups_processed)
            }
            None => Ok(0),
        }
    }
}

// ─── Run Summary ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub groups_read:      usize,
    pub groups_skipped:   usize,
    pub groups_processed: usize,
    pub groups_malformed: usize,
    pub rows_written:     usize,
    /// True when a stop request ended the run before the input did.
    pub stopped_early:    bool,
    /// Offset to pass on the next run to continue after this one.
    pub next_offset:      usize,
    pub elapsed:          Duration,
}

/// Shared flag set from the Ctrl-C handler.
pub type StopFlag = Arc<AtomicBool>;

// ─── CorpusRun ───────────────────────────────────────────────────────────────
pub struct CorpusRun<'c, T, S> {
    classifier: &'c StanceClassifier<T, S>,
    config:     RunConfig,
    stop:       StopFlag,
}

impl<'c, T: SubwordTokenizer, S: StanceScorer> CorpusRun<'c, T, S> {
    pub fn new(classifier: &'c StanceClassifier<T, S>, config: RunConfig) -> Self {
        Self { classifier, config, stop: Arc::new(AtomicBool::new(false)) }
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Run over the configured files. Handles are released on every exit path.
    pub fn execute(&self) -> Result<RunSummary> {
        let cfg = &self.config;
        let offset = cfg.effective_resume_offset()?;

        let total = match cfg.total_groups {
            Some(t) => Some(t),
            None if cfg.count_groups => {
                tracing::info!("Counting groups in '{}'", cfg.input.display());
                Some(CorpusReader::count_rows(&cfg.input)?)
            }
            None => None,
        };

        let reader = CorpusReader::open(&cfg.input, &cfg.columns)?;
        let mut writer = ResultWriter::create(&cfg.output, offset > 0)?;
        let checkpoint = cfg.checkpoint.as_deref().map(RunCheckpoint::new);

        tracing::info!(
            "Classifying '{}' → '{}' (resume offset {}, {} groups expected)",
            cfg.input.display(),
            cfg.output.display(),
            offset,
            total.map_or("unknown".to_string(), |t| t.to_string()),
        );

        self.process(reader, &mut writer, offset, total, checkpoint.as_ref(), &cfg.input)
    }

    /// The per-group loop over any reader/writer pair.
    pub fn process<R: std::io::Read, W: std::io::Write>(
        &self,
        reader:     CorpusReader<R>,
        writer:     &mut ResultWriter<W>,
        offset:     usize,
        total:      Option<usize>,
        checkpoint: Option<&RunCheckpoint>,
        input:      &Path,
    ) -> Result<RunSummary> {
        let mut progress      = ProgressState::start(total);
        let mut malformed     = 0usize;
        let mut groups_read   = 0usize;
        let mut stopped_early = false;

        for row in reader {
            if self.stop.load(Ordering::SeqCst) {
                stopped_early = true;
                tracing::warn!("Stop requested, finishing at group boundary {}", progress.position());
                break;
            }
            groups_read += 1;

            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_corpus_parse() && progress.position() < offset => {
                    progress.record_skipped();
                    continue;
                }
                Err(e) => {
                    self.on_bad_group(e, progress.position(), &mut malformed)?;
                    progress.record_processed();
                    continue;
                }
            };

            if row.index < offset {
                progress.record_skipped();
                continue;
            }

            let (index, key) = (row.index, row.group_key.clone());
            let group = match row.decode() {
                Ok(group) => group,
                Err(e) => {
                    self.on_bad_group(e, index, &mut malformed)?;
                    progress.record_processed();
                    continue;
                }
            };

            tracing::debug!("topic: {}", group.topic);
            let results = self.classify_group(&group).map_err(|e| fail(index, &key, e))?;
            writer
                .write_group(&group.children, &results)
                .map_err(|e| fail(index, &key, e))?;
            progress.record_processed();

            if let Some(ckpt) = checkpoint {
                ckpt.save(progress.position(), input)?;
            }
            if group.index % self.config.progress_every == 0 {
                tracing::info!(
                    "\n{}\n--------------------------------------------",
                    progress.report(group.index, &group.topic)
                );
            }
        }

        let summary = RunSummary {
            groups_read,
            groups_skipped:   progress.groups_skipped,
            groups_processed: progress.groups_processed - malformed,
            groups_malformed: malformed,
            rows_written:     writer.rows_written(),
            stopped_early,
            next_offset:      progress.position(),
            elapsed:          progress.elapsed(),
        };
        tracing::info!(
            "Run finished: {} groups processed, {} skipped, {} malformed, {} rows written in {:?}{}",
            summary.groups_processed,
            summary.groups_skipped,
            summary.groups_malformed,
            summary.rows_written,
            summary.elapsed,
            if stopped_early {
                format!(" (stopped early, resume with offset {})", summary.next_offset)
            } else {
                String::new()
            },
        );
        Ok(summary)
    }

    /// Classify one group's children; encoding errors name the sentence.
    pub fn classify_group(&self, group: &CorpusGroup) -> Result<Vec<ClassificationResult>> {
        self.classifier.classify_batch(&group.inputs()).map_err(|e| {
            let sentence_id = match &e {
                StanceError::Encoding { index, .. } => group.children.get(*index).map(|c| c.sent_id.clone()),
                _ => None,
            };
            match sentence_id {
                Some(id) => e.with_sentence(&id, &group.group_key),
                None => e,
            }
        })
    }

    fn on_bad_group(&self, err: StanceError, index: usize, malformed: &mut usize) -> Result<()> {
        if err.is_corpus_parse() && self.config.on_malformed == MalformedPolicy::Skip {
            tracing::warn!("Skipping malformed group at index {}: {}", index, err);
            *malformed += 1;
            return Ok(());
        }
        let key = match &err {
            StanceError::CorpusParse { group_key, .. } => group_key.clone(),
            _ => format!("row {index}"),
        };
        Err(fail(index, &key, err))
    }
}

/// Wrap a fatal error with the group position and the current time.
fn fail(group_index: usize, group_key: &str, source: StanceError) -> StanceError {
    let at_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    tracing::error!(
        "Group '{}' (index {}) failed at unix time {}: {}",
        group_key, group_index, at_unix, source
    );
    StanceError::GroupFailed {
        group_index,
        group_key: group_key.to_string(),
        at_unix,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::classifier::tests::{keyword_classifier, KeywordScorer};
    use crate::data::encoder::tests::StubTokenizer;
    use std::fs;

    const ZOO_CORPUS: &str = "id,conclusion,sentences\n\
        g0,zoos,\"[{'sent_id': 's1', 'sent_text': 'Zoos save species.'}, {'sent_id': 's2', 'sent_text': 'Zoos harm animals.'}]\"\n";

    fn corpus(groups: usize) -> String {
        let mut csv = String::from("id,conclusion,sentences\n");
        for g in 0..groups {
            let children: Vec<String> = (0..(g % 4))
                .map(|c| {
                    let verb = ["save", "harm", "feed"][(g + c) % 3];
                    format!("{{'sent_id': 'g{g}s{c}', 'sent_text': 'They {verb} it {g}.'}}")
                })
                .collect();
            csv.push_str(&format!("g{g},topic {g},\"[{}]\"\n", children.join(", ")));
        }
        csv
    }

    fn run_on(
        classifier: &StanceClassifier<StubTokenizer, KeywordScorer>,
        csv: &str,
        config: RunConfig,
        offset: usize,
    ) -> (Result<RunSummary>, String) {
        let run = CorpusRun::new(classifier, config);
        let reader = CorpusReader::from_reader(csv.as_bytes(), &CorpusColumns::default()).unwrap();
        let mut writer = ResultWriter::from_writer(Vec::new(), true).unwrap();
        let summary = run.process(reader, &mut writer, offset, None, None, Path::new("mem"));
        (summary, String::from_utf8(writer.into_inner().unwrap()).unwrap())
    }

    #[test]
    fn test_zoo_example_rows() {
        let classifier = keyword_classifier(8);
        let (summary, out) = run_on(&classifier, ZOO_CORPUS, RunConfig::default(), 0);
        let summary = summary.unwrap();
        assert_eq!(summary.rows_written, 2);
        assert_eq!(
            out,
            "sent_id,topic_text,predicted_stance,sent_text\n\
             s1,zoos,Argument_for,Zoos save species.\n\
             s2,zoos,Argument_against,Zoos harm animals.\n"
        );
    }

    #[test]
    fn test_empty_group_writes_nothing_but_counts() {
        let classifier = keyword_classifier(8);
        let csv = "id,conclusion,sentences\ne,empty,[]\n";
        let (summary, out) = run_on(&classifier, csv, RunConfig::default(), 0);
        let summary = summary.unwrap();
        assert_eq!(summary.groups_processed, 1);
        assert_eq!(summary.rows_written, 0);
        assert_eq!(summary.next_offset, 1);
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn test_resume_offset_matches_uninterrupted_suffix() {
        let classifier = keyword_classifier(3);
        let csv = corpus(12);
        let (_, full) = run_on(&classifier, &csv, RunConfig::default(), 0);
        let (summary, resumed) = run_on(&classifier, &csv, RunConfig::default(), 5);
        let summary = summary.unwrap();
        assert_eq!(summary.groups_skipped, 5);
        assert_eq!(summary.groups_processed, 7);

        // rows of groups 0..5, in order
        let (_, head) = run_on(&classifier, &corpus(5), RunConfig::default(), 0);
        let head_rows: Vec<&str> = head.lines().skip(1).collect();
        let resumed_rows: Vec<&str> = resumed.lines().skip(1).collect();
        let combined: Vec<&str> = head_rows.into_iter().chain(resumed_rows).collect();
        assert_eq!(combined, full.lines().skip(1).collect::<Vec<_>>());
    }

    #[test]
    fn test_skipped_groups_are_not_decoded() {
        let classifier = keyword_classifier(3);
        let csv = "id,conclusion,sentences\nbad,t,not a list\ng1,zoos,[]\n";
        let (summary, _) = run_on(&classifier, csv, RunConfig::default(), 1);
        assert_eq!(summary.unwrap().groups_skipped, 1);
    }

    /// Serves `data`, then fails every read.
    struct BrokenDisk {
        data: &'static [u8],
        pos:  usize,
    }

    impl std::io::Read for BrokenDisk {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.data.len() {
                return Err(std::io::Error::other("disk gone"));
            }
            let n = buf.len().min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_read_failure_inside_resume_window_is_fatal() {
        let classifier = keyword_classifier(3);
        let disk = BrokenDisk { data: b"id,conclusion,sentences\ng0,t,[]\n", pos: 0 };
        let reader = CorpusReader::from_reader(disk, &CorpusColumns::default()).unwrap();
        let mut writer = ResultWriter::from_writer(Vec::new(), true).unwrap();
        let err = CorpusRun::new(&classifier, RunConfig::default())
            .process(reader, &mut writer, 5, None, None, Path::new("mem"))
            .unwrap_err();
        match err {
            StanceError::GroupFailed { group_index, source, .. } => {
                assert_eq!(group_index, 1);
                assert!(matches!(*source, StanceError::Csv(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_group_aborts_by_default() {
        let classifier = keyword_classifier(3);
        let csv = format!("{}bad,t,\"[{{'sent_id': 'x'}}]\"\n", corpus(2));
        let (summary, out) = run_on(&classifier, &csv, RunConfig::default(), 0);
        match summary.unwrap_err() {
            StanceError::GroupFailed { group_index, group_key, source, .. } => {
                assert_eq!(group_index, 2);
                assert_eq!(group_key, "bad");
                assert!(source.is_corpus_parse());
            }
            other => panic!("unexpected error: {other}"),
        }
        // group 1 has one child and was written before the failure
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn test_malformed_group_skipped_when_configured() {
        let classifier = keyword_classifier(3);
        let csv = format!("id,conclusion,sentences\nbad,t,oops\n{}", &corpus(3)["id,conclusion,sentences\n".len()..]);
        let config = RunConfig { on_malformed: MalformedPolicy::Skip, ..RunConfig::default() };
        let (summary, _) = run_on(&classifier, &csv, config, 0);
        let summary = summary.unwrap();
        assert_eq!(summary.groups_malformed, 1);
        assert_eq!(summary.groups_processed, 3);
        assert_eq!(summary.next_offset, 4);
    }

    #[test]
    fn test_counted_total_tolerates_ragged_rows_when_skipping() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        fs::write(
            &input,
            "id,conclusion,sentences\ng1,zoos\ng2,cars,\"[{'sent_id': 'c1', 'sent_text': 'Cars harm cities.'}]\"\n",
        )
        .unwrap();
        let config = RunConfig {
            input,
            output:       dir.path().join("out.csv"),
            count_groups: true,
            on_malformed: MalformedPolicy::Skip,
            ..RunConfig::default()
        };
        let classifier = keyword_classifier(2);
        let summary = CorpusRun::new(&classifier, config).execute().unwrap();
        assert_eq!(summary.groups_malformed, 1);
        assert_eq!(summary.groups_processed, 1);
        assert_eq!(summary.rows_written, 1);
    }

    #[test]
    fn test_encoding_failure_names_sentence_and_group() {
        let classifier = keyword_classifier(3);
        let csv = "id,conclusion,sentences\ng9,zoos,\"[{'sent_id': 'ok', 'sent_text': 'fine'}, {'sent_id': 'blank', 'sent_text': ' '}]\"\n";
        let (summary, out) = run_on(&classifier, csv, RunConfig::default(), 0);
        let msg = summary.unwrap_err().to_string();
        assert!(msg.contains("'blank'"), "{msg}");
        assert!(msg.contains("'g9'"), "{msg}");
        assert_eq!(out.lines().count(), 1, "no partial group may be written");
    }

    #[test]
    fn test_stop_flag_then_checkpoint_resume_equals_single_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let head_input = dir.path().join("head.csv");
        let model_dir = dir.path().join("model");
        fs::create_dir(&model_dir).unwrap();
        let csv = corpus(9);
        fs::write(&input, &csv).unwrap();
        // header + first four groups, standing in for a run killed after group 3
        fs::write(&head_input, csv.lines().take(5).collect::<Vec<_>>().join("\n") + "\n").unwrap();

        let config = |input: &Path, output: &str, checkpoint: Option<&str>| RunConfig {
            input:      input.to_path_buf(),
            output:     dir.path().join(output),
            classifier: ClassifierConfig { model_dir: model_dir.clone(), ..Default::default() },
            checkpoint: checkpoint.map(|c| dir.path().join(c)),
            ..RunConfig::default()
        };
        let classifier = keyword_classifier(2);

        CorpusRun::new(&classifier, config(&input, "single.csv", None)).execute().unwrap();

        let stopped = CorpusRun::new(&classifier, config(&input, "resumed.csv", Some("ckpt.json")))
            .with_stop_flag(Arc::new(AtomicBool::new(true)))
            .execute()
            .unwrap();
        assert!(stopped.stopped_early);
        assert_eq!(stopped.groups_read, 0);
        assert_eq!(stopped.next_offset, 0);

        let head = CorpusRun::new(&classifier, config(&head_input, "resumed.csv", Some("ckpt.json")))
            .execute()
            .unwrap();
        assert_eq!(head.next_offset, 4);

        // no explicit offset: picked up from the checkpoint, output appended
        let rest = CorpusRun::new(&classifier, config(&input, "resumed.csv", Some("ckpt.json")))
            .execute()
            .unwrap();
        assert_eq!(rest.groups_skipped, 4);
        assert_eq!(rest.next_offset, 9);

        assert_eq!(
            fs::read_to_string(dir.path().join("resumed.csv")).unwrap(),
            fs::read_to_string(dir.path().join("single.csv")).unwrap()
        );
    }

    #[test]
    fn test_config_validation() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        fs::write(&input, ZOO_CORPUS).unwrap();
        let base = RunConfig {
            input:      input.clone(),
            output:     dir.path().join("out.csv"),
            classifier: ClassifierConfig { model_dir: dir.path().to_path_buf(), ..Default::default() },
            ..RunConfig::default()
        };
        assert!(base.validate().is_ok());
        assert!(RunConfig { progress_every: 0, ..base.clone() }.validate().is_err());
        assert!(RunConfig { output: input, ..base.clone() }.validate().is_err());
        assert!(RunConfig { input: dir.path().join("nope.csv"), ..base }.validate().is_err());
    }
}
