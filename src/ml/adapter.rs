// ============================================================
// Layer 5 — Classification Engine Adapter
// ============================================================
// Sits between the orchestrator and whatever StanceScorer was
// built: stacks one batch of FeatureRecords, calls the scorer
// exactly once, checks the score matrix has one row of the
// right width per record, and maps each row to a label by
// argmax (lowest index wins a tie).
//
// The adapter never mutates the scorer; it only holds it.

use crate::domain::classification::LabelSet;
use crate::domain::error::{Result, StanceError};
use crate::domain::features::{FeatureBatch, FeatureRecord};
use crate::domain::traits::StanceScorer;

pub struct EngineAdapter<S> {
    scorer: S,
    labels: LabelSet,
}

impl<S: StanceScorer> EngineAdapter<S> {
    /// Pair a scorer with its label vocabulary. The scorer's output
    /// width must equal the number of labels.
    pub fn new(scorer: S, labels: LabelSet) -> Result<Self> {
        if scorer.num_labels() != labels.len() {
            return Err(StanceError::config(format!(
                "engine produces {} scores but {} labels are configured",
                scorer.num_labels(),
                labels.len()
            )));
        }
        Ok(Self { scorer, labels })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Classify one batch. Returns one label per record, in order.
    pub fn infer(&self, batch_index: usize, records: &[FeatureRecord]) -> Result<Vec<String>> {
        let fail = |reason: String| StanceError::engine(batch_index, reason);

        let batch = FeatureBatch::stack(records).map_err(|e| fail(e.to_string()))?;
        let scores = self.scorer.score(&batch).map_err(|e| match e {
            StanceError::Engine { reason, .. } => fail(reason),
            other => other,
        })?;

        if scores.len() != records.len() {
            return Err(fail(format!(
                "engine returned {} score rows for {} records",
                scores.len(),
                records.len()
            )));
        }

        scores
            .iter()
            .enumerate()
            .map(|(row, s)| {
                if s.len() != self.labels.len() {
                    return Err(fail(format!(
                        "row {row} has {} scores, expected {}",
                        s.len(),
                        self.labels.len()
                    )));
                }
                LabelSet::argmax(s)
                    .and_then(|i| self.labels.get(i))
                    .map(str::to_string)
                    .ok_or_else(|| fail(format!("row {row} has no finite score")))
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    /// Scores each row from a fixed table, cycling; counts calls.
    pub(crate) struct TableScorer {
        pub(crate) rows:  Vec<Vec<f32>>,
        pub(crate) calls: Cell<usize>,
        pub(crate) drop_last: bool,
    }

    impl TableScorer {
        pub(crate) fn new(rows: Vec<Vec<f32>>) -> Self {
            Self { rows, calls: Cell::new(0), drop_last: false }
        }
    }

    impl StanceScorer for TableScorer {
        fn score(&self, batch: &FeatureBatch) -> Result<Vec<Vec<f32>>> {
            self.calls.set(self.calls.get() + 1);
            let mut out: Vec<Vec<f32>> = (0..batch.rows)
                .map(|i| self.rows[i % self.rows.len()].clone())
                .collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }

        fn num_labels(&self) -> usize {
            3
        }
    }

    fn records(n: usize) -> Vec<FeatureRecord> {
        (0..n)
            .map(|_| FeatureRecord {
                token_ids:      vec![101, 102, 0],
                attention_mask: vec![1, 1, 0],
                segment_ids:    vec![0, 0, 0],
            })
            .collect()
    }

    #[test]
    fn test_argmax_per_row_single_call() {
        let scorer = TableScorer::new(vec![vec![0.1, 0.2, 0.9], vec![0.5, 0.5, 0.1]]);
        let adapter = EngineAdapter::new(scorer, LabelSet::default()).unwrap();
        let labels = adapter.infer(0, &records(3)).unwrap();
        assert_eq!(labels, vec!["Argument_for", "NoArgument", "Argument_for"]);
        assert_eq!(adapter.scorer.calls.get(), 1);
    }

    #[test]
    fn test_short_score_matrix_is_engine_error() {
        let mut scorer = TableScorer::new(vec![vec![1.0, 0.0, 0.0]]);
        scorer.drop_last = true;
        let adapter = EngineAdapter::new(scorer, LabelSet::default()).unwrap();
        let err = adapter.infer(4, &records(2)).unwrap_err();
        assert!(matches!(err, StanceError::Engine { batch_index: 4, .. }));
    }

    #[test]
    fn test_wrong_row_width_is_engine_error() {
        let scorer = TableScorer::new(vec![vec![1.0, 0.0]]);
        let adapter = EngineAdapter::new(scorer, LabelSet::default()).unwrap();
        assert!(adapter.infer(0, &records(1)).is_err());
    }

    #[test]
    fn test_label_count_mismatch_is_configuration_error() {
        let scorer = TableScorer::new(vec![vec![1.0, 0.0, 0.0]]);
        let labels = LabelSet::new(vec!["a".into(), "b".into()]).unwrap();
        assert!(matches!(EngineAdapter::new(scorer, labels), Err(StanceError::Configuration(_))));
    }
}
