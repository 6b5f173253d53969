// ============================================================
// Layer 3 — Feature Records
// ============================================================
// The numeric form of one (topic, sentence) pair:
//
//   token_ids      [CLS] topic [SEP] sentence [SEP] [PAD]...
//   attention_mask  1    1..1   1     1..1     1    0...
//   segment_ids     0    0..0   0     1..1     1    0...
//
// All three vectors have exactly max_seq_length entries.
// A FeatureBatch stacks several records row-major so the
// engine can build [rows, seq_len] tensors in one go.

use crate::domain::error::{Result, StanceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRecord {
    pub token_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub segment_ids:    Vec<u32>,
}

impl FeatureRecord {
    pub fn seq_len(&self) -> usize {
        self.token_ids.len()
    }

    /// Number of real (non-padding) tokens.
    pub fn real_tokens(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }
}

/// A batch of records flattened into row-major i32 buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureBatch {
    pub rows:           usize,
    pub seq_len:        usize,
    pub token_ids:      Vec<i32>,
    pub attention_mask: Vec<i32>,
    pub segment_ids:    Vec<i32>,
}

impl FeatureBatch {
    /// Stack records into one batch. Fails on an empty slice or
    /// when records disagree on sequence length.
    pub fn stack(records: &[FeatureRecord]) -> Result<Self> {
        let first = records
            .first()
            .ok_or_else(|| StanceError::config("cannot stack an empty batch"))?;
        let seq_len = first.seq_len();
        let rows    = records.len();

        let mut token_ids      = Vec::with_capacity(rows * seq_len);
        let mut attention_mask = Vec::with_capacity(rows * seq_len);
        let mut segment_ids    = Vec::with_capacity(rows * seq_len);

        for (i, r) in records.iter().enumerate() {
            if r.token_ids.len() != seq_len
                || r.attention_mask.len() != seq_len
                || r.segment_ids.len() != seq_len
            {
                return Err(StanceError::config(format!(
                    "record {i} does not have sequence length {seq_len}"
                )));
            }
            token_ids.extend(r.token_ids.iter().map(|&x| x as i32));
            attention_mask.extend(r.attention_mask.iter().map(|&x| x as i32));
            segment_ids.extend(r.segment_ids.iter().map(|&x| x as i32));
        }

        Ok(Self { rows, seq_len, token_ids, attention_mask, segment_ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ids: &[u32]) -> FeatureRecord {
        FeatureRecord {
            token_ids:      ids.to_vec(),
            attention_mask: ids.iter().map(|&i| u32::from(i != 0)).collect(),
            segment_ids:    vec![0; ids.len()],
        }
    }

    #[test]
    fn test_stack_is_row_major() {
        let batch = FeatureBatch::stack(&[record(&[101, 5, 102]), record(&[101, 102, 0])]).unwrap();
        assert_eq!(batch.rows, 2);
        assert_eq!(batch.seq_len, 3);
        assert_eq!(batch.token_ids, vec![101, 5, 102, 101, 102, 0]);
        assert_eq!(batch.attention_mask, vec![1, 1, 1, 1, 1, 0]);
    }

    #[test]
    fn test_stack_rejects_ragged_and_empty() {
        assert!(FeatureBatch::stack(&[]).is_err());
        assert!(FeatureBatch::stack(&[record(&[1, 2]), record(&[1])]).is_err());
    }

    #[test]
    fn test_real_tokens_counts_mask() {
        assert_eq!(record(&[101, 7, 102, 0, 0]).real_tokens(), 3);
    }
}
