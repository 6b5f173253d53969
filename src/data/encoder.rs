// ============================================================
// Layer 4 — Feature Encoder
// ============================================================
// Turns (topic, sentence) pairs into fixed-length FeatureRecords
// in the sentence-pair layout the classifier was trained on:
//
//   [CLS] topic tokens [SEP] sentence tokens [SEP] [PAD]...
//
// When the pair is too long, tokens are popped one at a time
// from the end of whichever segment is currently longer (the
// sentence on a tie) until both fit in max_seq_len - 3.
//
// Reference: Devlin et al. (2019) BERT, §3 input representation

use crate::domain::classification::ClassificationInput;
use crate::domain::error::{Result, StanceError};
use crate::domain::features::FeatureRecord;
use crate::domain::traits::SubwordTokenizer;

pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";
pub const PAD_TOKEN: &str = "[PAD]";

/// [CLS] + two [SEP]s.
const RESERVED_SLOTS: usize = 3;

/// Ids of the reserved boundary and padding tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub cls: u32,
    pub sep: u32,
    pub pad: u32,
}

impl SpecialTokens {
    /// Look the reserved tokens up in the tokenizer vocabulary.
    pub fn resolve<T: SubwordTokenizer + ?Sized>(tokenizer: &T) -> Result<Self> {
        let lookup = |tok: &str| {
            tokenizer
                .token_id(tok)
                .ok_or_else(|| StanceError::config(format!("tokenizer vocabulary has no {tok} token")))
        };
        Ok(Self { cls: lookup(CLS_TOKEN)?, sep: lookup(SEP_TOKEN)?, pad: lookup(PAD_TOKEN)? })
    }
}

pub struct FeatureEncoder<T> {
    tokenizer:   T,
    special:     SpecialTokens,
    max_seq_len: usize,
}

impl<T: SubwordTokenizer> FeatureEncoder<T> {
    pub fn new(tokenizer: T, max_seq_len: usize) -> Result<Self> {
        if max_seq_len <= RESERVED_SLOTS {
            return Err(StanceError::config(format!(
                "max_seq_length must be greater than {RESERVED_SLOTS}, got {max_seq_len}"
            )));
        }
        let special = SpecialTokens::resolve(&tokenizer)?;
        Ok(Self { tokenizer, special, max_seq_len })
    }

    /// Encode every input, preserving order. The first failing input
    /// aborts the call; its position is carried in the error.
    pub fn encode(&self, inputs: &[ClassificationInput]) -> Result<Vec<FeatureRecord>> {
        inputs
            .iter()
            .enumerate()
            .map(|(i, input)| self.encode_pair(i, input))
            .collect()
    }

    fn encode_pair(&self, index: usize, input: &ClassificationInput) -> Result<FeatureRecord> {
        let mut topic    = self.tokenize_segment(index, "topic", &input.topic)?;
        let mut sentence = self.tokenize_segment(index, "sentence", &input.sentence)?;

        truncate_pair(&mut topic, &mut sentence, self.max_seq_len - RESERVED_SLOTS);

        let SpecialTokens { cls, sep, pad } = self.special;
        let mut token_ids   = Vec::with_capacity(self.max_seq_len);
        let mut segment_ids = Vec::with_capacity(self.max_seq_len);

        token_ids.push(cls);
        token_ids.extend_from_slice(&topic);
        token_ids.push(sep);
        segment_ids.resize(token_ids.len(), 0);

        token_ids.extend_from_slice(&sentence);
        token_ids.push(sep);
        segment_ids.resize(token_ids.len(), 1);

        let real = token_ids.len();
        let mut attention_mask = vec![1u32; real];

        token_ids.resize(self.max_seq_len, pad);
        attention_mask.resize(self.max_seq_len, 0);
        segment_ids.resize(self.max_seq_len, 0);

        Ok(FeatureRecord { token_ids, attention_mask, segment_ids })
    }

    fn tokenize_segment(&self, index: usize, what: &str, text: &str) -> Result<Vec<u32>> {
        let fail = |reason: String| StanceError::Encoding {
            index,
            sentence_id: format!("#{index}"),
            group_key:   "-".to_string(),
            reason,
        };
        if text.trim().is_empty() {
            return Err(fail(format!("{what} text is empty")));
        }
        let ids = self
            .tokenizer
            .tokenize(text)
            .map_err(|e| fail(format!("cannot tokenise {what}: {e}")))?;
        if ids.is_empty() {
            return Err(fail(format!("{what} produced no tokens")));
        }
        Ok(ids)
    }
}

/// Shrink the pair to at most `budget` tokens, always trimming the
/// longer segment (the second one on a tie).
fn truncate_pair(a: &mut Vec<u32>, b: &mut Vec<u32>, budget: usize) {
    while a.len() + b.len() > budget {
        if a.len() > b.len() {
            a.pop();
        } else {
            b.pop();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Whitespace tokenizer; word ids are derived from the bytes.
    pub(crate) struct StubTokenizer {
        vocab: HashMap<&'static str, u32>,
    }

    impl StubTokenizer {
        pub(crate) fn new() -> Self {
            let vocab = HashMap::from([(PAD_TOKEN, 0), (CLS_TOKEN, 101), (SEP_TOKEN, 102)]);
            Self { vocab }
        }
    }

    impl SubwordTokenizer for StubTokenizer {
        fn tokenize(&self, text: &str) -> std::result::Result<Vec<u32>, String> {
            if text.contains('\u{0}') {
                return Err("NUL byte in text".into());
            }
            Ok(text
                .split_whitespace()
                .map(|w| 1000 + w.bytes().map(u32::from).sum::<u32>())
                .collect())
        }

        fn token_id(&self, token: &str) -> Option<u32> {
            self.vocab.get(token).copied()
        }
    }

    fn encoder(max_len: usize) -> FeatureEncoder<StubTokenizer> {
        FeatureEncoder::new(StubTokenizer::new(), max_len).unwrap()
    }

    #[test]
    fn test_layout_and_padding() {
        let rec = encoder(10)
            .encode(&[ClassificationInput::new("zoos", "zoos save species")])
            .unwrap()
            .remove(0);
        assert_eq!(rec.token_ids.len(), 10);
        assert_eq!(rec.token_ids[0], 101);
        assert_eq!(rec.token_ids[2], 102);
        assert_eq!(rec.token_ids[6], 102);
        assert_eq!(&rec.token_ids[7..], &[0, 0, 0]);
        assert_eq!(rec.attention_mask, vec![1, 1, 1, 1, 1, 1, 1, 0, 0, 0]);
        assert_eq!(rec.segment_ids, vec![0, 0, 0, 1, 1, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_every_record_has_fixed_length() {
        let long = "word ".repeat(200);
        let inputs = vec![
            ClassificationInput::new("a", "b"),
            ClassificationInput::new(long.clone(), "short"),
            ClassificationInput::new("short", long.clone()),
            ClassificationInput::new(long.clone(), long),
        ];
        for rec in encoder(16).encode(&inputs).unwrap() {
            assert_eq!(rec.token_ids.len(), 16);
            assert_eq!(rec.attention_mask.len(), 16);
            assert_eq!(rec.segment_ids.len(), 16);
            assert!(rec.real_tokens() <= 16);
            let non_pad = rec.token_ids.iter().take_while(|&&t| t != 0).count();
            assert_eq!(rec.real_tokens(), non_pad);
        }
    }

    #[test]
    fn test_truncation_trims_longer_segment_first() {
        let mut a = vec![1, 2, 3, 4, 5, 6];
        let mut b = vec![7, 8];
        truncate_pair(&mut a, &mut b, 5);
        assert_eq!(a, vec![1, 2, 3]);
        assert_eq!(b, vec![7, 8]);

        let mut a = vec![1, 2, 3];
        let mut b = vec![4, 5, 6];
        truncate_pair(&mut a, &mut b, 4);
        assert_eq!(a, vec![1, 2]);
        assert_eq!(b, vec![4, 5]);
    }

    #[test]
    fn test_empty_sentence_reports_index() {
        let err = encoder(8)
            .encode(&[ClassificationInput::new("t", "ok"), ClassificationInput::new("t", "   ")])
            .unwrap_err();
        assert!(matches!(err, StanceError::Encoding { index: 1, .. }));
    }

    #[test]
    fn test_tokenizer_failure_is_encoding_error() {
        let err = encoder(8)
            .encode(&[ClassificationInput::new("t", "bad\u{0}text")])
            .unwrap_err();
        assert!(matches!(err, StanceError::Encoding { index: 0, .. }));
    }

    #[test]
    fn test_rejects_tiny_max_len() {
        assert!(FeatureEncoder::new(StubTokenizer::new(), 3).is_err());
    }
}
