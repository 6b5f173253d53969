// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the HuggingFace tokenizer that ships with the model and
// adapts it to the SubwordTokenizer trait the encoder uses.
//
// The tokenizer must be the one the classifier was trained
// with: same vocabulary, same lower-casing, same [CLS]/[SEP]/
// [PAD] ids. Special tokens are added by the encoder, so the
// tokenizer is always called with add_special_tokens = false.

use std::path::PathBuf;

use tokenizers::Tokenizer;

use crate::domain::error::{Result, StanceError};
use crate::domain::traits::SubwordTokenizer;

/// tokenizers::Tokenizer behind the SubwordTokenizer trait.
pub struct HfTokenizer {
    inner: Tokenizer,
}

impl HfTokenizer {
    pub fn new(inner: Tokenizer) -> Self {
        Self { inner }
    }

    /// One past the largest id the tokenizer can emit.
    pub fn id_bound(&self) -> usize {
        self.inner
            .get_vocab(true)
            .values()
            .max()
            .map_or(0, |&id| id as usize + 1)
    }
}

impl SubwordTokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> std::result::Result<Vec<u32>, String> {
        self.inner
            .encode(text, false)
            .map(|enc| enc.get_ids().to_vec())
            .map_err(|e| e.to_string())
    }

    fn token_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }
}

pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the tokenizer JSON from disk.
    pub fn load(&self) -> Result<HfTokenizer> {
        let tokenizer = Tokenizer::from_file(&self.path).map_err(|e| {
            StanceError::config(format!(
                "cannot load tokenizer from '{}': {e}",
                self.path.display()
            ))
        })?;
        tracing::info!(
            "Tokenizer loaded from '{}' ({} entries)",
            self.path.display(),
            tokenizer.get_vocab_size(true)
        );
        Ok(HfTokenizer::new(tokenizer))
    }
}

/// Write a small lower-casing word-level tokenizer in HuggingFace
/// JSON format. Ids follow the BERT convention for special tokens;
/// words get ids from 104 upwards in the order given.
#[cfg(test)]
pub(crate) fn write_word_level(path: &std::path::Path, words: &[&str]) -> Result<()> {
    let mut vocab = serde_json::json!({
        "[PAD]":  0,
        "[UNK]":  100,
        "[CLS]":  101,
        "[SEP]":  102,
        "[MASK]": 103,
    });
    for (i, word) in words.iter().enumerate() {
        vocab[*word] = serde_json::json!(104 + i);
    }

    let special = |id: u32, content: &str| serde_json::json!({
        "id": id, "content": content, "single_word": false, "lstrip": false,
        "rstrip": false, "normalized": false, "special": true
    });

    let tokenizer_json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            special(0, "[PAD]"), special(100, "[UNK]"), special(101, "[CLS]"),
            special(102, "[SEP]"), special(103, "[MASK]")
        ],
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "BertPreTokenizer" },
        "post_processor": null,
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    });

    std::fs::write(path, serde_json::to_string_pretty(&tokenizer_json)?)?;
    Ok(())
}
