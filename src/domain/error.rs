// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the pipeline can raise, grouped by where it
// comes from. Library layers return `Result<T>` from here;
// the CLI wraps these in anyhow for the final report.
//
//   Configuration  → bad run parameters, raised before any work
//   CorpusParse    → a group row whose child sentences can't be decoded
//   Encoding       → a sentence the tokenizer can't turn into features
//   Engine         → the classifier failed or returned the wrong shape
//
// Reference: thiserror crate documentation
//            Rust Book §9 (Error Handling)

use thiserror::Error;

/// Result alias used by every layer below the CLI.
pub type Result<T> = std::result::Result<T, StanceError>;

#[derive(Error, Debug)]
pub enum StanceError {
    /// Invalid run parameters (batch size, sequence length, paths).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A corpus row whose structure could not be decoded.
    #[error("corpus parse error in group '{group_key}': {reason}")]
    CorpusParse { group_key: String, reason: String },

    /// The tokenizer rejected one input pair.
    #[error("encoding error at input {index} (sentence '{sentence_id}', group '{group_key}'): {reason}")]
    Encoding {
        index:       usize,
        sentence_id: String,
        group_key:   String,
        reason:      String,
    },

    /// The classification engine failed on a batch.
    #[error("engine error on batch {batch_index}: {reason}")]
    Engine { batch_index: usize, reason: String },

    /// A fatal error inside one corpus group, with what an operator
    /// needs to restart the run from that group.
    #[error("run aborted at group '{group_key}' (index {group_index}, unix time {at_unix}); resume with offset {group_index}: {source}")]
    GroupFailed {
        group_index: usize,
        group_key:   String,
        at_unix:     u64,
        #[source]
        source:      Box<StanceError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StanceError {
    pub fn config(msg: impl Into<String>) -> Self {
        StanceError::Configuration(msg.into())
    }

    pub fn corpus(group_key: impl Into<String>, reason: impl Into<String>) -> Self {
        StanceError::CorpusParse {
            group_key: group_key.into(),
            reason:    reason.into(),
        }
    }

    pub fn engine(batch_index: usize, reason: impl Into<String>) -> Self {
        StanceError::Engine { batch_index, reason: reason.into() }
    }

    /// Attach sentence identity to an encoding error raised without it.
    /// Other variants pass through untouched.
    pub fn with_sentence(self, sentence_id: &str, group_key: &str) -> Self {
        match self {
            StanceError::Encoding { index, reason, .. } => StanceError::Encoding {
                index,
                sentence_id: sentence_id.to_string(),
                group_key:   group_key.to_string(),
                reason,
            },
            other => other,
        }
    }

    /// True for malformed-input errors that a "skip" policy may step over.
    pub fn is_corpus_parse(&self) -> bool {
        matches!(self, StanceError::CorpusParse { .. })
    }
}
