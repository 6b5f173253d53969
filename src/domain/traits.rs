// ============================================================
// Layer 3 — Collaborator Traits
// ============================================================
// The two external collaborators the pipeline drives are
// reached only through these traits:
//
//   SubwordTokenizer → text to subword ids, plus vocabulary lookup
//                      for the reserved [CLS]/[SEP]/[PAD] tokens
//   StanceScorer     → one call per batch, one score row per record
//
// The production implementations live in infra (tokenizers
// crate) and ml (burn model); tests plug in small stubs.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::Result;
use crate::domain::features::FeatureBatch;

// ─── SubwordTokenizer ─────────────────────────────────────────────────────────
pub trait SubwordTokenizer {
    /// Tokenise one text into subword ids, without special tokens.
    /// The error string is wrapped into an encoding error by the caller.
    fn tokenize(&self, text: &str) -> std::result::Result<Vec<u32>, String>;

    /// Vocabulary id of a token such as "[CLS]", if it exists.
    fn token_id(&self, token: &str) -> Option<u32>;
}

// ─── StanceScorer ─────────────────────────────────────────────────────────────
/// The classification engine: a read-only scoring function.
///
/// Implementations:
///   - BurnStanceEngine → transformer classifier loaded from disk
///   - test stubs       → fixed or rule-based scores
pub trait StanceScorer {
    /// Return one score vector per batch row, in row order.
    fn score(&self, batch: &FeatureBatch) -> Result<Vec<Vec<f32>>>;

    /// Number of scores each row is expected to carry.
    fn num_labels(&self) -> usize;
}

impl<T: StanceScorer + ?Sized> StanceScorer for Box<T> {
    fn score(&self, batch: &FeatureBatch) -> Result<Vec<Vec<f32>>> {
        (**self).score(batch)
    }

    fn num_labels(&self) -> usize {
        (**self).num_labels()
    }
}
