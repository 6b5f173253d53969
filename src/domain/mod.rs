// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain value types and the seams to external collaborators.
// Nothing here touches files, tensors or the tokenizer crate.
//
//   classification.rs → inputs, results and the label vocabulary
//   corpus.rs         → one grouped corpus row and its sentences
//   features.rs       → fixed-length numeric encodings and batches
//   traits.rs         → tokenizer and scorer collaborator traits
//   error.rs          → the error taxonomy shared by every layer

pub mod classification;
pub mod corpus;
pub mod error;
pub mod features;
pub mod traits;
