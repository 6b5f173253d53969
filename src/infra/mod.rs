// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Files and clocks: the pieces every workflow leans on but
// none of them owns.
//
//   model_store.rs     — model manifest and Burn weights on disk
//   tokenizer_store.rs — HuggingFace tokenizer loading
//   checkpoint.rs      — resumable run position
//   progress.rs        — percent complete and runtime projection
//
// Reference: Rust Book §7 (Modules)

pub mod checkpoint;
pub mod model_store;
pub mod progress;
pub mod tokenizer_store;
