// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the CSV files on disk and the engine:
//
//   input CSV
//       │
//       ▼
//   CorpusReader      → streams one grouped row at a time
//       │
//       ▼
//   sentence_parser   → decodes the serialised child sentences
//       │
//       ▼
//   FeatureEncoder    → (topic, sentence) → fixed-length ids/mask/segments
//       │
//       ▼
//   Batcher           → fixed-size ordered slices for the engine
//       │
//       ▼
//   ResultWriter      → one output row per classified sentence
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Streams grouped rows from the input CSV
pub mod corpus_reader;

/// Strict decoder for the serialised child-sentence list
pub mod sentence_parser;

/// Builds fixed-length feature records from text pairs
pub mod encoder;

/// Splits records into ordered fixed-size batches
pub mod batcher;

/// Writes result rows to the output CSV
pub mod result_writer;
