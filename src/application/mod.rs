// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no tensor code, no CSV parsing,
// no printing. Each module wires the lower layers together.
//
//   classifier.rs → encode, batch, infer, reassemble
//   corpus_run.rs → stream a whole corpus through the classifier

pub mod classifier;
pub mod corpus_run;
