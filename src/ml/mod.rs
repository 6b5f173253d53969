// ============================================================
// Layer 5 — ML Layer (Burn)
// ============================================================
// All Burn-specific code lives here.
//
//   model.rs   — the transformer sentence-pair classifier
//   engine.rs  — loads the model once and scores feature batches
//   adapter.rs — one scorer call per batch, argmax to labels
//
// Reference: Burn Book §3 (Building Blocks)

pub mod adapter;
pub mod engine;
pub mod model;
