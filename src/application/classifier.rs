// ============================================================
// Layer 2 — Stance Classifier (Inference Orchestrator)
// ============================================================
// Composes the pipeline for an arbitrary list of pairs:
//
//   inputs ──encode once──▶ FeatureRecords
//          ──Batcher──────▶ [batch 0] [batch 1] ... [batch n]
//          ──EngineAdapter▶ labels, concatenated in batch order
//          ──zip inputs───▶ ClassificationResults
//
// Output order and length always match the input. Any failing
// record aborts the whole call rather than returning a shorter
// or shifted list.
//
// The classifier is built once per run (tokenizer and model
// loaded here) and is read-only afterwards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::{batcher::Batcher, encoder::FeatureEncoder};
use crate::domain::classification::{ClassificationInput, ClassificationResult, LabelSet};
use crate::domain::error::{Result, StanceError};
use crate::domain::traits::{StanceScorer, SubwordTokenizer};
use crate::infra::{
    model_store::ModelStore,
    tokenizer_store::{HfTokenizer, TokenizerStore},
};
use crate::ml::{adapter::EngineAdapter, engine::{load_engine, DevicePreference}};

// ─── Classifier Configuration ────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub model_dir:      PathBuf,
    pub device:         DevicePreference,
    pub max_seq_length: usize,
    pub batch_size:     usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_dir:      PathBuf::from("bert_output/argument_classification_ukp_all_data"),
            device:         DevicePreference::Auto,
            max_seq_length: 64,
            batch_size:     8,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(StanceError::config("batch size must be a positive integer"));
        }
        if self.max_seq_length <= 3 {
            return Err(StanceError::config("max sequence length must be greater than 3"));
        }
        if !self.model_dir.is_dir() {
            return Err(StanceError::config(format!(
                "model directory '{}' does not exist",
                self.model_dir.display()
            )));
        }
        Ok(())
    }
}

// ─── StanceClassifier ────────────────────────────────────────────────────────
pub struct StanceClassifier<T, S> {
    encoder: FeatureEncoder<T>,
    batcher: Batcher,
    adapter: EngineAdapter<S>,
}

/// The classifier as built from a model directory.
pub type LoadedClassifier = StanceClassifier<HfTokenizer, Box<dyn StanceScorer>>;

impl<T: SubwordTokenizer, S: StanceScorer> StanceClassifier<T, S> {
    pub fn new(
        tokenizer:      T,
        scorer:         S,
        labels:         LabelSet,
        max_seq_length: usize,
        batch_size:     usize,
    ) -> Result<Self> {
        Ok(Self {
            encoder: FeatureEncoder::new(tokenizer, max_seq_length)?,
            batcher: Batcher::new(batch_size)?,
            adapter: EngineAdapter::new(scorer, labels)?,
        })
    }

    pub fn labels(&self) -> &LabelSet {
        self.adapter.labels()
    }

    /// Classify a single pair.
    pub fn classify(&self, topic: &str, sentence: &str) -> Result<ClassificationResult> {
        let mut results = self.classify_batch(&[ClassificationInput::new(topic, sentence)])?;
        results
            .pop()
            .ok_or_else(|| StanceError::engine(0, "no result for single input"))
    }

    /// Classify many pairs; results come back in input order.
    pub fn classify_batch(&self, inputs: &[ClassificationInput]) -> Result<Vec<ClassificationResult>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.encoder.encode(inputs)?;

        let mut labels = Vec::with_capacity(inputs.len());
        for (batch_index, batch) in self.batcher.batch(&records).enumerate() {
            labels.extend(self.adapter.infer(batch_index, batch)?);
        }

        if labels.len() != inputs.len() {
            return Err(StanceError::engine(
                self.batcher.batch_count(inputs.len()),
                format!("{} labels for {} inputs", labels.len(), inputs.len()),
            ));
        }

        tracing::trace!(
            "Classified {} inputs in {} batches",
            inputs.len(),
            self.batcher.batch_count(inputs.len())
        );

        Ok(inputs
            .iter()
            .zip(labels)
            .map(|(input, predicted_label)| ClassificationResult {
                topic: input.topic.clone(),
                sentence: input.sentence.clone(),
                predicted_label,
            })
            .collect())
    }
}

/// Load tokenizer and model from `config.model_dir` and assemble the
/// classifier. This is the only place the model is loaded.
pub fn load_classifier(config: &ClassifierConfig) -> Result<LoadedClassifier> {
    config.validate()?;
    let store     = ModelStore::open(&config.model_dir)?;
    let tokenizer = TokenizerStore::new(store.tokenizer_path()).load()?;
    let (manifest, scorer) = load_engine(&store, config.device)?;

    if config.max_seq_length > manifest.model.max_position {
        return Err(StanceError::config(format!(
            "max sequence length {} exceeds the model's {} positions",
            config.max_seq_length, manifest.model.max_position
        )));
    }

    if tokenizer.id_bound() > manifest.model.vocab_size {
        return Err(StanceError::config(format!(
            "tokenizer ids reach {} but the model embeds only {}",
            tokenizer.id_bound(), manifest.model.vocab_size
        )));
    }

    StanceClassifier::new(
        tokenizer,
        scorer,
        manifest.labels,
        config.max_seq_length,
        config.batch_size,
    )
}
