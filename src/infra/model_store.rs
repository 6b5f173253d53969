// ============================================================
// Layer 6 — Model Store
// ============================================================
// Reads (and, for tooling and tests, writes) the model artifact
// directory the engine is built from:
//
//   model_dir/
//     manifest.json     ← label vocabulary + model architecture
//     model.mpk.gz      ← weights, Burn CompactRecorder format
//     tokenizer.json    ← HuggingFace tokenizer definition
//
// The manifest has to be read first: the model is rebuilt from
// its architecture config and only then filled with weights.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{fs, path::PathBuf};

use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::domain::classification::LabelSet;
use crate::domain::error::{Result, StanceError};
use crate::ml::model::{StanceModelConfig, TransformerStanceModel};

const MANIFEST_FILE:  &str = "manifest.json";
const WEIGHTS_STEM:   &str = "model";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Everything needed to rebuild the classifier before loading weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Label names in the order of the model's output scores.
    #[serde(default)]
    pub labels: LabelSet,
    pub model:  StanceModelConfig,
}

impl ModelManifest {
    pub fn validate(&self) -> Result<()> {
        if self.model.num_labels != self.labels.len() {
            return Err(StanceError::config(format!(
                "manifest lists {} labels but the model head has {} outputs",
                self.labels.len(),
                self.model.num_labels
            )));
        }
        Ok(())
    }
}

pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Point at an existing model directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(StanceError::config(format!(
                "model directory '{}' does not exist",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let path = self.dir.join(MANIFEST_FILE);
        let json = fs::read_to_string(&path).map_err(|e| {
            StanceError::config(format!("cannot read model manifest '{}': {e}", path.display()))
        })?;
        let manifest: ModelManifest = serde_json::from_str(&json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let path = self.dir.join(MANIFEST_FILE);
        fs::write(&path, serde_json::to_string_pretty(manifest)?)?;
        tracing::debug!("Saved model manifest to '{}'", path.display());
        Ok(())
    }

    /// Fill a freshly initialised model with the stored weights.
    /// The model must have the architecture the weights were saved with.
    pub fn load_model<B: Backend>(
        &self,
        model:  TransformerStanceModel<B>,
        device: &B::Device,
    ) -> Result<TransformerStanceModel<B>> {
        let path = self.dir.join(WEIGHTS_STEM);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .map_err(|e| StanceError::config(format!(
                "cannot load weights '{}.mpk.gz': {e}",
                path.display()
            )))?;
        Ok(model.load_record(record))
    }

    pub fn save_model<B: Backend>(&self, model: &TransformerStanceModel<B>) -> Result<()> {
        let path = self.dir.join(WEIGHTS_STEM);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .map_err(|e| StanceError::Io(std::io::Error::other(format!(
                "cannot save weights '{}': {e}",
                path.display()
            ))))?;
        Ok(())
    }

    /// Build the architecture from the manifest and load weights into it.
    pub fn load_classifier<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(ModelManifest, TransformerStanceModel<B>)> {
        let manifest = self.load_manifest()?;
        let model    = self.load_model(manifest.model.init::<B>(device), device)?;
        tracing::info!(
            "Model loaded from '{}' ({} layers, d_model={}, labels={:?})",
            self.dir.display(),
            manifest.model.num_layers,
            manifest.model.d_model,
            manifest.labels.iter().collect::<Vec<_>>(),
        );
        Ok((manifest, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_dir_is_configuration_error() {
        let err = ModelStore::open("/definitely/not/here").err().unwrap();
        assert!(matches!(err, StanceError::Configuration(_)));
    }

    #[test]
    fn test_manifest_label_count_must_match_head() {
        let manifest = ModelManifest {
            labels: LabelSet::default(),
            model:  StanceModelConfig::new(100, 16, 8, 2, 1, 16, 2),
        };
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_manifest_roundtrip_defaults_labels() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        let json = serde_json::json!({
            "model": serde_json::to_value(StanceModelConfig::new(100, 16, 8, 2, 1, 16, 3)).unwrap()
        });
        fs::write(dir.path().join(MANIFEST_FILE), json.to_string()).unwrap();
        let manifest = store.load_manifest().unwrap();
        assert_eq!(manifest.labels, LabelSet::default());
        assert_eq!(manifest.model.type_vocab_size, 2);
    }
}
