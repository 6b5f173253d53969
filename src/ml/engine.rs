// ============================================================
// Layer 5 — Burn Stance Engine
// ============================================================
// The production StanceScorer: a TransformerStanceModel held on
// one device, built once at run start and only read afterwards.
//
// Device choice happens here, once, at construction:
//   cpu  → NdArray backend
//   gpu  → Wgpu backend (needs the `wgpu` feature)
//   auto → Wgpu when an adapter is found, otherwise NdArray
//
// score() turns one FeatureBatch into three [rows, seq_len] Int
// tensors, runs a single forward pass and copies the logits
// back as one score row per record.

use burn::prelude::*;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, StanceError};
use crate::domain::features::FeatureBatch;
use crate::domain::traits::StanceScorer;
use crate::infra::model_store::{ModelManifest, ModelStore};
use crate::ml::model::{StanceModelConfig, TransformerStanceModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Gpu,
}

pub struct BurnStanceEngine<B: Backend> {
    model:  TransformerStanceModel<B>,
    config: StanceModelConfig,
    device: B::Device,
}

impl<B: Backend> BurnStanceEngine<B> {
    pub fn new(model: TransformerStanceModel<B>, config: StanceModelConfig, device: B::Device) -> Self {
        Self { model, config, device }
    }

    /// Load manifest and weights from a model directory onto `device`.
    pub fn load(store: &ModelStore, device: B::Device) -> Result<(ModelManifest, Self)> {
        let (manifest, model) = store.load_classifier::<B>(&device)?;
        let config = manifest.model.clone();
        Ok((manifest, Self::new(model, config, device)))
    }

    fn check_batch(&self, batch: &FeatureBatch) -> std::result::Result<(), String> {
        if batch.rows == 0 {
            return Err("empty batch".to_string());
        }
        let expected = batch.rows * batch.seq_len;
        if batch.token_ids.len() != expected
            || batch.attention_mask.len() != expected
            || batch.segment_ids.len() != expected
        {
            return Err(format!("feature buffers do not match shape [{}, {}]", batch.rows, batch.seq_len));
        }
        if batch.seq_len > self.config.max_position {
            return Err(format!(
                "sequence length {} exceeds the model's {} positions",
                batch.seq_len, self.config.max_position
            ));
        }
        let vocab = self.config.vocab_size as i32;
        if let Some(id) = batch.token_ids.iter().find(|&&id| id < 0 || id >= vocab) {
            return Err(format!("token id {id} outside vocabulary of {vocab}"));
        }
        let types = self.config.type_vocab_size as i32;
        if batch.segment_ids.iter().any(|&s| s < 0 || s >= types) {
            return Err(format!("segment id outside 0..{types}"));
        }
        Ok(())
    }

    fn int_tensor(&self, values: &[i32], rows: usize, seq_len: usize) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_ints(values, &self.device).reshape([rows, seq_len])
    }
}

impl<B: Backend> StanceScorer for BurnStanceEngine<B> {
    fn score(&self, batch: &FeatureBatch) -> Result<Vec<Vec<f32>>> {
        self.check_batch(batch).map_err(|reason| StanceError::engine(0, reason))?;

        let (rows, seq_len) = (batch.rows, batch.seq_len);
        let input_ids      = self.int_tensor(&batch.token_ids, rows, seq_len);
        let segment_ids    = self.int_tensor(&batch.segment_ids, rows, seq_len);
        let attention_mask = self.int_tensor(&batch.attention_mask, rows, seq_len);

        let logits = self.model.forward(input_ids, segment_ids, attention_mask);
        let flat: Vec<f32> = logits
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| StanceError::engine(0, format!("cannot read logits: {e:?}")))?;

        let width = self.config.num_labels;
        if flat.len() != rows * width {
            return Err(StanceError::engine(0, format!(
                "model returned {} logits for {rows} rows × {width} labels",
                flat.len()
            )));
        }
        Ok(flat.chunks(width).map(<[f32]>::to_vec).collect())
    }

    fn num_labels(&self) -> usize {
        self.config.num_labels
    }
}

/// Build the engine for the requested device. The model is loaded
/// exactly once here and shared read-only by every batch.
pub fn load_engine(
    store:      &ModelStore,
    preference: DevicePreference,
) -> Result<(ModelManifest, Box<dyn StanceScorer>)> {
    match resolve_device(preference)? {
        DevicePreference::Gpu => load_gpu(store),
        _ => {
            tracing::info!("Using CPU (NdArray) backend");
            let device = burn::backend::ndarray::NdArrayDevice::default();
            let (manifest, engine) = BurnStanceEngine::<burn::backend::NdArray>::load(store, device)?;
            Ok((manifest, Box::new(engine)))
        }
    }
}

/// Map `auto` to a concrete device: the GPU when an adapter answers,
/// otherwise the CPU. An explicit `gpu` with no usable adapter is an error.
pub fn resolve_device(preference: DevicePreference) -> Result<DevicePreference> {
    resolve_device_with(preference, gpu_available)
}

fn resolve_device_with(
    preference:    DevicePreference,
    gpu_available: impl FnOnce() -> bool,
) -> Result<DevicePreference> {
    match preference {
        DevicePreference::Cpu => Ok(DevicePreference::Cpu),
        DevicePreference::Gpu => {
            if gpu_available() {
                Ok(DevicePreference::Gpu)
            } else {
                Err(StanceError::config(
                    "GPU requested but no GPU adapter is available (or the `wgpu` feature is off)",
                ))
            }
        }
        DevicePreference::Auto => {
            if gpu_available() {
                Ok(DevicePreference::Gpu)
            } else {
                tracing::warn!("No GPU adapter available, falling back to CPU");
                Ok(DevicePreference::Cpu)
            }
        }
    }
}

/// Round-trip one value through the default wgpu device. Adapter
/// selection panics when there is no adapter, so the probe runs
/// under catch_unwind with the panic message silenced.
#[cfg(feature = "wgpu")]
fn gpu_available() -> bool {
    use burn::backend::wgpu::{Wgpu, WgpuDevice};

    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let probe = std::panic::catch_unwind(|| {
        let device = WgpuDevice::default();
        Tensor::<Wgpu, 1>::from_floats([1.0f32], &device)
            .into_data()
            .to_vec::<f32>()
            .is_ok()
    });
    std::panic::set_hook(hook);
    matches!(probe, Ok(true))
}

#[cfg(not(feature = "wgpu"))]
fn gpu_available() -> bool {
    false
}

#[cfg(feature = "wgpu")]
fn load_gpu(store: &ModelStore) -> Result<(ModelManifest, Box<dyn StanceScorer>)> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    let (manifest, engine) = BurnStanceEngine::<burn::backend::Wgpu>::load(store, device)?;
    Ok((manifest, Box::new(engine)))
}

#[cfg(not(feature = "wgpu"))]
fn load_gpu(_store: &ModelStore) -> Result<(ModelManifest, Box<dyn StanceScorer>)> {
    Err(StanceError::config("GPU backend not compiled in"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classification::LabelSet;
    use crate::domain::features::FeatureRecord;

    type TestBackend = burn::backend::NdArray;

    fn tiny_config() -> StanceModelConfig {
        StanceModelConfig::new(200, 16, 8, 2, 1, 16, 3)
    }

    fn record(ids: &[u32], seq_len: usize) -> FeatureRecord {
        let mut token_ids = ids.to_vec();
        let mut attention_mask = vec![1; ids.len()];
        token_ids.resize(seq_len, 0);
        attention_mask.resize(seq_len, 0);
        FeatureRecord { token_ids, attention_mask, segment_ids: vec![0; seq_len] }
    }

    #[test]
    fn test_saved_model_scores_deterministically() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        let device = Default::default();

        let model = tiny_config().init::<TestBackend>(&device);
        store.save_model(&model).unwrap();
        store
            .save_manifest(&ModelManifest { labels: LabelSet::default(), model: tiny_config() })
            .unwrap();

        let (manifest, engine) = BurnStanceEngine::<TestBackend>::load(&store, device).unwrap();
        assert_eq!(manifest.labels.len(), 3);

        let batch = FeatureBatch::stack(&[
            record(&[101, 150, 102, 160, 102], 8),
            record(&[101, 151, 102, 102], 8),
        ])
        .unwrap();
        let first = engine.score(&batch).unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|row| row.len() == 3 && row.iter().all(|s| s.is_finite())));
        assert_eq!(first, engine.score(&batch).unwrap());
    }

    #[test]
    fn test_out_of_range_inputs_are_engine_errors() {
        let device = Default::default();
        let engine = BurnStanceEngine::<TestBackend>::new(tiny_config().init(&device), tiny_config(), device);

        let too_long = FeatureBatch::stack(&[record(&[101, 102], 32)]).unwrap();
        assert!(matches!(engine.score(&too_long), Err(StanceError::Engine { .. })));

        let bad_token = FeatureBatch::stack(&[record(&[101, 5000, 102], 8)]).unwrap();
        assert!(matches!(engine.score(&bad_token), Err(StanceError::Engine { .. })));
    }

    #[test]
    fn test_cpu_preference_never_probes() {
        let resolved = resolve_device_with(DevicePreference::Cpu, || -> bool { panic!("cpu must not probe") }).unwrap();
        assert_eq!(resolved, DevicePreference::Cpu);
    }

    #[test]
    fn test_auto_falls_back_to_cpu_without_adapter() {
        assert_eq!(resolve_device_with(DevicePreference::Auto, || false).unwrap(), DevicePreference::Cpu);
        assert_eq!(resolve_device_with(DevicePreference::Auto, || true).unwrap(), DevicePreference::Gpu);
    }

    #[test]
    fn test_explicit_gpu_without_adapter_is_configuration_error() {
        let err = resolve_device_with(DevicePreference::Gpu, || false).unwrap_err();
        assert!(matches!(err, StanceError::Configuration(_)));
        assert_eq!(resolve_device_with(DevicePreference::Gpu, || true).unwrap(), DevicePreference::Gpu);
    }
}
