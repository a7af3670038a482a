//! ONNX Runtime implementation of the fraud classifier

use crate::config::ModelsConfig;
use crate::error::ClassifierError;
use crate::feature_extractor::FeatureVector;
use crate::models::classifier::{
    ClassProbabilities, ClassifierState, FraudClassifier, LoadAttempt,
};
use crate::models::loader::{ModelLoader, ModelSession};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::sync::Mutex;
use tracing::{debug, error};

/// Single ONNX model exposing two-class probabilities.
///
/// The session needs exclusive access to run, so concurrent batches take
/// turns on the mutex. The model itself is never modified.
pub struct OnnxClassifier {
    name: String,
    model: Mutex<ModelSession>,
}

impl OnnxClassifier {
    pub fn new(model: ModelSession) -> Self {
        Self {
            name: model.name.clone(),
            model: Mutex::new(model),
        }
    }

    /// Initialize ONNX Runtime and load the first available candidate model.
    pub fn load(config: &ModelsConfig) -> ClassifierState {
        match ModelLoader::with_threads(config.onnx_threads) {
            Ok(loader) => loader.load_first_available(&config.models_dir, &config.candidates),
            Err(e) => {
                error!(error = %e, "ONNX Runtime unavailable");
                ClassifierState::Unavailable {
                    attempts: vec![LoadAttempt {
                        candidate: "onnxruntime".to_string(),
                        error: format!("{e:#}"),
                    }],
                }
            }
        }
    }

    fn run(
        model: &mut ModelSession,
        features: &FeatureVector,
    ) -> Result<ClassProbabilities, ClassifierError> {
        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.to_f32()))
            .map_err(|e| ClassifierError::Inference(format!("failed to create input tensor: {e}")))?;

        let model_name = model.name.clone();
        let output_name = model.output.clone();

        let outputs = model
            .session
            .run(ort::inputs![model.input.as_str() => input_tensor])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        if let Some(output) = outputs.get(output_name.as_str()) {
            if let Some(proba) = Self::read_output(output, &model_name)? {
                return Ok(proba);
            }
        }

        // Fallback: first non-label output that yields probabilities
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(proba) = Self::read_output(&output, &model_name)? {
                debug!(model = %model_name, output = %name, "Extracted probabilities (fallback)");
                return Ok(proba);
            }
        }

        Err(ClassifierError::InvalidOutput(format!(
            "no probability output found for model {model_name}"
        )))
    }

    /// Read probabilities from a tensor (`[1, 2]`, `[1, 1]`, `[2]`) or a
    /// `seq(map(int64, float))` output. `Ok(None)` when the value has
    /// neither shape.
    fn read_output(
        output: &ort::value::DynValue,
        model_name: &str,
    ) -> Result<Option<ClassProbabilities>, ClassifierError> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let proba = Self::probabilities_from_tensor(&dims, data)?;
            debug!(model = %model_name, positive = proba.positive, "Extracted from tensor");
            return Ok(Some(proba));
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            let proba = Self::probabilities_from_sequence_map(output)?;
            debug!(model = %model_name, positive = proba.positive, "Extracted from seq(map)");
            return Ok(Some(proba));
        }

        Ok(None)
    }

    fn probabilities_from_tensor(
        dims: &[i64],
        data: &[f32],
    ) -> Result<ClassProbabilities, ClassifierError> {
        let classes = dims.last().copied().unwrap_or(0);
        match (dims.len(), classes, data) {
            (1 | 2, 2, [negative, positive, ..]) => {
                ClassProbabilities::new(*negative as f64, *positive as f64)
            }
            (1 | 2, 1, [positive, ..]) => ClassProbabilities::from_positive(*positive as f64),
            _ => Err(ClassifierError::InvalidOutput(format!(
                "unexpected probability tensor shape {dims:?}"
            ))),
        }
    }

    /// Used by sklearn-style exports with ZipMap enabled
    fn probabilities_from_sequence_map(
        output: &ort::value::DynValue,
    ) -> Result<ClassProbabilities, ClassifierError> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| ClassifierError::InvalidOutput(format!("not a sequence: {e}")))?;

        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(|e| ClassifierError::InvalidOutput(e.to_string()))?;

        // batch size is 1
        let map_value = maps
            .first()
            .ok_or_else(|| ClassifierError::InvalidOutput("empty sequence".to_string()))?;

        let kv_pairs = map_value
            .try_extract_key_values::<i64, f32>()
            .map_err(|e| ClassifierError::InvalidOutput(e.to_string()))?;

        let class_prob = |class: i64| {
            kv_pairs
                .iter()
                .find(|(id, _)| *id == class)
                .map(|(_, p)| *p as f64)
        };

        match (class_prob(0), class_prob(1)) {
            (Some(negative), Some(positive)) => ClassProbabilities::new(negative, positive),
            (None, Some(positive)) => ClassProbabilities::from_positive(positive),
            (Some(negative), None) => ClassProbabilities::new(negative, 1.0 - negative),
            (None, None) => Err(ClassifierError::InvalidOutput(
                "no class probabilities in map".to_string(),
            )),
        }
    }
}

impl FraudClassifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<ClassProbabilities, ClassifierError> {
        let mut model = self.model.lock().map_err(|_| ClassifierError::Lock)?;
        Self::run(&mut model, features)
    }
}
