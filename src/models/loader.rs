//! Startup loading of the classifier model.
//!
//! Candidates are tried in configured order; the first file that opens as
//! an ONNX session wins. When none do, the service runs without a model.

use crate::models::classifier::{ClassifierState, LoadAttempt};
use crate::models::inference::OnnxClassifier;
use anyhow::{anyhow, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::{debug, info, warn};

const DEFAULT_INPUT: &str = "float_input";
const DEFAULT_OUTPUT: &str = "probabilities";

/// An open session plus the tensor names used to call it
pub struct ModelSession {
    pub name: String,
    pub session: Session,
    pub input: String,
    /// Preferred probability output
    pub output: String,
}

pub struct ModelLoader {
    intra_threads: usize,
}

impl ModelLoader {
    /// Initialize the ONNX Runtime environment.
    pub fn with_threads(intra_threads: usize) -> Result<Self> {
        ort::init()
            .with_name("tx-risk-pipeline")
            .commit()
            .context("Failed to initialize ONNX Runtime")?;
        debug!(intra_threads, "ONNX Runtime environment ready");
        Ok(Self { intra_threads })
    }

    pub fn open(&self, path: &Path, name: &str) -> Result<ModelSession> {
        if !path.exists() {
            return Err(anyhow!("model file not found: {}", path.display()));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.intra_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to open ONNX session for {}", path.display()))?;

        let inputs: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        let outputs: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        let (input, output) = io_names(&inputs, &outputs);

        info!(model = %name, path = %path.display(), %input, %output, "Opened model");

        Ok(ModelSession {
            name: name.to_string(),
            session,
            input,
            output,
        })
    }

    /// Try each candidate under `models_dir`, keeping the first that opens.
    pub fn load_first_available<P: AsRef<Path>>(
        &self,
        models_dir: P,
        candidates: &[String],
    ) -> ClassifierState {
        let models_dir = models_dir.as_ref();
        let mut attempts = Vec::new();

        for file in candidates {
            let name = model_name(file);
            match self.open(&models_dir.join(file), name) {
                Ok(model) => {
                    if !attempts.is_empty() {
                        info!(model = %name, skipped = attempts.len(), "Using fallback model");
                    }
                    return ClassifierState::ready(OnnxClassifier::new(model));
                }
                Err(e) => {
                    warn!(candidate = %file, error = %e, "Model candidate rejected");
                    attempts.push(LoadAttempt {
                        candidate: file.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        warn!(dir = %models_dir.display(), tried = attempts.len(), "No classifier could be loaded");
        ClassifierState::Unavailable { attempts }
    }
}

impl Default for ModelLoader {
    /// Loader for an environment that is already initialized
    fn default() -> Self {
        Self { intra_threads: 1 }
    }
}

/// File stem, used as the reported model type
fn model_name(file: &str) -> &str {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
}

/// Pick the input name and the probability output name.
///
/// skl2onnx exports list `output_label` before `output_probability`, so a
/// name containing "prob" wins, then the first non-label output.
fn io_names(inputs: &[&str], outputs: &[&str]) -> (String, String) {
    let input = inputs.first().copied().unwrap_or(DEFAULT_INPUT);
    let output = outputs
        .iter()
        .find(|name| name.contains("prob"))
        .or_else(|| outputs.iter().find(|name| !name.contains("label")))
        .or_else(|| outputs.last())
        .copied()
        .unwrap_or(DEFAULT_OUTPUT);
    (input.to_string(), output.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_candidates_leave_classifier_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = vec![
            "calibrated_model_quantile.onnx".to_string(),
            "rf_model.onnx".to_string(),
        ];

        let state = ModelLoader::default().load_first_available(dir.path(), &candidates);

        match state {
            ClassifierState::Unavailable { attempts } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].candidate, "calibrated_model_quantile.onnx");
                assert!(attempts[1].error.contains("not found"));
            }
            ClassifierState::Ready(_) => panic!("no model files exist"),
        }
    }

    #[test]
    fn test_no_candidates() {
        let state = ModelLoader::default().load_first_available("models", &[]);
        assert!(!state.is_ready());
    }

    #[test]
    fn test_probability_output_preferred_over_label() {
        let (input, output) = io_names(&["float_input"], &["output_label", "output_probability"]);
        assert_eq!(input, "float_input");
        assert_eq!(output, "output_probability");

        let (_, output) = io_names(&["x"], &["label", "scores"]);
        assert_eq!(output, "scores");

        let (input, output) = io_names(&[], &[]);
        assert_eq!(input, DEFAULT_INPUT);
        assert_eq!(output, DEFAULT_OUTPUT);
    }

    #[test]
    fn test_model_name_is_file_stem() {
        assert_eq!(model_name("rf_model_quantile.onnx"), "rf_model_quantile");
        assert_eq!(model_name("plain"), "plain");
    }
}
