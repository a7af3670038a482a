//! Classifier collaborator and score blending

pub mod blender;
pub mod classifier;
pub mod inference;
pub mod loader;

pub use blender::ScoreBlender;
pub use classifier::{ClassProbabilities, ClassifierState, FraudClassifier};
pub use inference::OnnxClassifier;
pub use loader::ModelLoader;
