use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use ort::session::Session;

use super::error::ClassifierError;
use super::model::OnnxClassifier;
use super::utils::parse_labels;
use crate::{runtime::{create_session_builder, RuntimeConfig}, BuiltinModel, ModelCharacteristics, ModelManager};

/// Predictions returned per call unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 3;

/// A builder for constructing an [`OnnxClassifier`] with a fluent interface.
#[derive(Debug)]
pub struct OnnxClassifierBuilder {
    model_path: Option<String>,
    labels_path: Option<String>,
    session: Option<Session>,
    labels: Option<Vec<String>>,
    model_characteristics: Option<ModelCharacteristics>,
    runtime_config: RuntimeConfig,
    top_k: usize,
}

impl Default for OnnxClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OnnxClassifierBuilder {
    pub fn new() -> Self {
        Self {
            model_path: None,
            labels_path: None,
            session: None,
            labels: None,
            model_characteristics: None,
            runtime_config: RuntimeConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Sets the runtime configuration for ONNX model execution.
    /// Must be called before the model is set to take effect.
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Sets how many ranked predictions each classification returns.
    pub fn with_top_k(mut self, top_k: usize) -> Result<Self, ClassifierError> {
        if top_k == 0 {
            return Err(ClassifierError::ValidationError("top_k must be at least 1".into()));
        }
        self.top_k = top_k;
        Ok(self)
    }

    /// Loads a built-in model from the default model cache.
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder instance if successful, or an error if:
    ///   - The model paths are already set
    ///   - The model is not downloaded
    ///   - The model or label file failed to load
    ///   - The model structure is invalid
    pub fn with_model(self, model: BuiltinModel) -> Result<Self, ClassifierError> {
        let manager = ModelManager::new_default()
            .map_err(|e| ClassifierError::BuildError(format!("Failed to create model manager: {}", e)))?;
        self.with_model_from(&manager, model)
    }

    /// Loads a built-in model from the given model cache.
    pub fn with_model_from(mut self, manager: &ModelManager, model: BuiltinModel) -> Result<Self, ClassifierError> {
        if self.model_path.is_some() || self.labels_path.is_some() {
            return Err(ClassifierError::BuildError("Model and labels paths already set".to_string()));
        }

        if !manager.is_model_downloaded(model) {
            return Err(ClassifierError::BuildError(format!(
                "Model '{:?}' is not downloaded. Please download it first using ModelManager::download_model()",
                model
            )));
        }

        let model_path = manager.get_model_path(model);
        let labels_path = manager.get_labels_path(model);
        let characteristics = model.characteristics();

        self.load(&model_path, &labels_path, characteristics)?;
        Ok(self)
    }

    /// Sets a custom ONNX model and label file.
    ///
    /// `input_size` is the side of the square input the model expects; defaults to 224.
    pub fn with_custom_model(
        mut self,
        model_path: &str,
        labels_path: &str,
        input_size: Option<u32>,
    ) -> Result<Self, ClassifierError> {
        if model_path.is_empty() || labels_path.is_empty() {
            return Err(ClassifierError::BuildError("Model and labels paths cannot be empty".to_string()));
        }
        if self.model_path.is_some() || self.labels_path.is_some() {
            return Err(ClassifierError::BuildError("Model and labels paths already set".to_string()));
        }
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::BuildError(format!("Model file not found: {}", model_path)));
        }
        if !Path::new(labels_path).exists() {
            return Err(ClassifierError::BuildError(format!("Labels file not found: {}", labels_path)));
        }

        let characteristics = ModelCharacteristics {
            input_size: input_size.unwrap_or(224),
            num_classes: 0,
            model_size_mb: 0, // Not critical for functionality
        };
        self.load(Path::new(model_path), Path::new(labels_path), characteristics)?;
        Ok(self)
    }

    fn load(
        &mut self,
        model_path: &Path,
        labels_path: &Path,
        mut characteristics: ModelCharacteristics,
    ) -> Result<(), ClassifierError> {
        let contents = fs::read_to_string(labels_path).map_err(|e| {
            error!("Failed to read labels: {}", e);
            ClassifierError::LabelsError(format!("Failed to read {:?}: {}", labels_path, e))
        })?;
        let labels = parse_labels(&contents)?;
        info!("Loaded {} labels", labels.len());

        let session = create_session_builder(&self.runtime_config)?
            .commit_from_file(model_path)?;

        Self::validate_model(&session, labels.len())?;
        info!("Model structure validated successfully");

        characteristics.num_classes = labels.len();
        self.model_characteristics = Some(characteristics);
        self.model_path = Some(model_path.to_string_lossy().to_string());
        self.labels_path = Some(labels_path.to_string_lossy().to_string());
        self.labels = Some(labels);
        self.session = Some(session);
        Ok(())
    }

    pub fn build(mut self) -> Result<OnnxClassifier, ClassifierError> {
        let model_path = self.model_path.take()
            .ok_or_else(|| ClassifierError::BuildError("Model and labels paths must be set".to_string()))?;
        let labels_path = self.labels_path.take()
            .ok_or_else(|| ClassifierError::BuildError("Model and labels paths must be set".to_string()))?;
        let session = self.session.take()
            .ok_or_else(|| ClassifierError::BuildError("No ONNX model loaded".into()))?;
        let labels = self.labels.take()
            .ok_or_else(|| ClassifierError::BuildError("No labels loaded".into()))?;
        let model_characteristics = self.model_characteristics.take()
            .ok_or_else(|| ClassifierError::BuildError("Model characteristics not set".to_string()))?;

        Ok(OnnxClassifier {
            model_path,
            labels_path,
            session: Arc::new(session),
            labels: Arc::new(labels),
            model_characteristics,
            top_k: self.top_k,
        })
    }

    /// Validates that the model has an image input and a score output whose
    /// width, when static, matches the label count.
    fn validate_model(session: &Session, num_labels: usize) -> Result<(), ClassifierError> {
        if session.inputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 input for the image tensor".to_string()
            ));
        }
        let output = session.outputs.first().ok_or_else(|| {
            ClassifierError::ModelError("Model must have at least 1 output for class scores".to_string())
        })?;

        if let Some(dims) = output.output_type.tensor_dimensions() {
            if let Some(&width) = dims.last() {
                if width > 0 && width as usize != num_labels {
                    return Err(ClassifierError::ModelError(format!(
                        "Model outputs {} classes but label file has {}",
                        width, num_labels
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_without_model_fails() {
        let result = OnnxClassifierBuilder::new().build();
        assert!(matches!(result, Err(ClassifierError::BuildError(_))));
    }

    #[test]
    fn test_zero_top_k_is_rejected() {
        let result = OnnxClassifierBuilder::new().with_top_k(0);
        assert!(matches!(result, Err(ClassifierError::ValidationError(_))));
    }

    #[test]
    fn test_custom_model_paths_are_checked() {
        let result = OnnxClassifierBuilder::new().with_custom_model("", "labels.txt", None);
        assert!(matches!(result, Err(ClassifierError::BuildError(_))));

        let result = OnnxClassifierBuilder::new()
            .with_custom_model("/nonexistent/model.onnx", "/nonexistent/labels.txt", None);
        assert!(matches!(result, Err(ClassifierError::BuildError(_))));
    }

    #[test]
    fn test_missing_builtin_model_is_reported() {
        let dir = TempDir::new().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();
        let result = OnnxClassifierBuilder::new().with_model_from(&manager, BuiltinModel::MobileNetV2);
        match result {
            Err(ClassifierError::BuildError(msg)) => assert!(msg.contains("not downloaded")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
