use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;
use ort::session::Session;
use ort::value::Tensor;

use super::error::ClassifierError;
use super::utils::{preprocess, softmax, top_k};
use super::{ClassifierInfo, ImageClassifier, Prediction};
use crate::ModelCharacteristics;

/// An ImageNet-style classifier backed by an ONNX Runtime session.
///
/// The session is shared behind an `Arc`, so the classifier is `Send + Sync`
/// and can be handed to blocking tasks by reference count.
#[derive(Debug)]
pub struct OnnxClassifier {
    pub model_path: String,
    pub labels_path: String,
    pub session: Arc<Session>,
    pub labels: Arc<Vec<String>>,
    pub model_characteristics: ModelCharacteristics,
    pub top_k: usize,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxClassifier>();
    }
};

impl OnnxClassifier {
    /// Creates a new OnnxClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::OnnxClassifierBuilder {
        super::builder::OnnxClassifierBuilder::new()
    }

    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            model_path: self.model_path.clone(),
            labels_path: self.labels_path.clone(),
            num_classes: self.labels.len(),
            input_size: self.model_characteristics.input_size,
            top_k: self.top_k,
        }
    }

    fn run_model(&self, image: &DynamicImage) -> Result<Vec<f32>, ClassifierError> {
        let input = preprocess(image, self.model_characteristics.input_size);
        let input_name = self.session.inputs[0].name.as_str();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            input_name,
            Tensor::from_array(input.into_dyn())
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create input tensor: {}", e)))?,
        );

        let outputs = self.session.run(input_tensors)
            .map_err(|e| ClassifierError::PredictionError(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[0].try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::PredictionError(format!("Failed to extract output tensor: {}", e)))?;

        Ok(output_tensor.iter().cloned().collect())
    }
}

impl ImageClassifier for OnnxClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Vec<Prediction>, ClassifierError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::ValidationError("Image has no pixels".into()));
        }

        let scores = self.run_model(image)?;
        if scores.len() != self.labels.len() {
            log::warn!(
                "Model produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            );
        }
        let probabilities = softmax(&scores);
        Ok(top_k(&probabilities, &self.labels, self.top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuiltinModel, ModelManager};
    use image::{Rgb, RgbImage};

    #[tokio::test]
    #[ignore = "requires downloaded model weights and the ONNX Runtime library"]
    async fn test_builtin_model_classifies() -> Result<(), Box<dyn std::error::Error>> {
        let manager = ModelManager::new_default()?;
        manager.ensure_model_downloaded(BuiltinModel::MobileNetV2).await?;

        let classifier = OnnxClassifier::builder()
            .with_model(BuiltinModel::MobileNetV2)?
            .build()?;
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([40, 120, 200])));

        let predictions = classifier.classify(&image)?;
        assert_eq!(predictions.len(), 3);
        assert!(predictions[0].probability >= predictions[1].probability);
        assert_eq!(classifier.info().num_classes, 1000);
        Ok(())
    }
}
