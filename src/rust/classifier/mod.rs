use image::DynamicImage;

mod error;
mod model;
pub mod builder;
mod utils;

pub use builder::OnnxClassifierBuilder;
pub use error::ClassifierError;
pub use model::OnnxClassifier;
pub use utils::parse_labels;

/// One ranked guess produced by a classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Raw label, possibly a comma-separated synonym list ("beer bottle, container")
    pub label: String,
    /// Probability in `[0, 1]`
    pub probability: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// An opaque visual recognition capability.
///
/// Implementations return predictions ordered by descending probability.
/// An empty list is a valid, inconclusive answer.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> Result<Vec<Prediction>, ClassifierError>;
}

/// Information about a loaded ONNX classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Path to the ONNX model file
    pub model_path: String,
    /// Path to the label file
    pub labels_path: String,
    /// Number of labels known to the classifier
    pub num_classes: usize,
    /// Side length of the square model input
    pub input_size: u32,
    /// How many predictions each call returns
    pub top_k: usize,
}
