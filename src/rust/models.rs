/// Static description of where a model's files live and how to verify them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Directory name inside the models cache
    pub name: String,
    pub model_url: String,
    pub labels_url: String,
    /// Expected sha256 of the ONNX file. `None` means the digest is not pinned
    /// and a present file is trusted as-is.
    pub model_hash: Option<String>,
    pub labels_hash: Option<String>,
}

/// Shape and size facts about a classification model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCharacteristics {
    /// Side length of the square RGB input the model expects
    pub input_size: u32,
    /// Number of output classes
    pub num_classes: usize,
    /// Approximate model size in megabytes
    pub model_size_mb: usize,
}

/// Classifiers the crate knows how to fetch and run without extra configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinModel {
    /// MobileNet v2 trained on ImageNet-1k
    MobileNetV2,
}

impl BuiltinModel {
    pub fn characteristics(&self) -> ModelCharacteristics {
        match self {
            BuiltinModel::MobileNetV2 => ModelCharacteristics {
                input_size: 224,
                num_classes: 1000,
                model_size_mb: 14,
            },
        }
    }

    pub fn get_model_info(&self) -> ModelInfo {
        match self {
            // TODO: pin sha256 digests once the mirrored weights are published
            BuiltinModel::MobileNetV2 => ModelInfo {
                name: "mobilenetv2".to_string(),
                model_url: "https://github.com/onnx/models/raw/main/validated/vision/classification/mobilenet/model/mobilenetv2-12.onnx".to_string(),
                labels_url: "https://raw.githubusercontent.com/onnx/models/main/validated/vision/classification/synset.txt".to_string(),
                model_hash: None,
                labels_hash: None,
            },
        }
    }
}
