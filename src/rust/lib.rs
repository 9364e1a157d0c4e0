//! Photo-based waste classification: ingest an image, run a pretrained visual
//! classifier on it, and turn the top label into a disposal tip.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use wastewise::{BuiltinModel, ImageClassifier, InputFile, ModelManager, OnnxClassifier, Session};
//!
//! let manager = ModelManager::new_default()?;
//! manager.ensure_model_downloaded(BuiltinModel::MobileNetV2).await?;
//!
//! let mut session = Session::default();
//! session.start_loading(|| async {
//!     tokio::task::spawn_blocking(|| {
//!         OnnxClassifier::builder()
//!             .with_model(BuiltinModel::MobileNetV2)?
//!             .build()
//!             .map(|c| Arc::new(c) as Arc<dyn ImageClassifier>)
//!     })
//!     .await
//!     .map_err(|e| wastewise::ClassifierError::BuildError(e.to_string()))?
//! });
//! session.lifecycle().wait_until_settled().await;
//!
//! session.ingest(Some(InputFile::from_path("bottle.jpg").await?)).await?;
//! if let Some(result) = session.classify().await {
//!     println!("{} ({}%): {}", result.class_name, result.confidence, result.tip);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing without model weights
//!
//! Anything implementing [`ImageClassifier`] can stand in for the ONNX model:
//!
//! ```rust
//! use std::sync::Arc;
//! use wastewise::{ClassifierError, ClassifierLifecycle, ImageClassifier, Prediction, Session, SessionConfig};
//!
//! struct AlwaysBottle;
//!
//! impl ImageClassifier for AlwaysBottle {
//!     fn classify(&self, _image: &image::DynamicImage) -> Result<Vec<Prediction>, ClassifierError> {
//!         Ok(vec![Prediction::new("beer bottle, container", 0.87)])
//!     }
//! }
//!
//! let lifecycle = ClassifierLifecycle::ready(Arc::new(AlwaysBottle));
//! let session = Session::with_lifecycle(SessionConfig::default(), lifecycle);
//! assert!(session.lifecycle().is_ready());
//! ```

pub mod advisory;
pub mod classifier;
pub mod facts;
pub mod feedback;
pub mod ingest;
pub mod lifecycle;
pub mod model_manager;
pub mod models;
pub mod pipeline;
mod runtime;
pub mod session;

pub use advisory::{Advice, AdvisoryMapper, AdvisoryRule, WasteCategory};
pub use classifier::{parse_labels, ClassifierError, ClassifierInfo, ImageClassifier, OnnxClassifier, OnnxClassifierBuilder, Prediction};
pub use facts::{Fact, FactProvider};
pub use feedback::{FeedbackCollector, FeedbackForm, FeedbackRecord, FeedbackRejected, FeedbackSink, JsonLinesFeedbackSink, LogFeedbackSink};
pub use ingest::{Dimensions, ImageAsset, ImageIngestor, ImageMetadata, IngestError, IngestPolicy, InputFile};
pub use lifecycle::{ClassifierLifecycle, LifecycleState, LoadPolicy, ModelStatus};
pub use model_manager::{ModelError, ModelManager};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo};
pub use pipeline::{Classification, ClassificationPipeline, Confidence, Declined, Outcome, PipelineState, PredictionResult};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use session::{IngestTicket, Session, SessionConfig, SessionSnapshot};

pub fn init_logger() {
    env_logger::init();
}
