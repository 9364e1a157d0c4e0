use std::fmt;
use std::sync::Arc;

use image::DynamicImage;
use serde::{Serialize, Serializer};

use crate::advisory::AdvisoryMapper;
use crate::classifier::{ClassifierError, ImageClassifier, Prediction};
use crate::facts::{Fact, FactProvider};
use crate::ingest::ImageAsset;

pub const UNKNOWN_LABEL: &str = "Unknown";
pub const ERROR_LABEL: &str = "Error";
pub const UNKNOWN_TIP: &str = "Could not classify the image. Please try a clearer image or a different item.";
pub const ERROR_TIP: &str = "An error occurred during classification.";

/// Confidence as a percentage with two decimals, or `N/A` for sentinel results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    Percent(f64),
    NotAvailable,
}

impl Confidence {
    /// `probability * 100`, rounded half away from zero to two decimals.
    pub fn from_probability(probability: f32) -> Self {
        if !probability.is_finite() {
            return Confidence::NotAvailable;
        }
        let percent = probability as f64 * 100.0;
        Confidence::Percent((percent * 100.0).round() / 100.0)
    }

    pub fn percent(&self) -> Option<f64> {
        match self {
            Confidence::Percent(p) => Some(*p),
            Confidence::NotAvailable => None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Percent(p) => write!(f, "{:.2}", p),
            Confidence::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How a classification attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Classified,
    /// The classifier answered with an empty list
    Inconclusive,
    /// The classifier call failed
    Failed,
}

/// What the user sees after one classification attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// First comma-separated segment of the top label
    pub class_name: String,
    pub confidence: Confidence,
    pub tip: String,
    pub outcome: Outcome,
}

impl PredictionResult {
    pub fn unknown() -> Self {
        Self {
            class_name: UNKNOWN_LABEL.to_string(),
            confidence: Confidence::NotAvailable,
            tip: UNKNOWN_TIP.to_string(),
            outcome: Outcome::Inconclusive,
        }
    }

    pub fn error() -> Self {
        Self {
            class_name: ERROR_LABEL.to_string(),
            confidence: Confidence::NotAvailable,
            tip: ERROR_TIP.to_string(),
            outcome: Outcome::Failed,
        }
    }
}

/// A result plus the fact drawn for it. Only classified results carry a fact.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub result: PredictionResult,
    pub fact: Option<Fact>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Running,
    Success,
    Error,
}

/// Why a classification request was silently declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declined {
    ClassifierUnavailable,
    NoImage,
    Busy,
}

impl fmt::Display for Declined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Declined::ClassifierUnavailable => f.write_str("classifier is not ready"),
            Declined::NoImage => f.write_str("no image loaded"),
            Declined::Busy => f.write_str("a classification is already running"),
        }
    }
}

/// A started classification: the handle and pixels it will run on.
pub struct ClassificationTask {
    classifier: Arc<dyn ImageClassifier>,
    image: Option<Arc<DynamicImage>>,
}

impl ClassificationTask {
    /// Runs the classifier on the blocking pool.
    pub async fn run(self) -> Result<Vec<Prediction>, ClassifierError> {
        let Some(image) = self.image else {
            return Err(ClassifierError::ValidationError("Image could not be decoded".into()));
        };
        let classifier = self.classifier;
        tokio::task::spawn_blocking(move || classifier.classify(&image))
            .await
            .map_err(|e| ClassifierError::PredictionError(format!("Classifier task aborted: {}", e)))?
    }
}

/// Drives the classifier and turns its ranked output into a [`PredictionResult`].
#[derive(Debug, Clone)]
pub struct ClassificationPipeline {
    mapper: AdvisoryMapper,
    facts: FactProvider,
    state: PipelineState,
}

impl Default for ClassificationPipeline {
    fn default() -> Self {
        Self::new(AdvisoryMapper::default(), FactProvider::default())
    }
}

impl ClassificationPipeline {
    pub fn new(mapper: AdvisoryMapper, facts: FactProvider) -> Self {
        Self {
            mapper,
            facts,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PipelineState::Running
    }

    pub fn mapper(&self) -> &AdvisoryMapper {
        &self.mapper
    }

    /// Moves `Success`/`Error` back to `Idle` when the user does something else.
    pub fn reset(&mut self) {
        if !self.is_running() {
            self.state = PipelineState::Idle;
        }
    }

    /// Checks preconditions and enters `Running`.
    pub fn begin(
        &mut self,
        classifier: Option<Arc<dyn ImageClassifier>>,
        image: Option<&ImageAsset>,
    ) -> Result<ClassificationTask, Declined> {
        if self.is_running() {
            return Err(Declined::Busy);
        }
        let classifier = classifier.ok_or(Declined::ClassifierUnavailable)?;
        let image = image.ok_or(Declined::NoImage)?;

        self.state = PipelineState::Running;
        Ok(ClassificationTask {
            classifier,
            image: image.decoded().cloned(),
        })
    }

    /// Leaves `Running` with the interpreted outcome.
    pub fn finish(&mut self, outcome: Result<Vec<Prediction>, ClassifierError>) -> Classification {
        let classification = self.interpret(outcome);
        self.state = match classification.result.outcome {
            Outcome::Failed => PipelineState::Error,
            Outcome::Classified | Outcome::Inconclusive => PipelineState::Success,
        };
        classification
    }

    /// `begin`, `run` and `finish` in one call.
    pub async fn classify(
        &mut self,
        classifier: Option<Arc<dyn ImageClassifier>>,
        image: Option<&ImageAsset>,
    ) -> Result<Classification, Declined> {
        let task = self.begin(classifier, image)?;
        let outcome = task.run().await;
        Ok(self.finish(outcome))
    }

    /// Turns raw classifier output into a result. Pure apart from the fact draw.
    pub fn interpret(&self, outcome: Result<Vec<Prediction>, ClassifierError>) -> Classification {
        let predictions = match outcome {
            Ok(predictions) => predictions,
            Err(e) => {
                log::error!("Error classifying image: {}", e);
                return Classification {
                    result: PredictionResult::error(),
                    fact: None,
                };
            }
        };

        let Some(top) = predictions.first() else {
            return Classification {
                result: PredictionResult::unknown(),
                fact: None,
            };
        };
        log::debug!("Predictions: {:?}", predictions);

        let class_name = top.label.split(',').next().unwrap_or_default().to_string();
        let tip = self.mapper.map_to_tip(&top.label.to_lowercase()).to_string();

        Classification {
            result: PredictionResult {
                class_name,
                confidence: Confidence::from_probability(top.probability),
                tip,
                outcome: Outcome::Classified,
            },
            fact: self.facts.pick_fact(),
        }
    }
}
