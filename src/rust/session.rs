//! The session: one image, its latest result and fact, the feedback form,
//! and the classifier lifecycle, all behind explicit transitions.
//!
//! Every transition publishes a [`SessionSnapshot`] on a `watch` channel.
//! A display surface subscribes with [`Session::subscribe`] and renders
//! whatever the latest snapshot says.
//!
//! Invariant: a result and a fact only exist alongside the image they were
//! derived from. Starting an ingest or removing the image clears the image,
//! the result and the fact in the same transition, before any decode work is
//! awaited, so nothing can be classified until the new image lands.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::advisory::AdvisoryMapper;
use crate::classifier::{ClassifierError, ImageClassifier};
use crate::facts::{Fact, FactProvider};
use crate::feedback::{FeedbackCollector, FeedbackForm, FeedbackRejected, FeedbackSink};
use crate::ingest::{Dimensions, ImageAsset, ImageIngestor, ImageMetadata, IngestError, IngestPolicy, InputFile};
use crate::lifecycle::{ClassifierLifecycle, LoadPolicy, ModelStatus};
use crate::pipeline::{Classification, ClassificationPipeline, PipelineState, PredictionResult};

/// Everything a display surface needs to render the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub model: ModelStatus,
    pub image: Option<ImageMetadata>,
    pub pipeline: PipelineState,
    pub result: Option<PredictionResult>,
    pub fact: Option<Fact>,
    pub feedback: FeedbackForm,
}

impl SessionSnapshot {
    /// Whether a classify trigger should be enabled.
    pub fn can_classify(&self) -> bool {
        self.model == ModelStatus::Ready
            && self.image.is_some()
            && self.pipeline != PipelineState::Running
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub ingest: IngestPolicy,
    pub load: LoadPolicy,
    pub advisory: AdvisoryMapper,
    pub facts: FactProvider,
}

/// A started ingest whose synchronous clearing has already happened.
#[derive(Debug)]
pub struct IngestTicket {
    generation: u64,
    file: InputFile,
}

pub struct Session {
    lifecycle: ClassifierLifecycle,
    ingestor: ImageIngestor,
    pipeline: ClassificationPipeline,
    feedback: FeedbackCollector,
    image: Option<ImageAsset>,
    classification: Option<Classification>,
    // Bumped whenever the live image is replaced or removed
    generation: u64,
    updates: Arc<watch::Sender<SessionSnapshot>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let lifecycle = ClassifierLifecycle::new(config.load.clone());
        Self::with_lifecycle(config, lifecycle)
    }

    pub fn with_lifecycle(config: SessionConfig, lifecycle: ClassifierLifecycle) -> Self {
        let session = Self {
            lifecycle,
            ingestor: ImageIngestor::new(config.ingest),
            pipeline: ClassificationPipeline::new(config.advisory, config.facts),
            feedback: FeedbackCollector::default(),
            image: None,
            classification: None,
            generation: 0,
            updates: Arc::new(watch::channel(SessionSnapshot {
                model: ModelStatus::Unloaded,
                image: None,
                pipeline: PipelineState::Idle,
                result: None,
                fact: None,
                feedback: FeedbackForm::default(),
            }).0),
        };
        session.publish();
        session
    }

    pub fn lifecycle(&self) -> &ClassifierLifecycle {
        &self.lifecycle
    }

    pub fn image(&self) -> Option<&ImageAsset> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        self.classification.as_ref().map(|c| &c.result)
    }

    pub fn fact(&self) -> Option<&Fact> {
        self.classification.as_ref().and_then(|c| c.fact.as_ref())
    }

    pub fn feedback_form(&self) -> &FeedbackForm {
        self.feedback.form()
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            model: self.lifecycle.status(),
            image: self.image.as_ref().map(|asset| asset.metadata().clone()),
            pipeline: self.pipeline.state(),
            result: self.result().cloned(),
            fact: self.fact().cloned(),
            feedback: self.feedback.form().clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    /// Starts the one classifier load and mirrors its progress into snapshots.
    /// Must be called from within a tokio runtime.
    pub fn start_loading<F, Fut>(&self, loader: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Arc<dyn ImageClassifier>, ClassifierError>> + Send + 'static,
    {
        if !self.lifecycle.load(loader) {
            return false;
        }
        self.publish();

        let mut states = self.lifecycle.subscribe();
        let updates = Arc::clone(&self.updates);
        tokio::spawn(async move {
            loop {
                let state = states.borrow_and_update().clone();
                updates.send_modify(|snapshot| snapshot.model = state.status());
                if state.is_terminal() || states.changed().await.is_err() {
                    break;
                }
            }
        });
        true
    }

    /// Clears the image, result, fact and feedback form for a new file and
    /// returns a ticket for the decode. `None` for an absent file, which
    /// changes nothing.
    pub fn begin_ingest(&mut self, file: Option<InputFile>) -> Option<IngestTicket> {
        let Some(file) = file else {
            log::debug!("No file supplied, nothing to ingest");
            return None;
        };

        log::info!("Ingesting '{}' ({} bytes, {})", file.name, file.size(), file.mime_type);
        self.generation += 1;
        self.image = None;
        self.classification = None;
        self.feedback.reset();
        self.pipeline.reset();
        self.publish();

        Some(IngestTicket {
            generation: self.generation,
            file,
        })
    }

    /// Decodes the ticket's file, publishes the image, then publishes its
    /// dimensions once the probe finishes. Stale tickets are dropped.
    ///
    /// A file rejected by the ingest policy leaves the session without an
    /// image, since `begin_ingest` already dropped the previous one.
    pub async fn complete_ingest(&mut self, ticket: IngestTicket) -> Result<(), IngestError> {
        let generation = ticket.generation;
        let asset = match self.ingestor.decode(ticket.file).await {
            Ok(asset) => asset,
            Err(e) => {
                log::warn!("Rejected file: {}", e);
                return Err(e);
            }
        };
        if !self.apply_decoded(generation, asset) {
            return Ok(());
        }

        let dimensions = match &self.image {
            Some(asset) => self.ingestor.probe_dimensions(asset).await,
            None => None,
        };
        self.apply_dimensions(generation, dimensions);
        Ok(())
    }

    /// Replaces the live image with `file`. An absent file is a no-op
    /// and returns `Ok(false)`.
    pub async fn ingest(&mut self, file: Option<InputFile>) -> Result<bool, IngestError> {
        match self.begin_ingest(file) {
            Some(ticket) => self.complete_ingest(ticket).await.map(|_| true),
            None => Ok(false),
        }
    }

    fn apply_decoded(&mut self, generation: u64, asset: ImageAsset) -> bool {
        if generation != self.generation {
            log::debug!("Dropping decode for superseded image");
            return false;
        }
        self.image = Some(asset);
        self.classification = None;
        self.publish();
        true
    }

    fn apply_dimensions(&mut self, generation: u64, dimensions: Option<Dimensions>) {
        if generation != self.generation {
            return;
        }
        if let Some(asset) = self.image.as_mut() {
            asset.set_dimensions(dimensions);
            self.publish();
        }
    }

    /// Drops the image and everything derived from it in one transition.
    pub fn remove_image(&mut self) {
        self.generation += 1;
        self.image = None;
        self.classification = None;
        self.feedback.reset();
        self.pipeline.reset();
        self.publish();
    }

    /// Classifies the live image. Declines silently (returns `None`) when the
    /// classifier is not ready, there is no image, or a run is in progress.
    pub async fn classify(&mut self) -> Option<PredictionResult> {
        let task = match self.pipeline.begin(self.lifecycle.handle(), self.image.as_ref()) {
            Ok(task) => task,
            Err(reason) => {
                log::debug!("Classification declined: {}", reason);
                return None;
            }
        };
        self.classification = None;
        self.feedback.reset();
        self.publish();

        let outcome = task.run().await;
        let classification = self.pipeline.finish(outcome);
        let result = classification.result.clone();
        self.classification = Some(classification);
        self.publish();
        Some(result)
    }

    /// Opens the correction form. Only possible while there is a result.
    pub fn open_feedback(&mut self) -> bool {
        if self.classification.is_none() {
            return false;
        }
        self.feedback.open();
        self.publish();
        true
    }

    pub fn set_correction(&mut self, text: impl Into<String>) {
        self.feedback.set_correction(text);
        self.publish();
    }

    pub fn cancel_feedback(&mut self) {
        self.feedback.cancel();
        self.publish();
    }

    /// Hands the current correction to `sink`. Rejections leave the form untouched.
    pub fn submit_feedback(&mut self, sink: &dyn FeedbackSink) -> Result<(), FeedbackRejected> {
        let result = self.classification.as_ref().map(|c| &c.result);
        let outcome = self.feedback.submit(result, self.image.as_ref(), sink);
        match &outcome {
            Ok(()) => {
                log::info!("Feedback accepted");
                self.publish();
            }
            Err(reason) => log::debug!("Feedback rejected: {}", reason),
        }
        outcome
    }
}
