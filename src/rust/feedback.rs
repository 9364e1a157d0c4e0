use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::ingest::ImageAsset;
use crate::pipeline::PredictionResult;

/// A user's disagreement with a classification, as handed to a [`FeedbackSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    /// Truncated data URL of the image, or `N/A`
    pub image_preview: String,
    pub predicted_label: String,
    /// Trimmed, never empty
    pub user_correction: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackRejected {
    #[error("correction text is empty")]
    EmptyCorrection,
    #[error("there is no result to correct")]
    NoResult,
}

/// Receives accepted feedback. Fire and forget: sinks report their own failures.
pub trait FeedbackSink: Send + Sync {
    fn submit(&self, record: FeedbackRecord);
}

/// Writes each record to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFeedbackSink;

impl FeedbackSink for LogFeedbackSink {
    fn submit(&self, record: FeedbackRecord) {
        log::info!(
            "Feedback submitted: image={} predicted={:?} correction={:?}",
            record.image_preview,
            record.predicted_label,
            record.user_correction
        );
    }
}

/// Appends each record as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesFeedbackSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesFeedbackSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &FeedbackRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl FeedbackSink for JsonLinesFeedbackSink {
    fn submit(&self, record: FeedbackRecord) {
        if let Err(e) = self.append(&record) {
            log::error!("Failed to write feedback to {:?}: {}", self.path, e);
        }
    }
}

impl FeedbackSink for mpsc::UnboundedSender<FeedbackRecord> {
    fn submit(&self, record: FeedbackRecord) {
        if self.send(record).is_err() {
            log::warn!("Feedback receiver dropped, record discarded");
        }
    }
}

/// The open/closed state and text of the correction form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackForm {
    pub open: bool,
    pub correction: String,
}

/// Collects a correction against the current result and forwards it to a sink.
#[derive(Debug, Clone, Default)]
pub struct FeedbackCollector {
    form: FeedbackForm,
}

impl FeedbackCollector {
    pub fn form(&self) -> &FeedbackForm {
        &self.form
    }

    pub fn open(&mut self) {
        self.form.open = true;
    }

    pub fn set_correction(&mut self, text: impl Into<String>) {
        self.form.correction = text.into();
    }

    /// Closes the form and clears its text.
    pub fn reset(&mut self) {
        self.form = FeedbackForm::default();
    }

    pub fn cancel(&mut self) {
        self.reset();
    }

    /// Builds the record for a correction without touching any state.
    pub fn build_record(
        correction: &str,
        result: Option<&PredictionResult>,
        image: Option<&ImageAsset>,
    ) -> Result<FeedbackRecord, FeedbackRejected> {
        let correction = correction.trim();
        if correction.is_empty() {
            return Err(FeedbackRejected::EmptyCorrection);
        }
        let result = result.ok_or(FeedbackRejected::NoResult)?;

        Ok(FeedbackRecord {
            image_preview: image.map(ImageAsset::preview).unwrap_or_else(|| "N/A".to_string()),
            predicted_label: result.class_name.clone(),
            user_correction: correction.to_string(),
        })
    }

    /// Sends the form's correction to `sink` and resets the form.
    ///
    /// A rejected submission leaves the form as it was.
    pub fn submit(
        &mut self,
        result: Option<&PredictionResult>,
        image: Option<&ImageAsset>,
        sink: &dyn FeedbackSink,
    ) -> Result<(), FeedbackRejected> {
        let record = Self::build_record(&self.form.correction, result, image)?;
        sink.submit(record);
        self.reset();
        Ok(())
    }
}
