use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::models::{BuiltinModel, ModelInfo};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Download of {url} failed with HTTP status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Local cache of classifier weights and label files.
#[derive(Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        if let Ok(path) = env::var("WASTEWISE_CACHE") {
            return PathBuf::from(path).join("models");
        }

        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("wastewise").join("models");
        }

        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("wastewise").join("models");
        }

        env::temp_dir().join("wastewise").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn get_model_path(&self, model: BuiltinModel) -> PathBuf {
        let info = model.get_model_info();
        self.models_dir.join(info.name).join("model.onnx")
    }

    pub fn get_labels_path(&self, model: BuiltinModel) -> PathBuf {
        let info = model.get_model_info();
        self.models_dir.join(info.name).join("labels.txt")
    }

    pub fn is_model_downloaded(&self, model: BuiltinModel) -> bool {
        let model_path = self.get_model_path(model);
        let labels_path = self.get_labels_path(model);
        log::debug!("Model path: {:?} (exists: {})", model_path, model_path.exists());
        log::debug!("Labels path: {:?} (exists: {})", labels_path, labels_path.exists());
        model_path.exists() && labels_path.exists()
    }

    pub async fn download_model(&self, model: BuiltinModel) -> Result<(), ModelError> {
        let info = model.get_model_info();
        let _lock = self.download_lock.lock().await;

        let model_dir = self.models_dir.join(&info.name);
        log::info!("Creating model directory at {:?}", model_dir);
        fs::create_dir_all(&model_dir)?;

        let model_path = self.get_model_path(model);
        let model_result = self
            .fetch_if_needed(&info.model_url, &model_path, info.model_hash.as_deref(), "model")
            .await;

        let labels_path = self.get_labels_path(model);
        let labels_result = self
            .fetch_if_needed(&info.labels_url, &labels_path, info.labels_hash.as_deref(), "labels")
            .await;

        match (model_result, labels_result) {
            (Ok(()), Ok(())) => {
                log::info!("Model and labels ready to use");
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                log::error!("Failed to set up {:?}: {}", model, e);
                let _ = self.remove_download(model);
                Err(e)
            }
        }
    }

    async fn fetch_if_needed(
        &self,
        url: &str,
        path: &Path,
        expected_hash: Option<&str>,
        file_type: &str,
    ) -> Result<(), ModelError> {
        if path.exists() {
            log::info!("{} file exists at {:?}, verifying...", file_type, path);
            if self.verify_file(path, expected_hash)? {
                return Ok(());
            }
            log::warn!("{} file verification failed, redownloading", file_type);
        }
        self.download_and_verify_file(url, path, expected_hash, file_type).await
    }

    fn verify_file(&self, path: &Path, expected_hash: Option<&str>) -> Result<bool, ModelError> {
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        match expected_hash {
            Some(expected) => {
                log::debug!("{:?}: calculated {}, expected {}", path, hash, expected);
                Ok(hash == expected)
            }
            None => {
                log::info!("{:?} has no pinned digest (sha256 {})", path, hash);
                Ok(true)
            }
        }
    }

    pub fn verify_model(&self, model: BuiltinModel) -> Result<bool, ModelError> {
        let info = model.get_model_info();
        let model_path = self.get_model_path(model);
        let labels_path = self.get_labels_path(model);

        if !model_path.exists() || !labels_path.exists() {
            log::info!("One or both model files do not exist");
            return Ok(false);
        }

        let model_ok = self.verify_file(&model_path, info.model_hash.as_deref())?;
        let labels_ok = self.verify_file(&labels_path, info.labels_hash.as_deref())?;
        log::info!("Verification results: model={}, labels={}", model_ok, labels_ok);

        Ok(model_ok && labels_ok)
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: Option<&str>,
        file_type: &str,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let response = reqwest::get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(expected) = expected_hash {
            let hash = sha256_hex(&bytes);
            if hash != expected {
                log::error!("{} hash mismatch: expected {}, got {}", file_type, expected, hash);
                return Err(ModelError::HashMismatch {
                    file_type: file_type.to_string(),
                    expected: expected.to_string(),
                    actual: hash,
                });
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;

        if !self.verify_file(path, expected_hash)? {
            return Err(ModelError::VerificationFailed);
        }

        log::info!("{} file downloaded and verified successfully", file_type);
        Ok(())
    }

    pub fn remove_download(&self, model: BuiltinModel) -> Result<(), ModelError> {
        let model_path = self.get_model_path(model);
        let labels_path = self.get_labels_path(model);

        if model_path.exists() {
            fs::remove_file(&model_path)?;
        }
        if labels_path.exists() {
            fs::remove_file(&labels_path)?;
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure_model_downloaded(&self, model: BuiltinModel) -> Result<(), ModelError> {
        if !self.is_model_downloaded(model) {
            log::info!("Model {:?} not found, downloading...", model);
            self.download_model(model).await?;
        } else if !self.verify_model(model)? {
            log::info!("Model {:?} verification failed, re-downloading...", model);
            self.remove_download(model)?;
            self.download_model(model).await?;
        }
        Ok(())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
