use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, ImageReader};
use serde::Serialize;

/// Characters of the data URL kept in a feedback preview.
pub const PREVIEW_CHARS: usize = 50;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unsupported file type '{mime_type}'")]
    UnsupportedType { mime_type: String },
    #[error("File is {size} bytes, limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },
    #[error("Could not decode image: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A user-supplied file as it arrives from a picker or drop event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, guessing the MIME type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let mime_type = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type())
            .unwrap_or(FALLBACK_MIME);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Intrinsic pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} px", self.width, self.height)
    }
}

/// Descriptive facts about the live image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub file_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    /// Filled in by the dimension probe, after the image itself is available
    pub dimensions: Option<Dimensions>,
}

impl ImageMetadata {
    /// Size in kilobytes, rounded to two decimals.
    pub fn size_kb(&self) -> f64 {
        (self.size_bytes as f64 / 1024.0 * 100.0).round() / 100.0
    }
}

/// The one image a session works on.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    source: Arc<[u8]>,
    decoded: Option<Arc<DynamicImage>>,
    metadata: ImageMetadata,
}

impl ImageAsset {
    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// The decoded pixels, `None` when the bytes were not a readable image.
    pub fn decoded(&self) -> Option<&Arc<DynamicImage>> {
        self.decoded.as_ref()
    }

    pub(crate) fn set_dimensions(&mut self, dimensions: Option<Dimensions>) {
        self.metadata.dimensions = dimensions;
    }

    fn mime_or_fallback(&self) -> &str {
        if self.metadata.mime_type.is_empty() {
            FALLBACK_MIME
        } else {
            &self.metadata.mime_type
        }
    }

    /// The full image as a base64 `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_or_fallback(), STANDARD.encode(&self.source))
    }

    /// The first [`PREVIEW_CHARS`] characters of [`Self::data_url`] followed by `...`.
    pub fn preview(&self) -> String {
        // 60 bytes encode to 80 base64 chars, enough for any preview
        let head = &self.source[..self.source.len().min(60)];
        let partial = format!("data:{};base64,{}", self.mime_or_fallback(), STANDARD.encode(head));
        let truncated: String = partial.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", truncated)
    }
}

/// Which files the ingestor accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestPolicy {
    /// `None` accepts every MIME type
    pub allowed_mime_types: Option<Vec<String>>,
    pub max_size_bytes: Option<u64>,
    /// Reject files whose bytes do not decode instead of keeping them undecoded
    pub require_decodable: bool,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

impl IngestPolicy {
    /// Accept any file; an undecodable one fails later, at classification.
    pub fn permissive() -> Self {
        Self {
            allowed_mime_types: None,
            max_size_bytes: None,
            require_decodable: false,
        }
    }

    /// PNG, JPEG or GIF up to 10 MiB.
    pub fn strict() -> Self {
        Self {
            allowed_mime_types: Some(vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/gif".to_string(),
            ]),
            max_size_bytes: Some(10 * 1024 * 1024),
            require_decodable: true,
        }
    }
}

/// Validates and decodes user files into [`ImageAsset`]s.
#[derive(Debug, Clone, Default)]
pub struct ImageIngestor {
    policy: IngestPolicy,
}

impl ImageIngestor {
    pub fn new(policy: IngestPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &IngestPolicy {
        &self.policy
    }

    pub fn validate(&self, file: &InputFile) -> Result<(), IngestError> {
        if let Some(allowed) = &self.policy.allowed_mime_types {
            if !allowed.iter().any(|m| m.eq_ignore_ascii_case(&file.mime_type)) {
                return Err(IngestError::UnsupportedType {
                    mime_type: file.mime_type.clone(),
                });
            }
        }
        if let Some(max) = self.policy.max_size_bytes {
            if file.size() > max {
                return Err(IngestError::TooLarge { size: file.size(), max });
            }
        }
        Ok(())
    }

    /// Validates the file and decodes its pixels on the blocking pool.
    ///
    /// The returned asset has no dimensions yet; see [`Self::probe_dimensions`].
    pub async fn decode(&self, file: InputFile) -> Result<ImageAsset, IngestError> {
        self.validate(&file)?;

        let source: Arc<[u8]> = Arc::from(file.bytes);
        let bytes = Arc::clone(&source);
        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| IngestError::Decode(e.to_string()))
            .and_then(|r| r.map_err(|e| IngestError::Decode(e.to_string())));

        let decoded = match decoded {
            Ok(image) => Some(Arc::new(image)),
            Err(e) if self.policy.require_decodable => return Err(e),
            Err(e) => {
                log::warn!("Keeping '{}' undecoded: {}", file.name, e);
                None
            }
        };

        Ok(ImageAsset {
            metadata: ImageMetadata {
                file_name: file.name,
                size_bytes: source.len() as u64,
                mime_type: file.mime_type,
                dimensions: None,
            },
            source,
            decoded,
        })
    }

    /// Reads the intrinsic size from the image header, independently of the pixel decode.
    pub async fn probe_dimensions(&self, asset: &ImageAsset) -> Option<Dimensions> {
        let bytes = Arc::clone(&asset.source);
        let probed = tokio::task::spawn_blocking(move || {
            ImageReader::new(Cursor::new(&bytes[..]))
                .with_guessed_format()
                .ok()?
                .into_dimensions()
                .ok()
        })
        .await
        .ok()
        .flatten();

        probed.map(|(width, height)| Dimensions { width, height })
    }

    /// Decodes and probes a file in one go. An absent file is a no-op.
    pub async fn ingest(&self, file: Option<InputFile>) -> Result<Option<ImageAsset>, IngestError> {
        let Some(file) = file else {
            return Ok(None);
        };
        let mut asset = self.decode(file).await?;
        let dimensions = self.probe_dimensions(&asset).await;
        asset.set_dimensions(dimensions);
        Ok(Some(asset))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 200, 30])));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_absent_file_is_noop() {
        let ingestor = ImageIngestor::default();
        assert!(ingestor.ingest(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ingest_png_fills_metadata() {
        let ingestor = ImageIngestor::default();
        let bytes = png_bytes(12, 7);
        let size = bytes.len() as u64;
        let asset = ingestor
            .ingest(Some(InputFile::new("bottle.png", "image/png", bytes)))
            .await
            .unwrap()
            .unwrap();

        let meta = asset.metadata();
        assert_eq!(meta.file_name, "bottle.png");
        assert_eq!(meta.mime_type, "image/png");
        assert_eq!(meta.size_bytes, size);
        assert_eq!(meta.dimensions, Some(Dimensions { width: 12, height: 7 }));
        assert!(asset.decoded().is_some());
    }

    #[tokio::test]
    async fn test_decode_leaves_dimensions_pending() {
        let ingestor = ImageIngestor::default();
        let asset = ingestor
            .decode(InputFile::new("a.png", "image/png", png_bytes(3, 3)))
            .await
            .unwrap();
        assert!(asset.metadata().dimensions.is_none());
        assert_eq!(
            ingestor.probe_dimensions(&asset).await,
            Some(Dimensions { width: 3, height: 3 })
        );
    }

    #[tokio::test]
    async fn test_permissive_policy_keeps_undecodable_files() {
        let ingestor = ImageIngestor::default();
        let asset = ingestor
            .ingest(Some(InputFile::new("notes.txt", "text/plain", b"hello".to_vec())))
            .await
            .unwrap()
            .unwrap();
        assert!(asset.decoded().is_none());
        assert!(asset.metadata().dimensions.is_none());
    }

    #[tokio::test]
    async fn test_strict_policy_rejects() {
        let ingestor = ImageIngestor::new(IngestPolicy::strict());

        let wrong_type = ingestor
            .ingest(Some(InputFile::new("notes.txt", "text/plain", b"hello".to_vec())))
            .await;
        assert!(matches!(wrong_type, Err(IngestError::UnsupportedType { .. })));

        let too_big = ingestor
            .ingest(Some(InputFile::new("big.png", "image/png", vec![0; 10 * 1024 * 1024 + 1])))
            .await;
        assert!(matches!(too_big, Err(IngestError::TooLarge { .. })));

        let garbage = ingestor
            .ingest(Some(InputFile::new("fake.png", "image/png", b"not a png".to_vec())))
            .await;
        assert!(matches!(garbage, Err(IngestError::Decode(_))));
    }

    #[test]
    fn test_size_kb_rounds_to_two_decimals() {
        let meta = ImageMetadata {
            file_name: "x".into(),
            size_bytes: 1500,
            mime_type: "image/png".into(),
            dimensions: None,
        };
        assert_eq!(meta.size_kb(), 1.46);
    }

    #[test]
    fn test_dimensions_display() {
        assert_eq!(Dimensions { width: 640, height: 480 }.to_string(), "640 x 480 px");
    }

    #[tokio::test]
    async fn test_preview_is_prefix_of_data_url() {
        let ingestor = ImageIngestor::default();
        let asset = ingestor
            .decode(InputFile::new("a.png", "image/png", png_bytes(20, 20)))
            .await
            .unwrap();
        let preview = asset.preview();
        let data_url = asset.data_url();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.len(), PREVIEW_CHARS + 3);
        assert!(data_url.starts_with(&preview[..PREVIEW_CHARS]));
        assert!(data_url.starts_with("data:image/png;base64,"));
    }
}
