use std::sync::Arc;

use image::{DynamicImage, Rgb, RgbImage};
use tempfile::TempDir;
use wastewise::{
    parse_labels, BuiltinModel, ClassifierError, ClassifierLifecycle, ImageClassifier, InputFile,
    ModelManager, OnnxClassifier, Session, SessionConfig,
};

#[test]
fn test_builder_requires_a_model() {
    match OnnxClassifier::builder().build() {
        Err(ClassifierError::BuildError(_)) => {}
        other => panic!("expected build error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_builder_rejects_zero_top_k() {
    assert!(matches!(
        OnnxClassifier::builder().with_top_k(0),
        Err(ClassifierError::ValidationError(_))
    ));
}

#[test]
fn test_builder_rejects_missing_files() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let model = temp_dir.path().join("missing.onnx");
    let labels = temp_dir.path().join("labels.txt");
    std::fs::write(&labels, "bottle\n")?;

    let outcome = OnnxClassifier::builder().with_custom_model(
        model.to_str().unwrap(),
        labels.to_str().unwrap(),
        None,
    );
    assert!(matches!(outcome, Err(ClassifierError::BuildError(_))));
    Ok(())
}

#[test]
fn test_builtin_model_must_be_downloaded() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let manager = ModelManager::new(temp_dir.path())?;

    let outcome = OnnxClassifier::builder().with_model_from(&manager, BuiltinModel::MobileNetV2);
    assert!(matches!(outcome, Err(ClassifierError::BuildError(_))));
    Ok(())
}

#[test]
fn test_synset_labels_are_cleaned() -> Result<(), ClassifierError> {
    let labels = parse_labels("n02823428 beer bottle\nn02747177 ashcan, trash can, garbage can\n\n")?;
    assert_eq!(labels, vec!["beer bottle", "ashcan, trash can, garbage can"]);
    Ok(())
}

fn downloaded_classifier() -> Result<OnnxClassifier, Box<dyn std::error::Error>> {
    let manager = ModelManager::new_default()?;
    Ok(OnnxClassifier::builder()
        .with_model_from(&manager, BuiltinModel::MobileNetV2)?
        .build()?)
}

#[tokio::test]
#[ignore = "requires downloaded MobileNetV2 weights"]
async fn test_mobilenet_returns_ranked_predictions() -> Result<(), Box<dyn std::error::Error>> {
    ModelManager::new_default()?
        .ensure_model_downloaded(BuiltinModel::MobileNetV2)
        .await?;
    let classifier = downloaded_classifier()?;
    let info = classifier.info();
    assert_eq!(info.num_classes, 1000);
    assert_eq!(info.top_k, 3);

    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([200, 200, 200])));
    let predictions = classifier.classify(&image)?;
    assert_eq!(predictions.len(), 3);
    assert!(predictions.windows(2).all(|w| w[0].probability >= w[1].probability));
    assert!(predictions.iter().all(|p| (0.0..=1.0).contains(&p.probability)));
    Ok(())
}

#[tokio::test]
#[ignore = "requires downloaded MobileNetV2 weights"]
async fn test_mobilenet_session_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    ModelManager::new_default()?
        .ensure_model_downloaded(BuiltinModel::MobileNetV2)
        .await?;
    let classifier: Arc<dyn ImageClassifier> = Arc::new(downloaded_classifier()?);
    let mut session = Session::with_lifecycle(SessionConfig::default(), ClassifierLifecycle::ready(classifier));

    let mut bytes = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([30, 90, 160])))
        .write_to(&mut bytes, image::ImageFormat::Png)?;
    session.ingest(Some(InputFile::new("blue.png", "image/png", bytes.into_inner()))).await?;

    let result = session.classify().await.ok_or("classification declined")?;
    assert!(!result.class_name.is_empty());
    assert!(!result.class_name.contains(','));
    Ok(())
}
