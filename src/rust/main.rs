use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Parser;
use log::info;
use wastewise::{
    BuiltinModel, ClassifierError, FeedbackSink, ImageClassifier, IngestPolicy, InputFile,
    JsonLinesFeedbackSink, LifecycleState, LoadPolicy, LogFeedbackSink, ModelManager,
    OnnxClassifier, Session, SessionConfig,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Photo of the item to classify
    image: PathBuf,

    /// Force a fresh download of the model files
    #[arg(short, long)]
    fresh: bool,

    /// Only accept PNG, JPEG or GIF files up to 10 MiB
    #[arg(long)]
    strict: bool,

    /// Extra attempts if loading the model fails
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Number of ranked predictions requested from the model
    #[arg(long, default_value_t = 3)]
    top_k: usize,

    /// Correction to submit if the prediction is wrong
    #[arg(long)]
    feedback: Option<String>,

    /// Append feedback as JSON lines to this file instead of logging it
    #[arg(long)]
    feedback_log: Option<PathBuf>,

    /// Print the final session state as JSON
    #[arg(long)]
    json: bool,
}

async fn ensure_model_downloaded(manager: &ModelManager, fresh: bool) -> anyhow::Result<()> {
    let model = BuiltinModel::MobileNetV2;

    if fresh {
        info!("Fresh download requested - removing any existing model files...");
        manager.remove_download(model)?;
    }
    manager
        .ensure_model_downloaded(model)
        .await
        .with_context(|| format!("could not fetch {:?} into {:?}", model, manager.models_dir()))?;
    Ok(())
}

fn build_classifier(manager: &ModelManager, top_k: usize) -> Result<Arc<dyn ImageClassifier>, ClassifierError> {
    let classifier = OnnxClassifier::builder()
        .with_top_k(top_k)?
        .with_model_from(manager, BuiltinModel::MobileNetV2)?
        .build()?;
    Ok(Arc::new(classifier))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("=== Starting WasteWise ===");
    let manager = ModelManager::new_default()?;
    ensure_model_downloaded(&manager, args.fresh).await?;

    let config = SessionConfig {
        ingest: if args.strict { IngestPolicy::strict() } else { IngestPolicy::permissive() },
        load: LoadPolicy::with_retries(args.retries, Duration::from_millis(500)),
        ..SessionConfig::default()
    };
    let mut session = Session::new(config);

    let start_time = Instant::now();
    let top_k = args.top_k;
    session.start_loading(move || {
        let manager = manager.clone();
        async move {
            tokio::task::spawn_blocking(move || build_classifier(&manager, top_k))
                .await
                .map_err(|e| ClassifierError::BuildError(format!("Loader task aborted: {}", e)))?
        }
    });

    // Decoding overlaps with the model load
    let file = InputFile::from_path(&args.image)
        .await
        .with_context(|| format!("could not read {:?}", args.image))?;
    session.ingest(Some(file)).await?;

    if let LifecycleState::Failed(reason) = session.lifecycle().wait_until_settled().await {
        bail!("classification is unavailable: {}", reason);
    }
    info!("Classifier ready after {:.2?}", start_time.elapsed());

    let classify_start = Instant::now();
    let Some(result) = session.classify().await else {
        bail!("classification was declined");
    };
    info!("Classification took {:.2?}", classify_start.elapsed());

    if let Some(image) = session.image() {
        let meta = image.metadata();
        println!("Image: {} ({} KB)", meta.file_name, meta.size_kb());
        if let Some(dimensions) = meta.dimensions {
            println!("Dimensions: {}", dimensions);
        }
    }
    println!("Prediction: {}", result.class_name);
    println!("Confidence: {}{}", result.confidence, if result.confidence.percent().is_some() { "%" } else { "" });
    println!("Tip: {}", result.tip);
    if let Some(fact) = session.fact() {
        println!("Did you know? {}", fact);
    }

    if let Some(correction) = args.feedback {
        let sink: Box<dyn FeedbackSink> = match args.feedback_log {
            Some(path) => Box::new(JsonLinesFeedbackSink::new(path)),
            None => Box::new(LogFeedbackSink),
        };
        session.open_feedback();
        session.set_correction(correction);
        match session.submit_feedback(sink.as_ref()) {
            Ok(()) => println!("Thanks, your correction was recorded."),
            Err(e) => eprintln!("Feedback not sent: {}", e),
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    }

    Ok(())
}
