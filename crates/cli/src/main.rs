use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use snakesight_core::detection::domain::detector::Detector;
use snakesight_core::detection::infrastructure::deferred_model_detector::{
    DeferredModelDetector, ModelSource,
};
use snakesight_core::detection::infrastructure::local_onnx_detector::LocalOnnxDetector;
use snakesight_core::detection::infrastructure::model_resolver;
use snakesight_core::detection::infrastructure::remote_api_detector::{
    RemoteApiDetector, RemoteConfig,
};
use snakesight_core::dispatch::dispatcher::{Dispatcher, Preference};
use snakesight_core::dispatch::error_classifier::{classify, ErrorCategory};
use snakesight_core::pipeline::annotate_image_use_case::AnnotateImageUseCase;
use snakesight_core::pipeline::annotate_video_use_case::AnnotateVideoUseCase;
use snakesight_core::shared::constants::{
    CLASS_NAMES, DEFAULT_MODEL_ID, INFERENCE_API_URL, LOCAL_MODEL_NAME, LOCAL_MODEL_URL,
};
use snakesight_core::video::domain::image_writer::ImageWriter;
use snakesight_core::video::domain::video_reader::VideoReader;
use snakesight_core::video::domain::video_writer::VideoWriter;
use snakesight_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use snakesight_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use snakesight_core::video::infrastructure::image_file_reader::{is_image_path, ImageFileReader};
use snakesight_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Snake detection and annotation for videos and images.
#[derive(Parser)]
#[command(name = "snakesight")]
struct Cli {
    /// Input video or image file.
    input: PathBuf,

    /// Output file.
    output: PathBuf,

    /// Detection back end: auto, api, or local.
    #[arg(long, default_value = "auto")]
    preference: String,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Roboflow API key for the hosted back end.
    #[arg(long, env = "ROBOFLOW_API_KEY", default_value = "")]
    api_key: String,

    /// Hosted model id (project/version).
    #[arg(long, env = "ROBOFLOW_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    model_id: String,

    /// Inference API base URL (for self-hosted inference servers).
    #[arg(long, default_value = INFERENCE_API_URL)]
    api_url: String,

    /// Path to a local ONNX model (skips the cached/downloaded default).
    #[arg(long)]
    local_model: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        if let Some(hint) = hint_for(classify(&e.to_string())) {
            eprintln!("{hint}");
        }
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let preference: Preference = cli.preference.parse()?;
    let dispatcher = build_dispatcher(&cli);

    if is_image_path(&cli.input) {
        run_image(&cli.input, &cli.output, dispatcher, preference)?;
    } else {
        run_video(&cli.input, &cli.output, dispatcher, preference)?;
    }

    Ok(())
}

fn run_image(
    input: &Path,
    output: &Path,
    dispatcher: Dispatcher,
    preference: Preference,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader: Box<dyn VideoReader> = Box::new(ImageFileReader::new());
    let writer: Box<dyn ImageWriter> = Box::new(ImageFileWriter::new());

    let mut use_case = AnnotateImageUseCase::new(reader, writer, dispatcher, preference);
    let report = use_case.execute(input, output)?;

    log::info!(
        "Found {} detection(s) via {}",
        report.detections.len(),
        report.method
    );
    log::info!("Output written to {}", report.output_path.display());
    Ok(())
}

fn run_video(
    input: &Path,
    output: &Path,
    dispatcher: Dispatcher,
    preference: Preference,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader: Box<dyn VideoReader> = Box::new(FfmpegReader::new());
    let writer: Box<dyn VideoWriter> = Box::new(FfmpegWriter::new());

    let mut use_case = AnnotateVideoUseCase::new(reader, writer, dispatcher, preference)
        .with_progress(Box::new(|current, total| {
            eprint!("\rProcessing frame {current}/{total}");
        }));
    let report = use_case.execute(input, output)?;
    eprintln!();

    let stats = &report.stats;
    match report.method {
        Some(method) => log::info!(
            "Annotated {}/{} frames, {} detection(s) via {} at {} fps",
            stats.processed_frames,
            stats.total_frames,
            stats.detections,
            method,
            stats.fps
        ),
        None => log::info!(
            "Annotated {}/{} frames",
            stats.processed_frames,
            stats.total_frames
        ),
    }
    log::info!("Output written to {}", report.output_path.display());
    Ok(())
}

fn build_dispatcher(cli: &Cli) -> Dispatcher {
    let remote: Box<dyn Detector> = Box::new(
        RemoteApiDetector::new(RemoteConfig {
            api_key: cli.api_key.clone(),
            model_id: cli.model_id.clone(),
            confidence: cli.confidence,
        })
        .with_endpoint(&cli.api_url),
    );

    // An explicit --local-model path is used as-is. Otherwise the default
    // artifact is resolved (cache, then download) only when the local back
    // end actually runs, so api-only and fallback-free runs never touch it.
    let local: Box<dyn Detector> = match cli.local_model {
        Some(ref path) => Box::new(LocalOnnxDetector::new(path, cli.confidence, CLASS_NAMES)),
        None => {
            let source: ModelSource = Box::new(|| {
                log::info!("Resolving model: {LOCAL_MODEL_NAME}");
                let path = model_resolver::resolve(
                    LOCAL_MODEL_NAME,
                    LOCAL_MODEL_URL,
                    None,
                    Some(Box::new(download_progress)),
                )?;
                eprintln!();
                Ok(path)
            });
            Box::new(DeferredModelDetector::new(source, cli.confidence, CLASS_NAMES))
        }
    };

    Dispatcher::new(remote, local)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    Ok(())
}

fn hint_for(category: ErrorCategory) -> Option<&'static str> {
    match category {
        ErrorCategory::AuthFailure => {
            Some("Check that your Roboflow API key is valid and has access to the model.")
        }
        ErrorCategory::ModelNotFound => {
            Some("Verify the model id, or pass --local-model with a valid ONNX file.")
        }
        ErrorCategory::QuotaExceeded => {
            Some("The hosted API ran out of credits. Try --preference local.")
        }
        ErrorCategory::NetworkError => Some(
            "Could not reach the inference API. Check your connection or try --preference local.",
        ),
        ErrorCategory::BothBackendsFailed => Some(
            "Both the hosted API and the local model failed. Run with RUST_LOG=warn to see the remote error.",
        ),
        ErrorCategory::Unknown => None,
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading snake detection model... {pct}%");
    } else {
        eprint!("\rDownloading snake detection model... {downloaded} bytes");
    }
}
