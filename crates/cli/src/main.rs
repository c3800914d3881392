use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use facewatch_core::config::profile::{Profile, TrackingMode};
use facewatch_core::config::profile_source::{
    InMemoryProfile, ProfileError, ProfileFile, ProfileHandle, ProfileSource,
};
use facewatch_core::detection::domain::face_detector::FaceDetector;
use facewatch_core::detection::infrastructure::bytetrack_tracker::ByteTracker;
use facewatch_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use facewatch_core::enrollment::enroll_face_use_case::EnrollFaceUseCase;
use facewatch_core::recognition::domain::feature_store::FeatureStore;
use facewatch_core::recognition::domain::match_notifier::MatchNotifier;
use facewatch_core::recognition::feature_refresher::{FeatureRefresher, RefresherHandle};
use facewatch_core::recognition::infrastructure::http_feature_source::HttpFeatureSource;
use facewatch_core::recognition::infrastructure::http_match_notifier::HttpMatchNotifier;
use facewatch_core::recognition::infrastructure::onnx_face_analyzer::OnnxFaceAnalyzer;
use facewatch_core::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, IMAGE_EXTENSIONS, TRACKER_MAX_LOST,
    YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use facewatch_core::shared::model_resolver;
use facewatch_core::tracking::domain::frame_annotator::FrameAnnotator;
use facewatch_core::tracking::enrichment_service::{EnrichmentContext, EnrichmentService};
use facewatch_core::tracking::infrastructure::overlay_annotator::OverlayAnnotator;
use facewatch_core::tracking::tracker_loop::TrackerLoop;
use facewatch_core::video::domain::image_writer::ImageWriter;
use facewatch_core::video::infrastructure::channel_broadcaster::ChannelBroadcaster;
use facewatch_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use facewatch_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Frames a viewer may fall behind before it starts missing frames.
const VIEWER_BUFFER: usize = 2;

/// Live face tracking and recognition.
#[derive(Parser)]
#[command(name = "facewatch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Track, recognise and annotate faces from the profile's camera until
    /// the profile switches the server off.
    Run {
        /// Profile JSON (default: <config dir>/facewatch/profile.json).
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Override the profile's tracking mode: single or multi.
        #[arg(long)]
        mode: Option<TrackingMode>,

        /// Keep the newest annotated frame in this image file.
        #[arg(long)]
        latest_frame: Option<PathBuf>,
    },
    /// Print the base64 feature of the single face in IMAGE, or "None".
    Enroll {
        /// Photo containing exactly one face.
        image: PathBuf,

        /// Name to enroll under (default: the image file stem).
        #[arg(long)]
        name: Option<String>,

        /// Profile JSON, used for model paths and detection confidence.
        #[arg(long)]
        profile: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Run {
            profile,
            mode,
            latest_frame,
        } => run_tracker(profile, mode, latest_frame),
        Command::Enroll {
            image,
            name,
            profile,
        } => run_enroll(&image, name, profile),
    }
}

fn run_tracker(
    profile_path: Option<PathBuf>,
    mode: Option<TrackingMode>,
    latest_frame: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile = ProfileHandle::open(open_profile_source(profile_path, mode))?;
    let settings = profile.current();

    let detector = build_detector(&settings, true)?;
    let analyzer = Arc::new(build_analyzer(&settings)?);
    if !analyzer.has_attribute_models() {
        log::warn!("Gender/age or liveness model not configured; attributes stay unresolved");
    }

    let store = FeatureStore::new();
    let refresher = start_refresher(&settings, store.clone(), profile.clone())?;

    let notifier: Arc<dyn MatchNotifier> = match &settings.notifier_url {
        Some(url) => Arc::new(HttpMatchNotifier::new(url.clone())?),
        None => Arc::new(|name: &str| log::info!("Recognised {name}")),
    };
    let enrichment = EnrichmentService::start(EnrichmentContext {
        analyzer,
        store,
        notifier,
        match_threshold: settings.match_threshold,
    })?;

    let annotator: Box<dyn FrameAnnotator> = match &settings.font_path {
        Some(path) => Box::new(OverlayAnnotator::from_font_file(path)?),
        None => Box::new(OverlayAnnotator::with_default_font()?),
    };

    let broadcaster = Arc::new(ChannelBroadcaster::new(VIEWER_BUFFER));
    let frame_writer = latest_frame
        .map(|path| spawn_frame_writer(&broadcaster, path))
        .transpose()?;

    let source = Box::new(FfmpegFrameSource::open(&settings.camera)?);
    let tracker = TrackerLoop::new(
        source,
        detector,
        annotator,
        broadcaster.clone(),
        enrichment,
        profile,
    );
    let outcome = tracker.run();

    drop(broadcaster);
    if let Some(handle) = frame_writer {
        let _ = handle.join();
    }
    if let Some(refresher) = refresher {
        refresher.stop();
    }

    match outcome {
        Ok(summary) => {
            log::info!("Stopped after {} frames", summary.frames);
            Ok(())
        }
        Err(e) if e.is_end_of_stream() => {
            log::info!("Camera stream ended");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn run_enroll(
    image: &Path,
    name: Option<String>,
    profile_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !image.exists() {
        return Err(format!("Image not found: {}", image.display()).into());
    }
    if !is_image(image) {
        return Err(format!("Not a supported image file: {}", image.display()).into());
    }
    let settings = open_profile_source(profile_path, None).load()?;
    let name = name.unwrap_or_else(|| {
        image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let detector = build_detector(&settings, false)?;
    let analyzer = Arc::new(build_analyzer(&settings)?);
    let mut use_case = EnrollFaceUseCase::new(detector, analyzer);
    let outcome = use_case.enroll_file(image, &name)?;

    log::info!("{} face(s) detected in {}", outcome.face_count(), image.display());
    println!("{}", outcome.payload().unwrap_or("None"));
    Ok(())
}

/// Applies a command-line mode override on top of every profile reload.
struct ModeOverride {
    inner: Box<dyn ProfileSource>,
    mode: TrackingMode,
}

impl ProfileSource for ModeOverride {
    fn load(&self) -> Result<Profile, ProfileError> {
        let mut profile = self.inner.load()?;
        profile.mode = self.mode;
        Ok(profile)
    }
}

fn open_profile_source(
    path: Option<PathBuf>,
    mode: Option<TrackingMode>,
) -> Arc<dyn ProfileSource> {
    let base: Box<dyn ProfileSource> = match path.or_else(ProfileFile::default_path) {
        Some(path) if path.exists() => {
            log::info!("Using profile {}", path.display());
            Box::new(ProfileFile::new(path))
        }
        Some(path) => {
            log::warn!("Profile {} not found, using defaults", path.display());
            Box::new(InMemoryProfile::default())
        }
        None => Box::new(InMemoryProfile::default()),
    };
    match mode {
        Some(mode) => Arc::new(ModeOverride { inner: base, mode }),
        None => Arc::from(base),
    }
}

/// Live sessions track ids across frames; still images report every box.
fn build_detector(
    settings: &Profile,
    tracked: bool,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let model_path = model_resolver::resolve_model(
        settings.models.detector.as_deref(),
        YOLO_MODEL_NAME,
        YOLO_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    let detector = if tracked {
        OnnxYoloDetector::new(
            &model_path,
            ByteTracker::new(TRACKER_MAX_LOST),
            settings.detection_confidence,
        )?
    } else {
        OnnxYoloDetector::without_tracking(&model_path, settings.detection_confidence)?
    };
    Ok(Box::new(detector))
}

fn build_analyzer(settings: &Profile) -> Result<OnnxFaceAnalyzer, Box<dyn std::error::Error>> {
    let embedding = model_resolver::resolve_model(
        settings.models.embedding.as_deref(),
        EMBEDDING_MODEL_NAME,
        EMBEDDING_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    let mut analyzer = OnnxFaceAnalyzer::new(&embedding)?;
    if let Some(path) = &settings.models.genderage {
        analyzer = analyzer.with_genderage(path)?;
    }
    if let Some(path) = &settings.models.liveness {
        analyzer = analyzer.with_liveness(path)?;
    }
    Ok(analyzer)
}

fn start_refresher(
    settings: &Profile,
    store: FeatureStore,
    profile: ProfileHandle,
) -> Result<Option<RefresherHandle>, Box<dyn std::error::Error>> {
    if !settings.refresh_enabled() {
        log::info!("Feature source disabled; recognising against an empty store");
        return Ok(None);
    }
    let source = Box::new(HttpFeatureSource::new()?);
    Ok(Some(FeatureRefresher::new(source, store, profile).spawn()?))
}

fn spawn_frame_writer(
    broadcaster: &ChannelBroadcaster,
    path: PathBuf,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    let frames = broadcaster.subscribe();
    std::thread::Builder::new()
        .name("latest-frame".into())
        .spawn(move || {
            let writer = ImageFileWriter::new();
            for frame in frames {
                if let Err(e) = writer.write(&path, &frame) {
                    log::warn!("Failed to write {}: {e}", path.display());
                }
            }
        })
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
