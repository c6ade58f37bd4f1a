//! Application entry point — Finesse Bank video loan application.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Build the media backend (camera + microphone) and the GStreamer
//!    encoder backend (degrades to a stub when GStreamer is unavailable).
//! 5. Create the wizard channels (`command`, `update`, `flow event`).
//! 6. Spawn the wizard controller on the tokio runtime.
//! 7. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use eframe::egui;
use loanbooth::{
    app::LoanBoothApp,
    capture::{CaptureFlow, CaptureSpec, FlowEvent},
    config::{AppConfig, AppPaths},
    documents::{DocumentService, MockDocumentService},
    eligibility::{EligibilityService, MockEligibilityService, MoreInfoFallback},
    media::{MediaBackend, SessionManager, SystemBackend},
    record::{
        EncoderBackend, EncoderOptions, GstEncoderBackend, NullEncoderBackend,
        RecorderController,
    },
    wizard::{WizardCommand, WizardController, WizardUpdate},
};

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_inner_size([1080.0, 720.0])
        .with_min_inner_size([800.0, 560.0])
        .with_title("Finesse Bank — Video Loan Application");

    if let Some((x, y)) = config.ui.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Video loan application starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Hardware-facing backends. The encoder degrades to a stub when
    //    GStreamer is missing so the rest of the wizard still launches; the
    //    capture step then surfaces a skippable error instead of recording.
    let media: Arc<dyn MediaBackend> = Arc::new(SystemBackend::new(config.camera.clone()));

    let encoder: Arc<dyn EncoderBackend> = match GstEncoderBackend::new() {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            log::warn!("GStreamer unavailable ({e}); video recording disabled");
            Arc::new(NullEncoderBackend)
        }
    };

    let documents: Arc<dyn DocumentService> = Arc::new(MockDocumentService::new(
        Duration::from_millis(config.processing.document_delay_ms),
    ));
    let eligibility: Arc<dyn EligibilityService> =
        Arc::new(MoreInfoFallback::new(Arc::new(MockEligibilityService::new(
            Duration::from_millis(config.processing.decision_delay_ms),
        ))));

    // 5. Channel setup
    let (command_tx, command_rx) = mpsc::channel::<WizardCommand>(16);
    let (update_tx, update_rx) = mpsc::channel::<WizardUpdate>(64);
    let (flow_tx, flow_rx) = mpsc::channel::<FlowEvent>(64);

    // 6. Capture flow + wizard controller on the tokio runtime
    let recorder = RecorderController::new(
        Arc::clone(&encoder),
        EncoderOptions {
            bitrate_kbps: config.recorder.bitrate_kbps,
            keyframe_interval: config.recorder.keyframe_interval,
        },
    );
    let flow = CaptureFlow::new(
        CaptureSpec {
            countdown_secs: config.recorder.countdown_secs,
            ..CaptureSpec::default()
        },
        SessionManager::new(media),
        recorder,
        flow_tx,
    );

    let artifacts_dir = config
        .ui
        .save_artifacts
        .then(|| AppPaths::new().applications_dir);

    let controller = WizardController::new(
        flow,
        flow_rx,
        command_rx,
        update_tx,
        documents,
        eligibility,
        config.recorder.countdown_secs,
        artifacts_dir,
    );
    rt.spawn(controller.run());

    // 7. Build the egui app and run it (blocks until the window is closed)
    let app = LoanBoothApp::new(command_tx, update_rx);
    let options = native_options(&config);

    eframe::run_native(
        "Finesse Bank Loan Application",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}
