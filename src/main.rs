mod config;
mod debounce;
mod decode;
mod detect;
mod frame;
mod mjpeg;
mod signals;
mod sink;
mod slot;
mod source;
mod supervisor;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use config::Config;
use debounce::{DebounceGate, DEBOUNCE_PERIOD};
use decode::QrTagDecoder;
use detect::TagDetector;
use mjpeg::MjpegSource;
use sink::{Dispatcher, HaEventSink};
use slot::FrameSlot;
use supervisor::StreamSupervisor;

const TOKEN_ENV: &str = "SUPERVISOR_TOKEN";

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    let token = match std::env::var(TOKEN_ENV) {
        Ok(t) => t,
        Err(_) => {
            eprintln!("{TOKEN_ENV} is not set; cannot authenticate against the event API");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        stream = config.camera_rtsp_stream,
        device_id = config.tag_event_device_id,
        api = config.api.base_url,
        "starting cam-tag-scanner"
    );

    let sink = match HaEventSink::new(&config.api.base_url, token) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to build event sink");
            std::process::exit(1);
        }
    };
    let source = match MjpegSource::new() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to build video source");
            std::process::exit(1);
        }
    };
    let shutdown_signals = match signals::ShutdownSignals::install() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install signal handlers");
            std::process::exit(1);
        }
    };

    let slot = Arc::new(FrameSlot::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let detector = TagDetector::new(
        Arc::clone(&slot),
        QrTagDecoder,
        DebounceGate::new(DEBOUNCE_PERIOD),
        Dispatcher::new(sink, config.tag_event_device_id.clone()),
    );
    let detector_handle = tokio::spawn(detector.run());

    // The first SIGINT/SIGTERM requests shutdown: the supervisor observes
    // the watch, the detector is woken through the closed slot.
    {
        let slot = Arc::clone(&slot);
        tokio::spawn(async move {
            shutdown_signals.recv().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            slot.close();
        });
    }

    let supervisor = StreamSupervisor::new(
        source,
        config.camera_rtsp_stream.clone(),
        Arc::clone(&slot),
        shutdown_rx,
    );
    supervisor.run().await;

    // Covers supervisor exits that did not come through the signal task.
    slot.close();
    if let Err(e) = detector_handle.await {
        error!(error = %e, "detector task failed");
    }
    info!("exited gracefully");
}
