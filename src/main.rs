//! QR Scan CLI
//!
//! Scans a camera (or image files) until a QR code is decoded and prints
//! the value as `qrResult=<value>`.

use clap::Parser;
use qr_scan::{
    capture::{ready_provider, FileConfig, ImageFileProvider, ProviderFactory},
    decode::QrDecoder,
    metrics::ScanMetrics,
    permission::{DevicePermissions, PermissionGate},
    screen::{ConsoleNotifier, ScanScreen, ScreenDeps, QR_RESULT_KEY},
    session::{Backpressure, LogPreview},
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Scan a QR code and print its value.
#[derive(Debug, Parser)]
#[command(name = "qr-scan", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Camera device index.
    #[arg(short, long)]
    device: Option<u32>,

    /// Scan these image files instead of a camera.
    #[arg(short, long = "image", value_name = "FILE")]
    images: Vec<PathBuf>,

    /// Give up after this many seconds.
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Grant camera access without asking.
    #[arg(short = 'y', long)]
    yes: bool,

    /// Print the full result as TOML instead of `qrResult=<value>`.
    #[arg(long)]
    toml: bool,

    /// Print scan metrics to stderr when done.
    #[arg(long)]
    metrics: bool,

    /// List available cameras and exit.
    #[cfg(feature = "camera")]
    #[arg(long)]
    list_devices: bool,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("QR Scan v{}", qr_scan::VERSION);

    #[cfg(feature = "camera")]
    if args.list_devices {
        return list_devices();
    }

    let mut config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid configuration: {}", e);
                return ExitCode::from(2);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(device) = args.device {
        config.capture.device_id = device;
    }
    if let Some(timeout) = args.timeout {
        config.scan.timeout_secs = timeout;
    }
    if args.yes {
        config.scan.assume_permission = true;
    }
    if !args.images.is_empty() {
        // Every image must be examined, so the reader waits for the decoder.
        config.scan.backpressure = Backpressure::BlockProducer;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        return ExitCode::from(2);
    }

    let (provider, permissions) = match source(&args, &config) {
        Some(source) => source,
        None => {
            eprintln!("No camera support built in; pass --image or build with --features camera");
            return ExitCode::from(2);
        }
    };

    let metrics = match ScanMetrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            eprintln!("Failed to create metrics registry: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let decoder = match QrDecoder::spawn(config.scan.max_dimension) {
        Ok(decoder) => Arc::new(decoder),
        Err(e) => {
            eprintln!("Failed to start decoder: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let deps = ScreenDeps {
        permissions,
        provider,
        decoder,
        preview: Arc::new(LogPreview::new()),
        notifier: Arc::new(ConsoleNotifier),
        metrics: Arc::clone(&metrics),
    };
    let mut screen = match ScanScreen::new(config.capture.clone(), config.scan.clone(), deps) {
        Ok(screen) => screen,
        Err(e) => {
            eprintln!("Failed to start scan: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let handle = screen.handle();
    if let Err(e) = ctrlc::set_handler(move || handle.cancel()) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let result = screen.run();
    drop(screen);

    if args.metrics {
        match metrics.encode() {
            Ok(text) => eprint!("{}", text),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }

    if args.toml {
        match toml::to_string(&result) {
            Ok(text) => print!("{}", text),
            Err(e) => warn!("Failed to serialize result: {}", e),
        }
    } else if let Some(value) = &result.qr_result {
        println!("{}={}", QR_RESULT_KEY, value);
    }

    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        info!(reason = ?result.reason, "No code scanned");
        ExitCode::FAILURE
    }
}

type Source = (Arc<dyn ProviderFactory>, Arc<dyn PermissionGate>);

fn source(args: &Args, config: &FileConfig) -> Option<Source> {
    if !args.images.is_empty() {
        let provider = ImageFileProvider::new(args.images.iter().cloned());
        // Reading files needs no camera access.
        let permissions = DevicePermissions::new(None, true);
        return Some((ready_provider(Arc::new(provider)), Arc::new(permissions)));
    }
    camera_source(config)
}

#[cfg(feature = "camera")]
fn camera_source(config: &FileConfig) -> Option<Source> {
    use qr_scan::capture::{CameraError, CameraProvider, DeviceProvider};

    let factory: Arc<dyn ProviderFactory> =
        Arc::new(|| -> Result<Arc<dyn CameraProvider>, CameraError> {
            Ok(Arc::new(DeviceProvider::acquire()?))
        });
    let permissions = DevicePermissions::new(
        DevicePermissions::device_node(config.capture.device_id),
        config.scan.assume_permission,
    );
    Some((factory, Arc::new(permissions)))
}

#[cfg(not(feature = "camera"))]
fn camera_source(_config: &FileConfig) -> Option<Source> {
    None
}

#[cfg(feature = "camera")]
fn list_devices() -> ExitCode {
    match qr_scan::capture::list_devices() {
        Ok(devices) => {
            for device in devices {
                println!("{}\t{}", device.index, device.name);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to list cameras: {}", e);
            ExitCode::FAILURE
        }
    }
}
