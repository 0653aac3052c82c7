#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]

use std::env;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use speaker_recorder::{
    AppConfig, CONFIG_FILE_NAME, CaptureRequest, CpalLoopbackDevice, Recorder, RecorderEvent,
    RecorderOptions, SavedRecording, SessionOutcome, SessionState,
};

const EVENT_POLL: Duration = Duration::from_millis(200);

fn print_saved(saved: &SavedRecording) {
    println!(
        "Saved {:.1}s ({} Hz, {} ch) to {}",
        saved.duration().as_secs_f64(),
        saved.sample_rate,
        saved.channels,
        saved.path.display()
    );
    if let Some(reason) = &saved.aborted {
        eprintln!("Recording ended early: {reason}");
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let list_rates = args.iter().any(|a| a == "--list-rates");

    // Check for configuration file
    let config_path = Path::new(CONFIG_FILE_NAME);
    if !config_path.exists() {
        println!("Configuration file not found, creating default at {CONFIG_FILE_NAME}");
        let default_config = AppConfig::default();
        if let Err(e) = default_config.create_config_file(CONFIG_FILE_NAME) {
            eprintln!("Failed to create configuration file: {e}");
        }
    }

    let config = AppConfig::load();

    let default_filter = if config.get_debug() { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let options = match RecorderOptions::from_config(&config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(2);
        }
    };

    let recorder = match Recorder::spawn(CpalLoopbackDevice::open_default, options) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to open speaker for capture: {e}");
            process::exit(1);
        }
    };

    let info = recorder.device_info();
    println!("Speaker: {} ({} channels max)", info.name, info.max_channels);
    let rates: Vec<String> = info.supported_rates.iter().map(u32::to_string).collect();
    println!("Supported sample rates: {}", rates.join(", "));

    if list_rates {
        recorder.shutdown();
        return;
    }

    // Set up signal handling for clean shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if r.swap(false, Ordering::SeqCst) {
            println!("Stopping...");
        }
    }) {
        eprintln!("Error setting Ctrl-C handler: {e}");
        process::exit(1);
    }

    let request = CaptureRequest {
        sample_rate: config.get_sample_rate(),
        output_path: config.get_output_file(),
    };

    let settings = match recorder.start(request) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to start recording: {e}");
            recorder.shutdown();
            process::exit(1);
        }
    };
    println!(
        "Recording {} profile at {} Hz, {} ch, {:.1}s blocks",
        settings.profile,
        settings.sample_rate,
        settings.channels,
        settings.block_duration().as_secs_f64()
    );

    let duration_secs = config.get_duration();
    if duration_secs > 0 {
        println!("Recording for {duration_secs} seconds...");
    }
    println!("Press Ctrl+C to stop recording");

    let started = Instant::now();
    let limit = Duration::from_secs(duration_secs);
    let mut exit_code = 0;
    let mut finished = false;

    while running.load(Ordering::SeqCst) {
        if duration_secs > 0 && started.elapsed() >= limit {
            break;
        }

        match recorder.events().recv_timeout(EVENT_POLL) {
            Ok(RecorderEvent::Progress { elapsed, .. }) => {
                println!("Recorded {:.1}s", elapsed.as_secs_f64());
            }
            Ok(RecorderEvent::CaptureFailed(reason)) => {
                eprintln!("Capture failed: {reason}");
                exit_code = 1;
            }
            Ok(RecorderEvent::Saved(saved)) => {
                print_saved(&saved);
                finished = true;
                break;
            }
            Ok(RecorderEvent::SaveFailed(reason)) => {
                eprintln!("Failed to save recording: {reason}");
                exit_code = 1;
                finished = true;
                break;
            }
            Ok(RecorderEvent::NothingCaptured) => {
                println!("Nothing was captured, no file written");
                finished = true;
                break;
            }
            Ok(RecorderEvent::StateChanged(_)) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                eprintln!("Recorder stopped unexpectedly");
                exit_code = 1;
                finished = true;
                break;
            }
        }
    }

    if !finished {
        if recorder.state() == SessionState::Recording {
            println!("Stopping recording...");
        }
        // Also waits out a save already running after a capture failure
        match recorder.finish() {
            Ok(SessionOutcome::Saved(saved)) => {
                if saved.aborted.is_some() {
                    exit_code = 1;
                }
                print_saved(&saved);
            }
            Ok(SessionOutcome::Empty { aborted }) => {
                println!("Nothing was captured, no file written");
                if let Some(reason) = aborted {
                    eprintln!("Recording ended early: {reason}");
                    exit_code = 1;
                }
            }
            Err(e) => {
                eprintln!("Error finishing recording: {e}");
                exit_code = 1;
            }
        }
    }

    recorder.shutdown();
    process::exit(exit_code);
}
