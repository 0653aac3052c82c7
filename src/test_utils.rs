use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use crate::recorder::{Recorder, RecorderEvent, RecorderOptions};
use crate::session::CaptureProfile;

/// Generate an interleaved f32 sine wave at half amplitude.
pub fn generate_test_audio_f32(channels: u16, frames: usize) -> Vec<f32> {
    (0..usize::from(channels) * frames)
        .map(|i| (i as f32 / 10.0).sin() * 0.5)
        .collect()
}

/// Summary of a WAV file as a standard reader sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavSummary {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub frames: u32,
}

pub fn read_wav_summary(path: &Path) -> WavSummary {
    let reader = hound::WavReader::open(path).expect("readable WAV file");
    let spec = reader.spec();
    WavSummary {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    }
}

pub fn read_wav_samples(path: &Path) -> Vec<i16> {
    hound::WavReader::open(path)
        .expect("readable WAV file")
        .into_samples::<i16>()
        .map(|s| s.expect("valid sample"))
        .collect()
}

/// List the `.wav` files in `dir`, sorted by name.
pub fn wav_files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("readable directory")
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "wav"))
        .collect();
    files.sort();
    files
}

pub fn options(profile: CaptureProfile, output_dir: &Path) -> RecorderOptions {
    RecorderOptions {
        profile,
        output_dir: output_dir.to_path_buf(),
    }
}

/// Wait for the first event matching `pred`, skipping others.
pub fn wait_for_event<F>(recorder: &Recorder, timeout: Duration, pred: F) -> Option<RecorderEvent>
where
    F: Fn(&RecorderEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match recorder.events().recv_timeout(remaining) {
            Ok(event) if pred(&event) => return Some(event),
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
        }
    }
}

/// Collect every event already queued.
pub fn drain_events(recorder: &Recorder) -> Vec<RecorderEvent> {
    recorder.events().try_iter().collect()
}
