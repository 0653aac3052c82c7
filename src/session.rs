//! Per-recording state: what the session looks like to a UI, how capture
//! settings are derived, and the buffer a session owns until it is saved.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::audio_device::DeviceInfo;
use crate::constants::{
    FIXED_BLOCK_FRAMES, FIXED_CHANNELS, FIXED_PROGRESS_INTERVAL, FIXED_SAMPLE_RATE,
    MAX_RECORD_CHANNELS, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE,
};
use crate::error::RecorderError;
use crate::utils::{TimestampPrecision, resolve_output_path};
use crate::wav_writer::write_wav;

/// Lifecycle of a recording: `Idle → Recording → Saving → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Recording = 1,
    Saving = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Recording,
            2 => SessionState::Saving,
            _ => SessionState::Idle,
        }
    }

    /// Which controls a front end should offer in this state.
    pub fn controls(self) -> Controls {
        match self {
            SessionState::Idle => Controls {
                start_enabled: true,
                stop_enabled: false,
                settings_enabled: true,
            },
            SessionState::Recording => Controls {
                start_enabled: false,
                stop_enabled: true,
                settings_enabled: false,
            },
            SessionState::Saving => Controls {
                start_enabled: false,
                stop_enabled: false,
                settings_enabled: false,
            },
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Saving => "saving",
        };
        f.write_str(label)
    }
}

/// Enabled/disabled flags for start, stop, and the rate selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub settings_enabled: bool,
}

/// Session state readable from any thread, written only by the worker.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub fn new() -> Self {
        SharedState(Arc::new(AtomicU8::new(SessionState::Idle as u8)))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// The two capture flavours the recorder supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureProfile {
    /// Rate picked from the device's supported list, up to stereo,
    /// one-second blocks.
    Selectable,
    /// 16 kHz mono, 1600-frame blocks, progress every tenth block.
    Fixed,
}

impl FromStr for CaptureProfile {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "selectable" => Ok(CaptureProfile::Selectable),
            "fixed" => Ok(CaptureProfile::Fixed),
            other => Err(RecorderError::Config(format!(
                "Invalid profile: '{}'. Valid options are: [\"selectable\", \"fixed\"]",
                other
            ))),
        }
    }
}

impl fmt::Display for CaptureProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureProfile::Selectable => f.write_str("selectable"),
            CaptureProfile::Fixed => f.write_str("fixed"),
        }
    }
}

/// What the caller asks for when starting a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Only honoured by the selectable profile.
    pub sample_rate: Option<u32>,
    /// Explicit destination; auto-named in the output dir when `None`.
    pub output_path: Option<PathBuf>,
}

/// Fully resolved parameters of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub profile: CaptureProfile,
    pub sample_rate: u32,
    pub channels: u16,
    pub block_frames: usize,
    /// Emit a progress update every this many blocks.
    pub progress_interval: usize,
    pub timestamp_precision: TimestampPrecision,
    pub output_dir: PathBuf,
    pub output_path: Option<PathBuf>,
}

impl CaptureSettings {
    pub fn resolve(
        profile: CaptureProfile,
        request: &CaptureRequest,
        device: &DeviceInfo,
        output_dir: &Path,
    ) -> Result<Self, RecorderError> {
        let output_path = request.output_path.clone();
        let output_dir = output_dir.to_path_buf();

        match profile {
            CaptureProfile::Selectable => {
                let sample_rate = match request.sample_rate {
                    Some(rate) => rate,
                    None => *device.supported_rates.first().ok_or_else(|| {
                        RecorderError::AudioDevice(format!(
                            "Device '{}' reports no usable sample rates",
                            device.name
                        ))
                    })?,
                };

                if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate)
                    || !device.supports_rate(sample_rate)
                {
                    return Err(RecorderError::UnsupportedSampleRate(sample_rate));
                }

                let channels = device.max_channels.clamp(1, MAX_RECORD_CHANNELS);

                Ok(CaptureSettings {
                    profile,
                    sample_rate,
                    channels,
                    block_frames: sample_rate as usize,
                    progress_interval: 1,
                    timestamp_precision: TimestampPrecision::Seconds,
                    output_dir,
                    output_path,
                })
            }
            CaptureProfile::Fixed => {
                if !device.supports_rate(FIXED_SAMPLE_RATE) {
                    return Err(RecorderError::UnsupportedSampleRate(FIXED_SAMPLE_RATE));
                }
                if let Some(rate) = request.sample_rate
                    && rate != FIXED_SAMPLE_RATE
                {
                    warn!(
                        "Fixed profile records at {} Hz, ignoring requested {} Hz",
                        FIXED_SAMPLE_RATE, rate
                    );
                }

                Ok(CaptureSettings {
                    profile,
                    sample_rate: FIXED_SAMPLE_RATE,
                    channels: FIXED_CHANNELS,
                    block_frames: FIXED_BLOCK_FRAMES,
                    progress_interval: FIXED_PROGRESS_INTERVAL,
                    timestamp_precision: TimestampPrecision::Millis,
                    output_dir,
                    output_path,
                })
            }
        }
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_frames as f64 / f64::from(self.sample_rate))
    }
}

/// A finished recording on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRecording {
    pub path: PathBuf,
    pub frames: u64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Capture error that ended the session early, if any.
    pub aborted: Option<String>,
}

impl SavedRecording {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / f64::from(self.sample_rate))
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Saved(SavedRecording),
    /// Nothing was captured, so no file was written.
    Empty { aborted: Option<String> },
}

/// One recording in progress. Owns its sample buffer; saving consumes it.
#[derive(Debug)]
pub struct CaptureSession {
    settings: CaptureSettings,
    blocks: Vec<Vec<i16>>,
    frames: u64,
    started_at: Instant,
}

impl CaptureSession {
    pub fn new(settings: CaptureSettings) -> Self {
        CaptureSession {
            settings,
            blocks: Vec::new(),
            frames: 0,
            started_at: Instant::now(),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Append a converted block. Empty blocks are skipped.
    /// Returns whether the block was kept.
    pub fn push_block(&mut self, block: Vec<i16>) -> bool {
        if block.is_empty() {
            return false;
        }
        self.frames += (block.len() / usize::from(self.settings.channels)) as u64;
        self.blocks.push(block);
        true
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether the block just appended should trigger a progress update.
    pub fn progress_due(&self) -> bool {
        let interval = self.settings.progress_interval.max(1);
        self.block_count() > 0 && self.block_count() % interval == 0
    }

    /// Write the captured audio and release the buffer.
    ///
    /// The buffer is dropped whether or not the write succeeds.
    pub fn save(self, aborted: Option<String>) -> Result<SessionOutcome, RecorderError> {
        if self.frames == 0 {
            info!("Session captured no audio, nothing to save");
            return Ok(SessionOutcome::Empty { aborted });
        }

        let settings = self.settings;
        let path = resolve_output_path(
            settings.output_path.as_deref(),
            &settings.output_dir,
            settings.timestamp_precision,
        );

        let frames = write_wav(&path, &self.blocks, settings.channels, settings.sample_rate)?;

        Ok(SessionOutcome::Saved(SavedRecording {
            path,
            frames,
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            aborted,
        }))
    }
}
