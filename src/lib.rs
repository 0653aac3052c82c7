// speaker_recorder: records the default speaker's output to WAV files
// Copyright (C) 2023, David Fisher
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

mod audio_device;
mod config;
mod constants;
mod convert;
mod cpal_device;
mod error;
mod recorder;
mod session;
mod utils;
mod wav_writer;

#[cfg(test)]
mod mock_device;
#[cfg(test)]
pub mod test_utils;

pub use audio_device::{DeviceInfo, LoopbackDevice, RawBlock, detect_supported_rates};
pub use config::AppConfig;
pub use constants::*;
pub use convert::to_pcm16;
pub use cpal_device::CpalLoopbackDevice;
pub use error::RecorderError;
pub use recorder::{Recorder, RecorderCommand, RecorderEvent, RecorderOptions};
pub use session::{
    CaptureProfile, CaptureRequest, CaptureSession, CaptureSettings, Controls, SavedRecording,
    SessionOutcome, SessionState, SharedState,
};
pub use utils::{TimestampPrecision, recording_file_name, resolve_output_path, unique_path};
pub use wav_writer::write_wav;

#[cfg(test)]
pub use mock_device::MockLoopbackDevice;
