//! The loopback device interface the capture worker drives.
//!
//! Implementations wrap whatever the platform offers for recording the
//! signal sent to an output device. The worker only needs blocking,
//! fixed-size reads; how the samples arrive is up to the implementation.

use crate::constants::{COMMON_SAMPLE_RATES, FALLBACK_SAMPLE_RATES, MAX_RECORD_CHANNELS};
use crate::error::RecorderError;

/// One block of interleaved samples in the format the driver produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBlock {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I16(Vec<i16>),
}

impl RawBlock {
    /// Number of individual samples (not frames).
    pub fn len(&self) -> usize {
        match self {
            RawBlock::F32(s) => s.len(),
            RawBlock::F64(s) => s.len(),
            RawBlock::I16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A loopback-capable view of an output device.
pub trait LoopbackDevice {
    /// Human readable name of the output device being captured.
    fn name(&self) -> String;

    /// Maximum channel count the output device reports.
    fn max_channels(&self) -> u16;

    /// Whether the device accepts the given rate and channel count.
    fn supports(&self, sample_rate: u32, channels: u16) -> bool;

    /// Open the capture stream. Must be called before `read_block`.
    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<(), RecorderError>;

    /// Block until `frames` frames are available and return them.
    fn read_block(&mut self, frames: usize) -> Result<RawBlock, RecorderError>;

    /// Release the capture stream. Safe to call when not open.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Samples lost because the consumer fell behind.
    fn dropped_samples(&self) -> u64 {
        0
    }
}

/// Static facts about the captured device, probed once per worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub max_channels: u16,
    pub supported_rates: Vec<u32>,
}

impl DeviceInfo {
    pub fn probe<D: LoopbackDevice + ?Sized>(device: &D) -> Self {
        let max_channels = device.max_channels();
        let probe_channels = max_channels.clamp(1, MAX_RECORD_CHANNELS);
        DeviceInfo {
            name: device.name(),
            max_channels,
            supported_rates: detect_supported_rates(device, probe_channels),
        }
    }

    pub fn supports_rate(&self, sample_rate: u32) -> bool {
        self.supported_rates.contains(&sample_rate)
    }
}

/// Filter the common rate list down to what the device accepts.
///
/// Falls back to 44.1/48 kHz when the device rejects every rate, since some
/// drivers refuse all queries yet still open at their mix rate.
pub fn detect_supported_rates<D: LoopbackDevice + ?Sized>(device: &D, channels: u16) -> Vec<u32> {
    let rates: Vec<u32> = COMMON_SAMPLE_RATES
        .iter()
        .copied()
        .filter(|&rate| device.supports(rate, channels))
        .collect();

    if rates.is_empty() {
        log::warn!(
            "Device '{}' accepted none of the common sample rates, offering {:?}",
            device.name(),
            FALLBACK_SAMPLE_RATES
        );
        FALLBACK_SAMPLE_RATES.to_vec()
    } else {
        rates
    }
}
