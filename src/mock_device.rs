use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::audio_device::{LoopbackDevice, RawBlock};
use crate::error::RecorderError;

/// MockLoopbackDevice produces scripted blocks without audio hardware.
///
/// Every block is a constant `amplitude`. Scripting knobs:
/// - `block_limit`: after this many blocks, reads return empty blocks
///   (the recorder skips those), so a test can capture an exact amount
/// - `fail_after`: the read following this many good blocks fails
/// - `fail_open`: opening the stream fails
#[derive(Debug, Clone)]
pub struct MockLoopbackDevice {
    pub name: String,
    pub max_channels: u16,
    pub supported_rates: Vec<u32>,
    pub amplitude: f32,
    pub use_f64: bool,
    pub block_limit: Option<usize>,
    pub fail_after: Option<usize>,
    pub fail_open: bool,
    pub read_delay: Duration,
    /// Blocks handed out so far, shared so tests can observe progress.
    pub blocks_read: Arc<AtomicUsize>,
    open_config: Option<(u32, u16)>,
}

impl MockLoopbackDevice {
    pub fn new() -> Self {
        MockLoopbackDevice {
            name: "Mock Speakers".to_string(),
            max_channels: 2,
            supported_rates: vec![8000, 16000, 44100, 48000],
            amplitude: 0.25,
            use_f64: false,
            block_limit: None,
            fail_after: None,
            fail_open: false,
            read_delay: Duration::from_millis(2),
            blocks_read: Arc::new(AtomicUsize::new(0)),
            open_config: None,
        }
    }

    pub fn with_max_channels(mut self, channels: u16) -> Self {
        self.max_channels = channels;
        self
    }

    pub fn with_supported_rates(mut self, rates: &[u32]) -> Self {
        self.supported_rates = rates.to_vec();
        self
    }

    pub fn with_block_limit(mut self, blocks: usize) -> Self {
        self.block_limit = Some(blocks);
        self
    }

    pub fn failing_after(mut self, blocks: usize) -> Self {
        self.fail_after = Some(blocks);
        self
    }

    pub fn failing_on_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_f64_samples(mut self) -> Self {
        self.use_f64 = true;
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }
}

impl Default for MockLoopbackDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackDevice for MockLoopbackDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn max_channels(&self) -> u16 {
        self.max_channels
    }

    fn supports(&self, sample_rate: u32, channels: u16) -> bool {
        channels <= self.max_channels && self.supported_rates.contains(&sample_rate)
    }

    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<(), RecorderError> {
        if self.fail_open {
            return Err(RecorderError::AudioDevice(
                "Simulated open failure".to_string(),
            ));
        }
        self.open_config = Some((sample_rate, channels));
        Ok(())
    }

    fn read_block(&mut self, frames: usize) -> Result<RawBlock, RecorderError> {
        let (_, channels) = self
            .open_config
            .ok_or_else(|| RecorderError::AudioDevice("Mock stream is not open".to_string()))?;

        thread::sleep(self.read_delay);

        let served = self.blocks_read.load(Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| served >= limit) {
            return Err(RecorderError::AudioDevice(
                "Simulated device disconnect".to_string(),
            ));
        }
        if self.block_limit.is_some_and(|limit| served >= limit) {
            return Ok(RawBlock::F32(Vec::new()));
        }

        self.blocks_read.fetch_add(1, Ordering::SeqCst);
        let samples = frames * usize::from(channels);
        debug!("Mock serving block {} ({} samples)", served + 1, samples);

        if self.use_f64 {
            Ok(RawBlock::F64(vec![f64::from(self.amplitude); samples]))
        } else {
            Ok(RawBlock::F32(vec![self.amplitude; samples]))
        }
    }

    fn close(&mut self) {
        self.open_config = None;
    }

    fn is_open(&self) -> bool {
        self.open_config.is_some()
    }
}
