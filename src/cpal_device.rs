use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::audio_device::{LoopbackDevice, RawBlock};
use crate::constants::{LOOPBACK_GRACE_MS, READ_POLL_INTERVAL_MS, RING_BUFFER_SECONDS};
use crate::error::RecorderError;
use crate::utils::check_loopback_support;

use cpal::SampleFormat;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Name fragments that identify an input which mirrors an output device.
const MONITOR_HINTS: [&str; 3] = ["monitor", "loopback", "stereo mix"];

/// Ring buffer consumer for whichever sample type the stream delivers.
enum SampleConsumer {
    F32(rtrb::Consumer<f32>),
    F64(rtrb::Consumer<f64>),
    I16(rtrb::Consumer<i16>),
}

impl SampleConsumer {
    fn slots(&self) -> usize {
        match self {
            SampleConsumer::F32(c) => c.slots(),
            SampleConsumer::F64(c) => c.slots(),
            SampleConsumer::I16(c) => c.slots(),
        }
    }

    fn take(&mut self, wanted: usize) -> RawBlock {
        match self {
            SampleConsumer::F32(c) => RawBlock::F32(take_padded(c, wanted)),
            SampleConsumer::F64(c) => RawBlock::F64(take_padded(c, wanted)),
            SampleConsumer::I16(c) => RawBlock::I16(take_padded(c, wanted)),
        }
    }
}

/// Read up to `wanted` samples. A short read is padded with leading
/// silence, so the buffered samples stay contiguous with the next block.
fn take_padded<T: Copy + Default>(consumer: &mut rtrb::Consumer<T>, wanted: usize) -> Vec<T> {
    let to_read = consumer.slots().min(wanted);
    let mut out = vec![T::default(); wanted - to_read];
    if to_read > 0
        && let Ok(chunk) = consumer.read_chunk(to_read)
    {
        let (first, second) = chunk.as_slices();
        out.extend_from_slice(first);
        out.extend_from_slice(second);
        chunk.commit_all();
    }
    out
}

/// Wall-clock schedule for block reads.
///
/// The first read after open may take one block plus `grace`. A read that
/// fills re-anchors the schedule at its completion; a read that had to be
/// padded moves the deadline on by exactly one block.
#[derive(Debug, Clone, Copy)]
struct ReadPacer {
    grace: Duration,
    next_deadline: Option<Instant>,
}

impl ReadPacer {
    fn new(grace: Duration) -> Self {
        ReadPacer {
            grace,
            next_deadline: None,
        }
    }

    fn reset(&mut self) {
        self.next_deadline = None;
    }

    fn deadline(&self, now: Instant, block: Duration) -> Instant {
        self.next_deadline.unwrap_or(now + block + self.grace)
    }

    fn finish(&mut self, deadline: Instant, now: Instant, block: Duration, filled: bool) {
        self.next_deadline = Some(if filled {
            now + block + self.grace
        } else {
            deadline + block
        });
    }
}

/// Wait for `wanted` samples or the pacer's deadline, whichever is first,
/// then take one block from `ring`.
///
/// `now` is the clock; `wait` sleeps one poll interval and reports stream
/// failures.
fn read_paced<N, W>(
    ring: &mut SampleConsumer,
    wanted: usize,
    block: Duration,
    pacer: &mut ReadPacer,
    mut now: N,
    mut wait: W,
) -> Result<RawBlock, RecorderError>
where
    N: FnMut() -> Instant,
    W: FnMut() -> Result<(), RecorderError>,
{
    let deadline = pacer.deadline(now(), block);

    while ring.slots() < wanted && now() < deadline {
        wait()?;
    }

    let available = ring.slots();
    let filled = available >= wanted;
    if !filled {
        debug!(
            "Loopback delivered {} of {} samples, padding with silence",
            available, wanted
        );
    }

    let taken = ring.take(wanted);
    pacer.finish(deadline, now(), block, filled);
    Ok(taken)
}

/// Build an input stream that pushes every callback buffer into `producer`.
///
/// The callback never blocks: when the ring is full the buffer is dropped
/// and counted.
fn build_capture_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: rtrb::Producer<T>,
    dropped: Arc<AtomicU64>,
    stream_error: Arc<AtomicBool>,
) -> Result<cpal::Stream, RecorderError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let err_fn = move |err: cpal::StreamError| {
        error!("an error occurred on the loopback stream: {}", err);
        stream_error.store(true, Ordering::Release);
    };

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                match producer.write_chunk_uninit(data.len()) {
                    Ok(chunk) => {
                        chunk.fill_from_iter(data.iter().copied());
                    }
                    Err(_) => {
                        dropped.fetch_add(data.len() as u64, Ordering::Relaxed);
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| RecorderError::AudioDevice(format!("Failed to build loopback stream: {}", e)))
}

/// Loopback capture of the default output device through cpal.
///
/// Where the host exposes a monitor input for the speaker (PulseAudio and
/// PipeWire do), that input is recorded. Otherwise, on Windows and macOS, the
/// input stream is built on the output device itself, which WASAPI and
/// recent Core Audio treat as a loopback request. Other hosts fail to open.
pub struct CpalLoopbackDevice {
    output: cpal::Device,
    capture: cpal::Device,
    via_monitor: bool,
    name: String,
    max_channels: u16,
    /// (channels, min rate, max rate) of every supported output config.
    supported: Vec<(u16, u32, u32)>,
    stream: Option<cpal::Stream>,
    consumer: Option<SampleConsumer>,
    channels: u16,
    sample_rate: u32,
    pacer: ReadPacer,
    dropped: Arc<AtomicU64>,
    stream_error: Arc<AtomicBool>,
}

impl CpalLoopbackDevice {
    /// Bind to the host's default output device.
    pub fn open_default() -> Result<Self, RecorderError> {
        check_loopback_support()?;

        let host = cpal::default_host();
        let output = host.default_output_device().ok_or_else(|| {
            RecorderError::AudioDevice("No default output device available".to_string())
        })?;

        let name = output
            .description()
            .map(|d| d.name().to_string())
            .map_err(|e| RecorderError::AudioDevice(e.to_string()))?;

        let supported: Vec<(u16, u32, u32)> = output
            .supported_output_configs()
            .map_err(|e| {
                RecorderError::AudioDevice(format!("Failed to query output configs: {}", e))
            })?
            .map(|c| (c.channels(), c.min_sample_rate(), c.max_sample_rate()))
            .collect();

        let max_channels = match supported.iter().map(|&(ch, _, _)| ch).max() {
            Some(ch) => ch,
            None => output
                .default_output_config()
                .map_err(|e| {
                    RecorderError::AudioDevice(format!(
                        "Failed to get default output config: {}",
                        e
                    ))
                })?
                .channels(),
        };

        let (capture, via_monitor) = match Self::find_monitor_input(&host, &name) {
            Some(monitor) => (monitor, true),
            None => (Self::output_as_loopback(&host, &name)?, false),
        };

        info!(
            "Using output device '{}' ({} channels max){}",
            name,
            max_channels,
            if via_monitor { " via monitor source" } else { "" }
        );

        Ok(CpalLoopbackDevice {
            output,
            capture,
            via_monitor,
            name,
            max_channels,
            supported,
            stream: None,
            consumer: None,
            channels: 0,
            sample_rate: 0,
            pacer: ReadPacer::new(Duration::from_millis(LOOPBACK_GRACE_MS)),
            dropped: Arc::new(AtomicU64::new(0)),
            stream_error: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Find an input device that mirrors the named output, preferring one
    /// whose name mentions the output.
    fn find_monitor_input(host: &cpal::Host, output_name: &str) -> Option<cpal::Device> {
        let devices = match host.input_devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate input devices: {}", e);
                return None;
            }
        };

        let output_lower = output_name.to_lowercase();
        let mut fallback = None;
        for device in devices {
            let Ok(desc) = device.description() else {
                continue;
            };
            let lower = desc.name().to_lowercase();
            if !MONITOR_HINTS.iter().any(|hint| lower.contains(hint)) {
                continue;
            }
            debug!("Found monitor input candidate: {}", desc.name());
            if lower.contains(&output_lower) {
                return Some(device);
            }
            if fallback.is_none() {
                fallback = Some(device);
            }
        }
        fallback
    }

    /// WASAPI and Core Audio record what an output device plays when an
    /// input stream is opened on it.
    #[cfg(any(windows, target_os = "macos"))]
    fn output_as_loopback(host: &cpal::Host, _name: &str) -> Result<cpal::Device, RecorderError> {
        host.default_output_device().ok_or_else(|| {
            RecorderError::AudioDevice("Default output device disappeared".to_string())
        })
    }

    /// Elsewhere an input stream on the output device records the default
    /// source (usually a microphone), so a monitor input is required.
    #[cfg(not(any(windows, target_os = "macos")))]
    fn output_as_loopback(_host: &cpal::Host, name: &str) -> Result<cpal::Device, RecorderError> {
        Err(RecorderError::AudioDevice(format!(
            "No monitor source for '{}'",
            name
        )))
    }

    fn capture_format(&self) -> Result<SampleFormat, RecorderError> {
        let config = if self.via_monitor {
            self.capture.default_input_config()
        } else {
            self.output.default_output_config()
        };
        config.map(|c| c.sample_format()).map_err(|e| {
            RecorderError::AudioDevice(format!("Failed to get capture stream config: {}", e))
        })
    }
}

impl LoopbackDevice for CpalLoopbackDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn max_channels(&self) -> u16 {
        self.max_channels
    }

    fn supports(&self, sample_rate: u32, channels: u16) -> bool {
        self.supported
            .iter()
            .any(|&(ch, min, max)| ch >= channels && (min..=max).contains(&sample_rate))
    }

    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<(), RecorderError> {
        self.close();

        let sample_format = self.capture_format()?;
        let config = cpal::StreamConfig {
            channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        debug!("Opening loopback stream: {:?} as {:?}", config, sample_format);

        let capacity = sample_rate as usize * usize::from(channels) * RING_BUFFER_SECONDS;
        self.dropped.store(0, Ordering::Relaxed);
        self.stream_error.store(false, Ordering::Release);
        let dropped = Arc::clone(&self.dropped);
        let stream_error = Arc::clone(&self.stream_error);

        let (stream, consumer) = match sample_format {
            SampleFormat::F32 => {
                let (producer, consumer) = rtrb::RingBuffer::<f32>::new(capacity);
                let stream =
                    build_capture_stream(&self.capture, &config, producer, dropped, stream_error)?;
                (stream, SampleConsumer::F32(consumer))
            }
            SampleFormat::F64 => {
                let (producer, consumer) = rtrb::RingBuffer::<f64>::new(capacity);
                let stream =
                    build_capture_stream(&self.capture, &config, producer, dropped, stream_error)?;
                (stream, SampleConsumer::F64(consumer))
            }
            SampleFormat::I16 => {
                let (producer, consumer) = rtrb::RingBuffer::<i16>::new(capacity);
                let stream =
                    build_capture_stream(&self.capture, &config, producer, dropped, stream_error)?;
                (stream, SampleConsumer::I16(consumer))
            }
            other => {
                return Err(RecorderError::AudioDevice(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| RecorderError::AudioDevice(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        self.consumer = Some(consumer);
        self.channels = channels;
        self.sample_rate = sample_rate;
        self.pacer.reset();

        Ok(())
    }

    /// Wait for one block of frames.
    ///
    /// Loopback streams go quiet while nothing is playing, so reads follow a
    /// wall-clock schedule: if a block's deadline passes with the ring short,
    /// the gap is filled with silence and capture keeps real time.
    fn read_block(&mut self, frames: usize) -> Result<RawBlock, RecorderError> {
        let consumer = self
            .consumer
            .as_mut()
            .ok_or_else(|| RecorderError::AudioDevice("Loopback stream is not open".to_string()))?;

        let stream_error = &self.stream_error;
        let check_stream = || {
            if stream_error.load(Ordering::Acquire) {
                Err(RecorderError::AudioDevice(
                    "Loopback stream reported an error".to_string(),
                ))
            } else {
                Ok(())
            }
        };
        check_stream()?;

        let wanted = frames * usize::from(self.channels);
        let block = Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate));

        read_paced(consumer, wanted, block, &mut self.pacer, Instant::now, || {
            check_stream()?;
            thread::sleep(Duration::from_millis(READ_POLL_INTERVAL_MS));
            Ok(())
        })
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("Loopback stream closed");
        }
        self.consumer = None;
        self.pacer.reset();
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for CpalLoopbackDevice {
    fn drop(&mut self) {
        self.close();
    }
}
