/// Rates probed against the output device, lowest first.
pub const COMMON_SAMPLE_RATES: [u32; 13] = [
    8000, 11025, 16000, 22050, 32000, 44100, 48000, 88200, 96000, 176400, 192000, 352800, 384000,
];
/// Offered when the device accepts none of the common rates.
pub const FALLBACK_SAMPLE_RATES: [u32; 2] = [44100, 48000];
pub const MIN_SAMPLE_RATE: u32 = 8000;
pub const MAX_SAMPLE_RATE: u32 = 384_000;
pub const MAX_RECORD_CHANNELS: u16 = 2;

// Fixed profile: 16 kHz mono in 100 ms blocks
pub const FIXED_SAMPLE_RATE: u32 = 16000;
pub const FIXED_CHANNELS: u16 = 1;
pub const FIXED_BLOCK_FRAMES: usize = 1600;
pub const FIXED_PROGRESS_INTERVAL: usize = 10;

pub const BITS_PER_SAMPLE: u16 = 16;

// Capture plumbing
pub const RING_BUFFER_SECONDS: usize = 4;
pub const READ_POLL_INTERVAL_MS: u64 = 1;
pub const LOOPBACK_GRACE_MS: u64 = 250;
pub const COMMAND_ACK_TIMEOUT_SECS: u64 = 30;
pub const COMMAND_QUEUE_DEPTH: usize = 8;

pub const OUTPUT_FILE_PREFIX: &str = "speaker_recording";
pub const CONFIG_FILE_NAME: &str = "speaker-recorder.toml";

pub const DEFAULT_PROFILE: &str = "selectable";
pub const DEFAULT_OUTPUT_DIR: &str = ".";
pub const DEFAULT_DURATION: u64 = 0;
pub const DEFAULT_DEBUG: bool = false;

// Environment variable names
pub const ENV_CONFIG: &str = "SPEAKER_RECORDER_CONFIG";
pub const ENV_PROFILE: &str = "RECORDING_PROFILE";
pub const ENV_SAMPLE_RATE: &str = "SAMPLE_RATE";
pub const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const ENV_OUTPUT_FILE: &str = "OUTPUT_FILE";
pub const ENV_DURATION: &str = "RECORD_DURATION";
pub const ENV_DEBUG: &str = "DEBUG";
pub const ENV_PREFIX: &str = "SPEAKER_RECORDER_";
