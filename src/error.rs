/// Errors produced by the speaker recorder.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(String),

    #[error("Sample rate {0} Hz is not supported by the output device")]
    UnsupportedSampleRate(u32),

    #[error("No recording in progress")]
    NotRecording,

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Capture worker is not running")]
    WorkerUnavailable,

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}
