use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::audio_device::{DeviceInfo, LoopbackDevice};
use crate::config::AppConfig;
use crate::constants::{COMMAND_ACK_TIMEOUT_SECS, COMMAND_QUEUE_DEPTH};
use crate::convert::to_pcm16;
use crate::error::RecorderError;
use crate::session::{
    CaptureProfile, CaptureRequest, CaptureSession, CaptureSettings, Controls, SavedRecording,
    SessionOutcome, SessionState, SharedState,
};

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

pub enum RecorderCommand {
    /// Open the device and begin a session. Replies once capture is running.
    Start(
        CaptureRequest,
        Sender<Result<CaptureSettings, RecorderError>>,
    ),
    /// Finish the current session. Replies after the file has been written.
    Stop(Sender<Result<SessionOutcome, RecorderError>>),
    /// Save anything in flight and exit the worker.
    Shutdown,
}

/// Notifications for whatever front end is watching the recorder.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    StateChanged(SessionState),
    Progress {
        elapsed: Duration,
        blocks: usize,
        frames: u64,
    },
    /// The device failed mid-session; captured audio is still saved.
    CaptureFailed(String),
    Saved(SavedRecording),
    /// The session ended without any audio, no file was written.
    NothingCaptured,
    SaveFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    pub profile: CaptureProfile,
    pub output_dir: PathBuf,
}

impl RecorderOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self, RecorderError> {
        Ok(RecorderOptions {
            profile: config.get_profile()?,
            output_dir: PathBuf::from(config.get_output_dir()),
        })
    }
}

fn ack_timeout() -> Duration {
    Duration::from_secs(COMMAND_ACK_TIMEOUT_SECS)
}

fn await_reply<T>(
    reply_rx: &Receiver<Result<T, RecorderError>>,
    what: &'static str,
) -> Result<T, RecorderError> {
    match reply_rx.recv_timeout(ack_timeout()) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(RecorderError::Timeout(what)),
        Err(RecvTimeoutError::Disconnected) => Err(RecorderError::WorkerUnavailable),
    }
}

// ---------------------------------------------------------------------------
// Recorder: handle held by the front end
// ---------------------------------------------------------------------------

/// Handle to a long-lived capture worker.
///
/// The worker owns the device for its whole life and runs sessions one at a
/// time, so a new recording cannot start until the previous one is saved.
pub struct Recorder {
    command_tx: SyncSender<RecorderCommand>,
    event_rx: Receiver<RecorderEvent>,
    state: SharedState,
    device_info: DeviceInfo,
    join_handle: Option<JoinHandle<()>>,
}

impl Recorder {
    /// Spawn the capture worker.
    ///
    /// `open_device` runs on the worker thread, since audio streams are not
    /// always `Send`. A device that cannot be acquired fails here.
    pub fn spawn<D, F>(open_device: F, options: RecorderOptions) -> Result<Self, RecorderError>
    where
        D: LoopbackDevice + 'static,
        F: FnOnce() -> Result<D, RecorderError> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::sync_channel::<RecorderCommand>(COMMAND_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<DeviceInfo, RecorderError>>();
        let state = SharedState::new();

        let worker = CaptureWorker {
            command_rx,
            event_tx,
            state: state.clone(),
            options,
        };

        let join_handle = thread::Builder::new()
            .name("speaker-recorder-capture".to_string())
            .spawn(move || {
                let device = match open_device() {
                    Ok(device) => device,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let info = DeviceInfo::probe(&device);
                if ready_tx.send(Ok(info.clone())).is_err() {
                    return;
                }
                worker.run(device, &info);
            })
            .map_err(|e| {
                RecorderError::AudioDevice(format!("Failed to spawn capture thread: {}", e))
            })?;

        let device_info = match await_reply(&ready_rx, "the audio device") {
            Ok(info) => info,
            Err(e) => {
                // On timeout the thread is left detached rather than hanging here
                if !matches!(e, RecorderError::Timeout(_)) {
                    let _ = join_handle.join();
                }
                return Err(e);
            }
        };

        info!(
            "Capturing '{}' ({} channels max), supported rates: {:?}",
            device_info.name, device_info.max_channels, device_info.supported_rates
        );

        Ok(Recorder {
            command_tx,
            event_rx,
            state,
            device_info,
            join_handle: Some(join_handle),
        })
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn controls(&self) -> Controls {
        self.state().controls()
    }

    /// Event stream for progress and results.
    pub fn events(&self) -> &Receiver<RecorderEvent> {
        &self.event_rx
    }

    fn send(&self, command: RecorderCommand) -> Result<(), RecorderError> {
        self.command_tx
            .send(command)
            .map_err(|_| RecorderError::WorkerUnavailable)
    }

    /// Start a session and wait until the device is capturing.
    ///
    /// If this times out, the worker discards the request when it gets to
    /// it instead of recording for nobody.
    pub fn start(&self, request: CaptureRequest) -> Result<CaptureSettings, RecorderError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(RecorderCommand::Start(request, reply_tx))?;
        await_reply(&reply_rx, "recording to start")
    }

    /// Ask the worker to stop without waiting. The returned receiver yields
    /// the outcome once the file is written.
    pub fn request_stop(
        &self,
    ) -> Result<Receiver<Result<SessionOutcome, RecorderError>>, RecorderError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(RecorderCommand::Stop(reply_tx))?;
        Ok(reply_rx)
    }

    /// Stop the current session and wait for it to be saved.
    pub fn stop(&self) -> Result<SessionOutcome, RecorderError> {
        let reply_rx = self.request_stop()?;
        await_reply(&reply_rx, "the recording to be saved")
    }

    /// Bring the current session to an end and report how it finished.
    ///
    /// A running session is stopped. One that already ended on its own
    /// (device failure) is collected from the event stream, waiting for the
    /// save if it is still being written. Events read here are consumed.
    pub fn finish(&self) -> Result<SessionOutcome, RecorderError> {
        if self.state() == SessionState::Recording {
            match self.stop() {
                Err(RecorderError::NotRecording) => {}
                other => return other,
            }
        }

        let deadline = Instant::now() + ack_timeout();
        let mut aborted = None;
        loop {
            let event = if self.state() == SessionState::Idle {
                // The result is queued before the worker goes idle
                match self.event_rx.try_recv() {
                    Ok(event) => event,
                    Err(_) => return Err(RecorderError::NotRecording),
                }
            } else {
                match self
                    .event_rx
                    .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(RecorderError::Timeout("the recording to be saved"));
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(RecorderError::WorkerUnavailable);
                    }
                }
            };

            match event {
                RecorderEvent::CaptureFailed(message) => aborted = Some(message),
                RecorderEvent::Saved(saved) => return Ok(SessionOutcome::Saved(saved)),
                RecorderEvent::NothingCaptured => return Ok(SessionOutcome::Empty { aborted }),
                RecorderEvent::SaveFailed(message) => return Err(RecorderError::Wav(message)),
                RecorderEvent::StateChanged(_) | RecorderEvent::Progress { .. } => {}
            }
        }
    }

    /// Shut the worker down, saving any session still in progress.
    pub fn shutdown(mut self) {
        self.shutdown_worker();
    }

    fn shutdown_worker(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.command_tx.send(RecorderCommand::Shutdown);
            if handle.join().is_err() {
                error!("Capture worker panicked");
            }
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.shutdown_worker();
    }
}

// ---------------------------------------------------------------------------
// CaptureWorker: lives entirely on the capture thread
// ---------------------------------------------------------------------------

struct CaptureWorker {
    command_rx: Receiver<RecorderCommand>,
    event_tx: Sender<RecorderEvent>,
    state: SharedState,
    options: RecorderOptions,
}

impl CaptureWorker {
    fn run<D: LoopbackDevice>(self, mut device: D, info: &DeviceInfo) {
        while let Ok(command) = self.command_rx.recv() {
            match command {
                RecorderCommand::Start(request, reply_tx) => {
                    let settings = match self.begin(&mut device, info, &request) {
                        Ok(settings) => settings,
                        Err(e) => {
                            error!("Could not start recording: {}", e);
                            let _ = reply_tx.send(Err(e));
                            continue;
                        }
                    };
                    // Recording must be visible by the time the caller sees Ok
                    self.set_state(SessionState::Recording);
                    if reply_tx.send(Ok(settings.clone())).is_err() {
                        warn!("Start request was abandoned by its caller, not recording");
                        device.close();
                        self.set_state(SessionState::Idle);
                        continue;
                    }
                    if self.record(&mut device, CaptureSession::new(settings)) {
                        break;
                    }
                }
                RecorderCommand::Stop(reply_tx) => {
                    let _ = reply_tx.send(Err(RecorderError::NotRecording));
                }
                RecorderCommand::Shutdown => break,
            }
        }

        if device.is_open() {
            device.close();
        }
        debug!("Capture worker exiting");
    }

    fn emit(&self, event: RecorderEvent) {
        // Nobody listening is fine
        let _ = self.event_tx.send(event);
    }

    fn set_state(&self, state: SessionState) {
        self.state.set(state);
        self.emit(RecorderEvent::StateChanged(state));
    }

    fn begin<D: LoopbackDevice>(
        &self,
        device: &mut D,
        info: &DeviceInfo,
        request: &CaptureRequest,
    ) -> Result<CaptureSettings, RecorderError> {
        let settings =
            CaptureSettings::resolve(self.options.profile, request, info, &self.options.output_dir)?;
        device.open(settings.sample_rate, settings.channels)?;
        Ok(settings)
    }

    /// Run one session to completion. Returns true if the worker should exit.
    fn record<D: LoopbackDevice>(&self, device: &mut D, mut session: CaptureSession) -> bool {
        let block_frames = session.settings().block_frames;
        info!(
            "Recording started: {} Hz, {} ch, {} frames per block ({} profile)",
            session.settings().sample_rate,
            session.settings().channels,
            block_frames,
            session.settings().profile
        );

        let mut stop_reply = None;
        let mut shutdown = false;
        let mut aborted = None;

        loop {
            // Commands are only looked at between blocks
            match self.command_rx.try_recv() {
                Ok(RecorderCommand::Stop(reply_tx)) => {
                    stop_reply = Some(reply_tx);
                    break;
                }
                Ok(RecorderCommand::Start(_, reply_tx)) => {
                    let _ = reply_tx.send(Err(RecorderError::AlreadyRecording));
                }
                Ok(RecorderCommand::Shutdown) | Err(TryRecvError::Disconnected) => {
                    shutdown = true;
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            match device.read_block(block_frames) {
                Ok(raw) => {
                    if session.push_block(to_pcm16(raw)) && session.progress_due() {
                        self.emit(RecorderEvent::Progress {
                            elapsed: session.elapsed(),
                            blocks: session.block_count(),
                            frames: session.frames(),
                        });
                    }
                }
                Err(e) => {
                    error!(
                        "Capture failed after {} blocks: {}",
                        session.block_count(),
                        e
                    );
                    let message = e.to_string();
                    self.emit(RecorderEvent::CaptureFailed(message.clone()));
                    aborted = Some(message);
                    break;
                }
            }
        }

        let dropped = device.dropped_samples();
        if dropped > 0 {
            warn!("{} samples were dropped during capture", dropped);
        }
        device.close();

        self.set_state(SessionState::Saving);
        info!(
            "Recording stopped after {:.1}s, {} blocks",
            session.elapsed().as_secs_f64(),
            session.block_count()
        );

        let result = session.save(aborted);
        match &result {
            Ok(SessionOutcome::Saved(saved)) => {
                self.emit(RecorderEvent::Saved(saved.clone()));
            }
            Ok(SessionOutcome::Empty { .. }) => self.emit(RecorderEvent::NothingCaptured),
            Err(e) => {
                error!("Saving the recording failed: {}", e);
                self.emit(RecorderEvent::SaveFailed(e.to_string()));
            }
        }

        self.set_state(SessionState::Idle);

        if let Some(reply_tx) = stop_reply {
            let _ = reply_tx.send(result);
        }

        shutdown
    }
}
