//! Recording session lifecycle
//!
//! A [`Recorder`] starts one session at a time. Each session runs an encoder
//! thread that owns the converter, both codecs and the container, plus an
//! optional audio capture thread. The producer talks to the session only
//! through the [`SessionHandle`], which never blocks on encoding.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use super::convert::ColorConverter;
use super::encoder::VideoEncodeStage;
use super::muxer::{AudioLayout, MuxStats, Mp4Muxer, PacketSink, StreamLayout};
use super::stats::RecordingStats;
use crate::audio::{run_capture, AudioEncodeStage, AudioSourceFactory, CaptureReport};
use crate::config::RecorderConfig;
use crate::errors::RecorderError;
use crate::handoff::{lock, AudioQueue, FrameSlot, Handoff, RawFrame, SubmitOutcome};
use crate::timing::VideoClock;

const ENCODER_THREAD: &str = "framerec-encoder";
const AUDIO_THREAD: &str = "framerec-audio";

/// Opens the packet sink for a session on the encoder thread
pub type SinkOpener = Arc<
    dyn Fn(&Path, &StreamLayout) -> Result<Box<dyn PacketSink>, RecorderError> + Send + Sync,
>;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    Idle,
    Starting,
    Recording,
    Stopping,
    Stopped,
}

impl RecorderState {
    /// A session in this state holds (or is acquiring) threads and codecs
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RecorderState::Starting | RecorderState::Recording | RecorderState::Stopping
        )
    }
}

/// Entry point for recording sessions
pub struct Recorder {
    config: RecorderConfig,
    audio_factory: Option<AudioSourceFactory>,
    sink_opener: SinkOpener,
    /// `None` until the first `start`
    active: Mutex<Option<Weak<SessionInner>>>,
}

impl Recorder {
    /// A recorder writing MP4 files, with no audio source attached
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            audio_factory: None,
            sink_opener: Arc::new(|path: &Path, layout: &StreamLayout| {
                Mp4Muxer::open_sink(path, layout)
            }),
            active: Mutex::new(None),
        }
    }

    /// Attach the audio source opened for each session when audio is enabled
    pub fn with_audio_source(mut self, factory: AudioSourceFactory) -> Self {
        self.audio_factory = Some(factory);
        self
    }

    /// Replace the MP4 container with another packet sink
    pub fn with_sink(mut self, opener: SinkOpener) -> Self {
        self.sink_opener = opener;
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// State of the most recent session.
    ///
    /// `Idle` before the first `start`. A session that failed to start, or
    /// whose handles have all been dropped, reports `Stopped`.
    pub fn state(&self) -> RecorderState {
        match lock(&self.active).as_ref() {
            None => RecorderState::Idle,
            Some(weak) => weak
                .upgrade()
                .map(|inner| inner.core.state())
                .unwrap_or(RecorderState::Stopped),
        }
    }

    /// Start a session writing to `output_path` at a fixed `width` x `height`.
    ///
    /// Blocks until the encoder thread has acquired its codecs and opened the
    /// container. Video, converter and container failures are returned here;
    /// audio failures only degrade the session to video.
    pub fn start<P: AsRef<Path>>(
        &self,
        output_path: P,
        width: u32,
        height: u32,
    ) -> Result<SessionHandle, RecorderError> {
        self.config.validate()?;

        let inner = {
            let mut active = lock(&self.active);
            if let Some(current) = active.as_ref().and_then(Weak::upgrade) {
                let state = current.core.state();
                if state.is_active() {
                    return Err(RecorderError::InvalidState(format!(
                        "Cannot start a session while another is {:?}",
                        state
                    )));
                }
            }

            let inner = Arc::new(SessionInner::new(
                output_path.as_ref().to_path_buf(),
                width,
                height,
                &self.config,
            ));
            *active = Some(Arc::downgrade(&inner));
            inner
        };

        inner.launch(
            &self.config,
            self.audio_factory.clone(),
            self.sink_opener.clone(),
        )?;

        Ok(SessionHandle { inner })
    }

    /// Stop `session`; equivalent to [`SessionHandle::stop`]
    pub fn stop(&self, session: &SessionHandle) -> Result<RecordingStats, RecorderError> {
        session.stop()
    }
}

/// State shared between the producer, the encoder thread and the capture thread
struct SessionCore {
    slot: FrameSlot,
    audio_queue: AudioQueue,
    stop: AtomicBool,
    state: Mutex<RecorderState>,
    frames_encoded: AtomicU64,
}

impl SessionCore {
    fn state(&self) -> RecorderState {
        *lock(&self.state)
    }

    fn set_state(&self, next: RecorderState) {
        let mut state = lock(&self.state);
        if *state != next {
            log::info!("Recorder state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// Move to `Stopping` unless teardown is already further along
    fn begin_stopping(&self) {
        let mut state = lock(&self.state);
        if matches!(*state, RecorderState::Starting | RecorderState::Recording) {
            log::info!("Recorder state {:?} -> Stopping", *state);
            *state = RecorderState::Stopping;
        }
    }

    /// Close both handoffs and raise the stop flag
    fn request_stop(&self) {
        self.slot.close();
        self.audio_queue.close();
        self.stop.store(true, Ordering::Release);
    }
}

struct Workers {
    encoder: Option<JoinHandle<Result<EncoderReport, RecorderError>>>,
    audio: Option<JoinHandle<CaptureReport>>,
}

struct SessionInner {
    core: Arc<SessionCore>,
    output_path: PathBuf,
    width: u32,
    height: u32,
    workers: Mutex<Workers>,
    /// Cached stop outcome; the mutex also serializes start and stop
    outcome: Mutex<Option<Result<RecordingStats, RecorderError>>>,
}

impl SessionInner {
    fn new(output_path: PathBuf, width: u32, height: u32, config: &RecorderConfig) -> Self {
        Self {
            core: Arc::new(SessionCore {
                slot: FrameSlot::new(),
                audio_queue: AudioQueue::new(config.audio.queue_capacity),
                stop: AtomicBool::new(false),
                state: Mutex::new(RecorderState::Starting),
                frames_encoded: AtomicU64::new(0),
            }),
            output_path,
            width,
            height,
            workers: Mutex::new(Workers {
                encoder: None,
                audio: None,
            }),
            outcome: Mutex::new(None),
        }
    }

    fn launch(
        &self,
        config: &RecorderConfig,
        audio_factory: Option<AudioSourceFactory>,
        sink_opener: SinkOpener,
    ) -> Result<(), RecorderError> {
        let mut outcome = lock(&self.outcome);
        log::info!(
            "Starting session {} ({}x{})",
            self.output_path.display(),
            self.width,
            self.height
        );

        let mut audio_error = None;
        let audio_handle = match (config.audio.enabled, audio_factory) {
            (true, Some(factory)) => match self.spawn_audio(config, factory) {
                Ok(handle) => Some(handle),
                Err((handle, e)) => {
                    log::warn!("Audio source unavailable, recording video only: {}", e);
                    audio_error = Some(e);
                    handle
                }
            },
            (true, None) => {
                log::debug!("Audio enabled but no source attached");
                None
            }
            (false, _) => None,
        };
        let audio_live = audio_handle.is_some() && audio_error.is_none();

        let setup = EncoderSetup {
            output_path: self.output_path.clone(),
            width: self.width,
            height: self.height,
            config: config.clone(),
            audio_live,
            audio_error,
            sink_opener,
        };

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let core = self.core.clone();
        let spawned = thread::Builder::new()
            .name(ENCODER_THREAD.to_string())
            .spawn(move || encoder_main(core, setup, ready_tx));

        let encoder_handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let err =
                    RecorderError::ResourceError(format!("Failed to spawn encoder thread: {}", e));
                self.abort_start(None, audio_handle, &err);
                *outcome = Some(Err(err.clone()));
                return Err(err);
            }
        };

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(RecorderError::ResourceError(
                "Encoder thread exited during startup".to_string(),
            ))
        });

        match ready {
            Ok(()) => {
                let mut workers = lock(&self.workers);
                workers.encoder = Some(encoder_handle);
                workers.audio = audio_handle;
                self.core.set_state(RecorderState::Recording);
                self.core.slot.open();
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to start session: {}", e);
                self.abort_start(Some(encoder_handle), audio_handle, &e);
                *outcome = Some(Err(e.clone()));
                Err(e)
            }
        }
    }

    /// Spawn the capture thread and wait for its source to open.
    ///
    /// On failure the thread handle (if any) is returned alongside the error
    /// so the caller can still join it.
    #[allow(clippy::type_complexity)]
    fn spawn_audio(
        &self,
        config: &RecorderConfig,
        factory: AudioSourceFactory,
    ) -> Result<JoinHandle<CaptureReport>, (Option<JoinHandle<CaptureReport>>, RecorderError)>
    {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let core = self.core.clone();
        let audio_config = config.audio.clone();

        let handle = thread::Builder::new()
            .name(AUDIO_THREAD.to_string())
            .spawn(move || {
                run_capture(factory, audio_config, &core.audio_queue, &core.stop, ready_tx)
            })
            .map_err(|e| {
                (
                    None,
                    RecorderError::AudioError(format!("Failed to spawn audio thread: {}", e)),
                )
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => Err((Some(handle), e)),
            Err(_) => Err((
                Some(handle),
                RecorderError::AudioError("Audio thread exited during startup".to_string()),
            )),
        }
    }

    fn abort_start(
        &self,
        encoder: Option<JoinHandle<Result<EncoderReport, RecorderError>>>,
        audio: Option<JoinHandle<CaptureReport>>,
        err: &RecorderError,
    ) {
        self.core.begin_stopping();
        self.core.request_stop();
        if let Some(handle) = encoder {
            let _ = handle.join();
        }
        if let Some(handle) = audio {
            let _ = handle.join();
        }
        self.core.set_state(RecorderState::Stopped);
        log::debug!("Startup aborted: {}", err);
    }

    fn shutdown(&self) -> Result<RecordingStats, RecorderError> {
        let mut outcome = lock(&self.outcome);
        if let Some(done) = outcome.as_ref() {
            return done.clone();
        }

        self.core.begin_stopping();
        self.core.request_stop();

        let (encoder, audio) = {
            let mut workers = lock(&self.workers);
            (workers.encoder.take(), workers.audio.take())
        };

        let encoded = match encoder {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(RecorderError::EncodingError(
                    "Encoder thread panicked".to_string(),
                ))
            }),
            None => Err(RecorderError::InvalidState(
                "Session has no encoder thread".to_string(),
            )),
        };
        let capture = audio
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();

        self.core.set_state(RecorderState::Stopped);

        let result = encoded.map(|report| {
            let audio_error = capture
                .error
                .as_ref()
                .or(report.audio_error.as_ref())
                .map(|e| e.to_string());
            RecordingStats {
                video_packets: report.mux.video_packets,
                audio_packets: report.mux.audio_packets,
                dropped_frames: self.core.slot.dropped(),
                dropped_audio_chunks: self.core.audio_queue.dropped()
                    + report.audio_chunks_discarded,
                duration_secs: report.mux.duration_secs,
                bytes_written: report.mux.bytes_written,
                audio_recorded: report.audio_recorded,
                audio_error,
                output_path: self.output_path.to_string_lossy().to_string(),
            }
        });

        match &result {
            Ok(stats) => log::info!(
                "Session finished: {} video / {} audio packets, {} frames dropped",
                stats.video_packets,
                stats.audio_packets,
                stats.dropped_frames
            ),
            Err(e) => log::error!("Session ended with error: {}", e),
        }

        *outcome = Some(result.clone());
        result
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::debug!("Session dropped after error: {}", e);
        }
    }
}

/// Producer-side handle to a running session.
///
/// Clones share the session; dropping the last clone stops it.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    /// Hand a bottom-up RGBA frame to the encoder without blocking.
    ///
    /// A pending unconsumed frame is replaced. Malformed buffers and frames
    /// arriving outside `Recording` are rejected.
    pub fn submit_frame(
        &self,
        buffer: Vec<u8>,
        width: u32,
        height: u32,
        captured_at: Instant,
    ) -> SubmitOutcome {
        let frame = RawFrame::new(buffer, width, height, captured_at);
        if !frame.is_well_formed() {
            log::debug!("Rejected malformed {}x{} frame", width, height);
            return SubmitOutcome::Rejected;
        }
        self.inner.core.slot.submit(frame)
    }

    /// Advisory: true while recording with no unconsumed frame pending
    pub fn is_accepting_frames(&self) -> bool {
        self.inner.core.slot.is_ready()
    }

    pub fn state(&self) -> RecorderState {
        self.inner.core.state()
    }

    /// Frames fully processed by the encoder thread
    pub fn frames_encoded(&self) -> u64 {
        self.inner.core.frames_encoded.load(Ordering::Acquire)
    }

    /// Frames replaced in the slot before the encoder reached them
    pub fn dropped_frames(&self) -> u64 {
        self.inner.core.slot.dropped()
    }

    pub fn output_path(&self) -> &Path {
        &self.inner.output_path
    }

    /// Canvas size fixed at `start`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.inner.width, self.inner.height)
    }

    /// Stop the session and wait for the container to be finalized.
    ///
    /// Idempotent: later calls return the first outcome.
    pub fn stop(&self) -> Result<RecordingStats, RecorderError> {
        self.inner.shutdown()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("output_path", &self.inner.output_path)
            .field("dimensions", &self.dimensions())
            .field("state", &self.state())
            .finish()
    }
}

struct EncoderSetup {
    output_path: PathBuf,
    width: u32,
    height: u32,
    config: RecorderConfig,
    /// The capture thread opened its source
    audio_live: bool,
    audio_error: Option<RecorderError>,
    sink_opener: SinkOpener,
}

struct EncoderReport {
    mux: MuxStats,
    audio_chunks_discarded: u64,
    audio_recorded: bool,
    audio_error: Option<RecorderError>,
}

/// Everything the encoder thread owns for the life of a session
struct Pipeline {
    converter: ColorConverter,
    video: VideoEncodeStage,
    audio: Option<AudioEncodeStage>,
    sink: Box<dyn PacketSink>,
    clock: VideoClock,
    audio_recorded: bool,
    audio_error: Option<RecorderError>,
    audio_chunks_discarded: u64,
}

impl Pipeline {
    fn acquire(setup: EncoderSetup) -> Result<Self, RecorderError> {
        let EncoderSetup {
            output_path,
            width,
            height,
            config,
            audio_live,
            mut audio_error,
            sink_opener,
        } = setup;

        let converter = ColorConverter::new(width, height)?;
        let video = VideoEncodeStage::new(width, height, config.video.keyframe_interval)?;

        let audio = if audio_live {
            match AudioEncodeStage::new(&config.audio) {
                Ok(stage) => Some(stage),
                Err(e) => {
                    log::warn!("Audio codec unavailable, recording video only: {}", e);
                    audio_error = Some(e);
                    None
                }
            }
        } else {
            None
        };

        let layout = StreamLayout {
            width,
            height,
            fps_hint: config.video.fps_hint,
            audio: audio.as_ref().map(|_| AudioLayout {
                sample_rate: config.audio.sample_rate,
                channels: config.audio.channels,
            }),
            fast_start: config.output.fast_start,
            title: config.output.title.clone(),
        };
        let sink = sink_opener(&output_path, &layout)?;

        Ok(Self {
            converter,
            video,
            audio_recorded: audio.is_some(),
            audio,
            sink,
            clock: VideoClock::new(config.video.timebase),
            audio_error,
            audio_chunks_discarded: 0,
        })
    }

    /// Returns whether a video packet reached the sink
    fn encode_frame(&mut self, frame: &RawFrame) -> Result<bool, RecorderError> {
        let pts = self.clock.stamp(frame.captured_at);
        let yuv = self
            .converter
            .convert(&frame.data, frame.width, frame.height)?;
        match self.video.encode(yuv, pts)? {
            Some(packet) => {
                self.sink.write(&packet)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop queued chunks that have no video packet to line up with
    fn discard_audio(&mut self, queue: &AudioQueue) {
        let stale = queue.drain().len() as u64;
        if stale > 0 {
            log::debug!("Discarding {} audio chunks queued ahead of video", stale);
            self.audio_chunks_discarded += stale;
        }
    }

    /// Encode and write every queued chunk, or discard them if audio is off
    fn drain_audio(&mut self, queue: &AudioQueue) -> Result<(), RecorderError> {
        for chunk in queue.drain() {
            let Some(stage) = self.audio.as_mut() else {
                self.audio_chunks_discarded += 1;
                continue;
            };
            match stage.encode(&chunk) {
                Ok(Some(packet)) => self.sink.write(&packet)?,
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Audio encoding failed, dropping audio for this session: {}", e);
                    self.audio = None;
                    self.audio_error.get_or_insert(e);
                    self.audio_chunks_discarded += 1;
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<EncoderReport, RecorderError> {
        let mux = self.sink.close()?;
        Ok(EncoderReport {
            mux,
            audio_chunks_discarded: self.audio_chunks_discarded,
            audio_recorded: self.audio_recorded,
            audio_error: self.audio_error,
        })
    }
}

fn encoder_main(
    core: Arc<SessionCore>,
    setup: EncoderSetup,
    ready: Sender<Result<(), RecorderError>>,
) -> Result<EncoderReport, RecorderError> {
    let mut pipeline = match Pipeline::acquire(setup) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            let _ = ready.send(Err(e.clone()));
            return Err(e);
        }
    };
    let _ = ready.send(Ok(()));
    drop(ready);

    let mut wrote_video = false;
    let mut failure = None;
    while let Some(frame) = core.slot.take() {
        // Audio pts 0 must line up with video pts 0
        if !wrote_video {
            pipeline.discard_audio(&core.audio_queue);
        }
        match pipeline.encode_frame(&frame) {
            Ok(written) => wrote_video |= written,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
        core.frames_encoded.fetch_add(1, Ordering::AcqRel);

        // Audio is only muxed once the video track has a sample
        if !wrote_video {
            continue;
        }
        if let Err(e) = pipeline.drain_audio(&core.audio_queue) {
            failure = Some(e);
            break;
        }
    }

    // Producer and capture thread must see the session wind down
    core.begin_stopping();
    core.request_stop();

    if failure.is_none() {
        // Audio is only muxed alongside video; with no video there is no timeline
        if wrote_video {
            failure = pipeline.drain_audio(&core.audio_queue).err();
        } else {
            pipeline.discard_audio(&core.audio_queue);
        }
    }

    if let Some(e) = failure {
        log::error!("Encoding stopped: {}", e);
        if let Err(close_err) = pipeline.sink.close() {
            log::error!("Failed to close container after error: {}", close_err);
        }
        return Err(e);
    }

    log::debug!(
        "Encoder exiting after {} frames",
        core.frames_encoded.load(Ordering::Acquire)
    );
    pipeline.finish()
}
