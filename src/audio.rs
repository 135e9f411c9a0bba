//! Audio capture and playback over cpal, behind capability traits so the
//! session logic can be driven by deterministic fakes in tests.

use std::any::Any;
use std::fmt;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum AudioError {
    PermissionDenied,
    DeviceUnavailable,
    AlreadyRecording,
    AlreadyPlaying,
    NoClip,
    Playback(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::PermissionDenied => {
                write!(f, "microphone access was refused; allow it and retry")
            }
            AudioError::DeviceUnavailable => write!(f, "no usable audio device found"),
            AudioError::AlreadyRecording => write!(f, "already recording"),
            AudioError::AlreadyPlaying => write!(f, "already talking"),
            AudioError::NoClip => write!(f, "nothing recorded yet"),
            AudioError::Playback(reason) => write!(f, "playback failed: {reason}"),
        }
    }
}

impl std::error::Error for AudioError {}

/// A finalized recording: mono samples in arrival order.
#[derive(Clone)]
pub(crate) struct Clip {
    pub(crate) samples: Arc<Vec<f32>>,
    pub(crate) sample_rate: u32,
}

impl Clip {
    pub(crate) fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Keeps the input device open; dropping it halts capture and releases
/// the device on every exit path.
pub(crate) struct CaptureGuard {
    sample_rate: u32,
    _stream: Box<dyn Any>,
}

impl CaptureGuard {
    pub(crate) fn new(sample_rate: u32, stream: Box<dyn Any>) -> Self {
        Self {
            sample_rate,
            _stream: stream,
        }
    }
}

/// Capability interface over the input side of the platform media stack.
pub(crate) trait AudioInput {
    /// Open the input device and start appending captured mono samples to
    /// `chunks` in arrival order, until the returned guard is dropped.
    fn open(&mut self, chunks: Arc<Mutex<Vec<f32>>>) -> Result<CaptureGuard, AudioError>;
}

/// Capability interface over the output side.
pub(crate) trait AudioOutput {
    /// Begin non-blocking playback of `clip` at a fixed rate multiplier.
    /// Raising the rate raises pitch and shortens the clip together; there
    /// is deliberately no pitch correction.
    fn play(&mut self, clip: &Clip, rate: f32) -> Result<ActivePlayback, AudioError>;
}

pub(crate) enum PlaybackEnd {
    Finished,
    Failed(String),
}

/// An in-flight playback. Owns the output stream; consuming the outcome
/// (and dropping this) releases the device.
pub(crate) struct ActivePlayback {
    done: Receiver<PlaybackEnd>,
    _stream: Box<dyn Any>,
}

impl ActivePlayback {
    pub(crate) fn new(done: Receiver<PlaybackEnd>, stream: Box<dyn Any>) -> Self {
        Self {
            done,
            _stream: stream,
        }
    }

    pub(crate) fn poll(&self) -> Option<PlaybackEnd> {
        match self.done.try_recv() {
            Ok(end) => Some(end),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(PlaybackEnd::Failed("output stream went away".into()))
            }
        }
    }
}

/* -----------------------------
   Capture unit
------------------------------ */

struct RecordingSession {
    chunks: Arc<Mutex<Vec<f32>>>,
    guard: CaptureGuard,
}

/// Owns the at-most-one open recording session.
pub(crate) struct Recorder<I: AudioInput> {
    input: I,
    session: Option<RecordingSession>,
}

impl<I: AudioInput> Recorder<I> {
    pub(crate) fn new(input: I) -> Self {
        Self {
            input,
            session: None,
        }
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Open the input device and start a session. Fails `AlreadyRecording`
    /// if one is open, leaving it untouched.
    pub(crate) fn start(&mut self) -> Result<(), AudioError> {
        if self.session.is_some() {
            return Err(AudioError::AlreadyRecording);
        }
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let guard = self.input.open(Arc::clone(&chunks))?;
        log::info!("recording started at {} Hz", guard.sample_rate);
        self.session = Some(RecordingSession { chunks, guard });
        Ok(())
    }

    /// Halt capture, release the device, and finalize the buffered chunks
    /// into a clip. No open session: returns `None` (a no-op).
    pub(crate) fn stop(&mut self) -> Option<Clip> {
        let session = self.session.take()?;
        let sample_rate = session.guard.sample_rate;
        // Dropping the guard stops the stream before the buffer is drained,
        // so no chunk can arrive after finalization.
        drop(session.guard);
        let samples = std::mem::take(&mut *session.chunks.lock().unwrap());
        log::info!(
            "recording stopped: {} samples ({:.2}s)",
            samples.len(),
            samples.len() as f32 / sample_rate.max(1) as f32
        );
        Some(Clip {
            samples: Arc::new(samples),
            sample_rate,
        })
    }
}

/* -----------------------------
   cpal production implementations
------------------------------ */

/// Find an input device matching `pattern` and build a mono `StreamConfig`
/// at the requested sample rate, falling back to the device default when
/// the exact rate isn't supported.
fn resolve_input(pattern: &str, sample_rate: u32) -> Result<(Device, StreamConfig, u32, u16), AudioError> {
    let host = cpal::default_host();
    let pat = pattern.to_lowercase();
    let device = host
        .input_devices()
        .map_err(|_| AudioError::DeviceUnavailable)?
        .find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(&pat))
                .unwrap_or(false)
        })
        .or_else(|| host.default_input_device())
        .ok_or(AudioError::DeviceUnavailable)?;

    let desired_rate = SampleRate(sample_rate);
    let stream_config: StreamConfig = match device
        .supported_input_configs()
        .map_err(|_| AudioError::PermissionDenied)?
        .find(|c| {
            c.channels() >= 1
                && c.min_sample_rate() <= desired_rate
                && desired_rate <= c.max_sample_rate()
        }) {
        Some(range) => {
            let mut sc: StreamConfig = range.with_sample_rate(desired_rate).into();
            sc.channels = 1;
            sc
        }
        None => {
            let default = device
                .default_input_config()
                .map_err(|_| AudioError::DeviceUnavailable)?;
            log::warn!(
                "{}Hz not supported by '{}'; falling back to {}Hz, {}ch",
                sample_rate,
                device.name().unwrap_or_else(|_| "<unknown>".into()),
                default.sample_rate().0,
                default.channels(),
            );
            default.into()
        }
    };

    let actual_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels;
    Ok((device, stream_config, actual_rate, channels))
}

/// Downmix interleaved multi-channel audio to mono by averaging channels.
#[inline]
fn downmix_to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

fn map_input_stream_err(e: cpal::BuildStreamError) -> AudioError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => AudioError::DeviceUnavailable,
        // Refused access surfaces as a backend error; prompt for access.
        _ => AudioError::PermissionDenied,
    }
}

pub(crate) struct CpalInput {
    device_pattern: String,
    sample_rate: u32,
}

impl CpalInput {
    pub(crate) fn new(device_pattern: String, sample_rate: u32) -> Self {
        Self {
            device_pattern,
            sample_rate,
        }
    }
}

impl AudioInput for CpalInput {
    fn open(&mut self, chunks: Arc<Mutex<Vec<f32>>>) -> Result<CaptureGuard, AudioError> {
        let (device, stream_config, actual_rate, channels) =
            resolve_input(&self.device_pattern, self.sample_rate)?;

        log::info!(
            "input device: {} ({}Hz, {}ch{})",
            device.name().unwrap_or_else(|_| "<unknown>".into()),
            actual_rate,
            channels,
            if channels > 1 { ", downmixing" } else { "" },
        );

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut buf = chunks.lock().unwrap();
                    if channels <= 1 {
                        buf.extend_from_slice(data);
                    } else {
                        buf.extend_from_slice(&downmix_to_mono(data, channels));
                    }
                },
                |err| log::error!("capture error: {err}"),
                None,
            )
            .map_err(map_input_stream_err)?;

        stream.play().map_err(|e| match e {
            cpal::PlayStreamError::DeviceNotAvailable => AudioError::DeviceUnavailable,
            other => AudioError::Playback(other.to_string()),
        })?;

        Ok(CaptureGuard::new(actual_rate, Box::new(stream)))
    }
}

pub(crate) struct CpalOutput;

impl AudioOutput for CpalOutput {
    fn play(&mut self, clip: &Clip, rate: f32) -> Result<ActivePlayback, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::DeviceUnavailable)?;
        let config = device
            .default_output_config()
            .map_err(|_| AudioError::DeviceUnavailable)?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::Playback(format!(
                "unsupported output sample format {:?}",
                config.sample_format()
            )));
        }
        let out_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        // Fractional cursor through the clip: >1 steps raise speed and
        // pitch together, which is the whole trick.
        let step = rate as f64 * clip.sample_rate as f64 / out_rate.max(1) as f64;
        let samples = Arc::clone(&clip.samples);
        let (tx, rx) = channel();
        let err_tx = tx.clone();
        let mut done_tx = Some(tx);
        let mut pos = 0f64;

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let i = pos as usize;
                        let s = if i + 1 < samples.len() {
                            let frac = (pos - i as f64) as f32;
                            samples[i] * (1.0 - frac) + samples[i + 1] * frac
                        } else if i < samples.len() {
                            samples[i]
                        } else {
                            if let Some(tx) = done_tx.take() {
                                let _ = tx.send(PlaybackEnd::Finished);
                            }
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = s;
                        }
                        pos += step;
                    }
                },
                move |err| {
                    let _ = err_tx.send(PlaybackEnd::Failed(err.to_string()));
                },
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => AudioError::DeviceUnavailable,
                other => AudioError::Playback(other.to_string()),
            })?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        log::info!(
            "playing clip: {:.2}s at {rate}x",
            clip.duration_secs() / rate.max(f32::EPSILON)
        );
        Ok(ActivePlayback::new(rx, Box::new(stream)))
    }
}

/* -----------------------------
   Deterministic fakes for tests
------------------------------ */

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc::Sender;

    /// Input that "captures" a scripted chunk sequence, or refuses to open.
    pub(crate) struct FakeInput {
        fail_with: Option<AudioError>,
        feed: Vec<Vec<f32>>,
    }

    impl FakeInput {
        pub(crate) fn feeding(feed: Vec<Vec<f32>>) -> Self {
            Self {
                fail_with: None,
                feed,
            }
        }

        pub(crate) fn failing(err: AudioError) -> Self {
            Self {
                fail_with: Some(err),
                feed: Vec::new(),
            }
        }
    }

    impl AudioInput for FakeInput {
        fn open(&mut self, chunks: Arc<Mutex<Vec<f32>>>) -> Result<CaptureGuard, AudioError> {
            if let Some(err) = self.fail_with.clone() {
                return Err(err);
            }
            let mut buf = chunks.lock().unwrap();
            for chunk in &self.feed {
                buf.extend_from_slice(chunk);
            }
            Ok(CaptureGuard::new(16_000, Box::new(())))
        }
    }

    #[derive(Default)]
    struct FakeOutputState {
        fail_with: Option<AudioError>,
        pending: Vec<Sender<PlaybackEnd>>,
        rates: Vec<f32>,
    }

    /// Output that hands back a playback whose outcome the test triggers.
    /// Clones share state so a test can keep a probe after the session
    /// takes ownership.
    #[derive(Clone, Default)]
    pub(crate) struct FakeOutput {
        shared: Rc<RefCell<FakeOutputState>>,
    }

    impl FakeOutput {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn failing(err: AudioError) -> Self {
            let out = Self::default();
            out.shared.borrow_mut().fail_with = Some(err);
            out
        }

        pub(crate) fn rates(&self) -> Vec<f32> {
            self.shared.borrow().rates.clone()
        }

        pub(crate) fn finish_one(&self) {
            if let Some(tx) = self.shared.borrow_mut().pending.pop() {
                let _ = tx.send(PlaybackEnd::Finished);
            }
        }

        pub(crate) fn fail_one(&self, reason: &str) {
            if let Some(tx) = self.shared.borrow_mut().pending.pop() {
                let _ = tx.send(PlaybackEnd::Failed(reason.into()));
            }
        }
    }

    impl AudioOutput for FakeOutput {
        fn play(&mut self, _clip: &Clip, rate: f32) -> Result<ActivePlayback, AudioError> {
            let mut state = self.shared.borrow_mut();
            if let Some(err) = state.fail_with.clone() {
                return Err(err);
            }
            state.rates.push(rate);
            let (tx, rx) = channel();
            state.pending.push(tx);
            Ok(ActivePlayback::new(rx, Box::new(())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeInput;
    use super::*;

    #[test]
    fn chunks_concatenate_in_arrival_order() {
        let feed = vec![vec![0.1, 0.2], vec![0.3], vec![0.4, 0.5, 0.6]];
        let mut rec = Recorder::new(FakeInput::feeding(feed));
        rec.start().unwrap();
        let clip = rec.stop().unwrap();
        assert_eq!(&clip.samples[..], &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(clip.sample_rate, 16_000);
    }

    #[test]
    fn stop_without_session_is_a_noop() {
        let mut rec = Recorder::new(FakeInput::feeding(vec![]));
        assert!(rec.stop().is_none());
        assert!(!rec.is_recording());
    }

    #[test]
    fn start_while_open_fails_and_keeps_session() {
        let mut rec = Recorder::new(FakeInput::feeding(vec![vec![1.0, 2.0]]));
        rec.start().unwrap();
        assert_eq!(rec.start().unwrap_err(), AudioError::AlreadyRecording);
        assert!(rec.is_recording());
        // The original session is intact: exactly one copy of the feed.
        let clip = rec.stop().unwrap();
        assert_eq!(&clip.samples[..], &[1.0, 2.0]);
    }

    #[test]
    fn open_failure_leaves_recorder_closed() {
        let mut rec = Recorder::new(FakeInput::failing(AudioError::PermissionDenied));
        assert_eq!(rec.start().unwrap_err(), AudioError::PermissionDenied);
        assert!(!rec.is_recording());
        assert!(rec.stop().is_none());
    }

    #[test]
    fn dropped_playback_reports_failure() {
        let (tx, rx) = channel();
        drop(tx);
        let playback = ActivePlayback::new(rx, Box::new(()));
        assert!(matches!(playback.poll(), Some(PlaybackEnd::Failed(_))));
    }

    #[test]
    fn empty_clip_duration_is_zero() {
        let clip = Clip {
            samples: Arc::new(Vec::new()),
            sample_rate: 0,
        };
        assert_eq!(clip.duration_secs(), 0.0);
    }
}
