//! The pet session: one explicit object owning the sim, the recorder, and
//! the playback slot. The presentation layer reads state through it and
//! issues every command through it.

use crate::audio::{ActivePlayback, AudioError, AudioInput, AudioOutput, Clip, PlaybackEnd, Recorder};
use crate::model::{Gauges, PetState, FEED_HUNGER_CAP};
use crate::sim::PetSim;

pub(crate) struct Session<I: AudioInput, O: AudioOutput> {
    sim: PetSim,
    recorder: Recorder<I>,
    output: O,
    playing: Option<ActivePlayback>,
    clip: Option<Clip>,
    playback_rate: f32,
}

impl<I: AudioInput, O: AudioOutput> Session<I, O> {
    pub(crate) fn new(input: I, output: O, playback_rate: f32) -> Self {
        Self {
            sim: PetSim::new(),
            recorder: Recorder::new(input),
            output,
            playing: None,
            clip: None,
            playback_rate,
        }
    }

    pub(crate) fn state(&self) -> PetState {
        self.sim.state()
    }

    pub(crate) fn gauges(&self) -> &Gauges {
        self.sim.gauges()
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub(crate) fn clip_secs(&self) -> Option<f32> {
        self.clip.as_ref().map(Clip::duration_secs)
    }

    // Availability flags for the UI's disabled-control hints.

    pub(crate) fn can_record(&self) -> bool {
        self.sim.state() != PetState::Sleeping
    }

    pub(crate) fn can_play(&self) -> bool {
        self.clip.is_some()
            && self.sim.state() != PetState::Sleeping
            && self.sim.state() != PetState::Talking
    }

    pub(crate) fn can_feed(&self) -> bool {
        self.sim.state() != PetState::Sleeping && self.sim.gauges().hunger() < FEED_HUNGER_CAP
    }

    // Commands. Guard-rejected ones leave everything untouched.

    pub(crate) fn pet(&mut self) {
        self.sim.pet();
    }

    pub(crate) fn feed(&mut self) {
        self.sim.feed();
    }

    pub(crate) fn put_to_sleep(&mut self) {
        self.sim.put_to_sleep();
    }

    pub(crate) fn wake_up(&mut self) {
        self.sim.wake_up();
    }

    pub(crate) fn start_recording(&mut self) -> Result<(), AudioError> {
        if self.sim.state() == PetState::Sleeping {
            // Disabled control; not an error.
            return Ok(());
        }
        self.recorder.start()?;
        self.sim.begin_talking();
        Ok(())
    }

    /// Finalize the open recording into the clip slot, replacing any
    /// previous clip. With no open session this is a no-op.
    pub(crate) fn stop_recording(&mut self) {
        if let Some(clip) = self.recorder.stop() {
            self.clip = Some(clip);
            self.sim.recording_stopped();
        }
    }

    pub(crate) fn play_recording(&mut self) -> Result<(), AudioError> {
        if self.sim.state() == PetState::Sleeping {
            return Ok(());
        }
        if self.sim.state() == PetState::Talking {
            return Err(AudioError::AlreadyPlaying);
        }
        let clip = self.clip.as_ref().ok_or(AudioError::NoClip)?;
        let playing = self.output.play(clip, self.playback_rate)?;
        self.playing = Some(playing);
        self.sim.begin_talking();
        Ok(())
    }

    /// Advance the sim clock and fold any finished playback back into the
    /// state machine.
    pub(crate) fn advance(&mut self, now_ms: u64) {
        self.sim.advance(now_ms);
        let outcome = self.playing.as_ref().and_then(ActivePlayback::poll);
        match outcome {
            Some(PlaybackEnd::Finished) => {
                self.playing = None;
                self.sim.playback_finished();
            }
            Some(PlaybackEnd::Failed(reason)) => {
                log::warn!("playback failed: {reason}");
                self.playing = None;
                self.sim.playback_failed();
            }
            None => {}
        }
    }
}
