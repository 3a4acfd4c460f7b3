//! Voice engine: one sine oscillator and one gain node per wave.

use crate::error::ToneError;
use crate::host::{AudioHost, NodeId, Target};
use crate::system::AudioSystem;

/// Handle to a voice's nodes. Cheap to copy; destroying it more than once
/// is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceHandle {
    oscillator: NodeId,
    gain: NodeId,
}

impl<H: AudioHost> AudioSystem<H> {
    /// Start a sine voice at `initial_freq` routed through its own gain into
    /// the output bus. It sounds as soon as the bus is open.
    pub fn create_voice(
        &mut self,
        initial_freq: f64,
        initial_gain: f64,
    ) -> Result<VoiceHandle, ToneError> {
        let bus = self.bus_node()?;
        let oscillator = self.host.create_oscillator(initial_freq)?;
        let voice = match self.host.create_gain(initial_gain) {
            Ok(gain) => VoiceHandle { oscillator, gain },
            Err(e) => {
                let _ = self.host.release(oscillator);
                return Err(e);
            }
        };

        if let Err(e) = self.wire(&voice, bus) {
            self.destroy_voice(&voice);
            return Err(e);
        }
        tracing::debug!(
            oscillator = %voice.oscillator,
            gain = %voice.gain,
            initial_freq,
            initial_gain,
            "voice created"
        );
        Ok(voice)
    }

    fn wire(&mut self, voice: &VoiceHandle, bus: NodeId) -> Result<(), ToneError> {
        self.host.connect(voice.oscillator, Target::Node(voice.gain))?;
        self.host.connect(voice.gain, Target::Node(bus))?;
        self.host.start(voice.oscillator)
    }

    /// Jump to `freq` at the current host time. Last call wins.
    pub fn set_frequency(&mut self, voice: &VoiceHandle, freq: f64) {
        let now = self.host.current_time();
        if let Err(e) = self.host.set_value_at_time(voice.oscillator, freq, now) {
            tracing::debug!(error = %e, freq, "frequency change dropped");
        }
    }

    /// Glide toward `effective_gain` (already zero when muted).
    pub fn set_gain(&mut self, voice: &VoiceHandle, effective_gain: f64) {
        let now = self.host.current_time();
        let time_constant = self.config.voice_time_constant;
        if let Err(e) = self
            .host
            .set_target_at_time(voice.gain, effective_gain, now, time_constant)
        {
            tracing::debug!(error = %e, effective_gain, "gain change dropped");
        }
    }

    /// Stop the oscillator and release both nodes. Errors from a voice that
    /// is already gone are ignored.
    pub fn destroy_voice(&mut self, voice: &VoiceHandle) {
        let steps = [
            self.host.stop(voice.oscillator),
            self.host.disconnect(voice.gain),
            self.host.release(voice.oscillator),
            self.host.release(voice.gain),
        ];
        for e in steps.into_iter().filter_map(Result::err) {
            tracing::trace!(error = %e, "ignored while destroying voice");
        }
        tracing::debug!(oscillator = %voice.oscillator, "voice destroyed");
    }

    /// Oscillator frequency as last rendered.
    pub fn voice_frequency(&self, voice: &VoiceHandle) -> Option<f64> {
        self.host.param_value(voice.oscillator)
    }

    /// Voice gain as last rendered.
    pub fn voice_gain(&self, voice: &VoiceHandle) -> Option<f64> {
        self.host.param_value(voice.gain)
    }
}
