//! Output bus: the play/pause gate every voice feeds into.
//!
//! Pausing only ramps the bus gain to zero. Voices keep running underneath
//! so that playing again is instant.

use crate::error::ToneError;
use crate::host::{AudioHost, NodeId, Target};
use crate::system::AudioSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }
}

#[derive(Debug, Clone)]
pub(crate) struct OutputBus {
    pub(crate) gain: NodeId,
}

impl OutputBus {
    pub(crate) fn create<H: AudioHost>(host: &mut H) -> Result<Self, ToneError> {
        let gain = host.create_gain(0.0)?;
        host.connect(gain, Target::Destination)?;
        Ok(OutputBus { gain })
    }
}

impl<H: AudioHost> AudioSystem<H> {
    /// Start the host if needed and fade the bus in.
    ///
    /// A resume refused by host policy is logged and otherwise ignored: the
    /// bus still ramps, but nothing is heard until a later resume succeeds.
    /// Only a missing or closed audio subsystem is returned as an error.
    pub fn resume(&mut self) -> Result<(), ToneError> {
        let bus = self.bus_node()?;
        if !self.is_running() {
            match self.host.resume() {
                Ok(()) => tracing::debug!("audio host resumed"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!(error = %e, "resume refused, output stays silent"),
            }
        }
        self.ramp_bus(bus, self.config.bus_target_gain);
        Ok(())
    }

    /// Fade the bus out. Voices and the host keep running.
    pub fn suspend_output(&mut self) -> Result<(), ToneError> {
        let bus = self.bus_node()?;
        self.ramp_bus(bus, 0.0);
        Ok(())
    }

    /// Host running and bus gain above the audible threshold.
    ///
    /// Advisory, for reconciling UI state.
    pub fn is_audible(&self) -> bool {
        let Some(bus) = self.bus() else {
            return false;
        };
        self.is_running()
            && self
                .host
                .param_value(bus.gain)
                .is_some_and(|g| g > self.config.audible_threshold)
    }

    fn ramp_bus(&mut self, bus: NodeId, target: f64) {
        let now = self.host.current_time();
        let time_constant = self.config.bus_time_constant;
        if let Err(e) = self.host.set_target_at_time(bus, target, now, time_constant) {
            tracing::debug!(error = %e, target, "bus ramp not scheduled");
        }
    }
}
