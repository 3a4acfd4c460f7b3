//! The audio system handle: one host, one output bus.

use crate::bus::OutputBus;
use crate::config::ToneConfig;
use crate::error::ToneError;
use crate::host::{AudioHost, HostState, NodeId};

/// Owns the host audio subsystem and the shared output bus.
///
/// Constructed by the application root and passed to whatever needs to
/// make sound. The bus is created on first use.
pub struct AudioSystem<H: AudioHost> {
    pub(crate) host: H,
    pub(crate) config: ToneConfig,
    bus: Option<OutputBus>,
}

impl<H: AudioHost> AudioSystem<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, ToneConfig::default())
    }

    pub fn with_config(host: H, config: ToneConfig) -> Self {
        AudioSystem {
            host,
            config,
            bus: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &ToneConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.host.state() == HostState::Running
    }

    /// The bus gain node, created and wired to the destination on first use.
    pub(crate) fn bus_node(&mut self) -> Result<NodeId, ToneError> {
        if let Some(bus) = &self.bus {
            return Ok(bus.gain);
        }
        let bus = OutputBus::create(&mut self.host)?;
        tracing::debug!(node = %bus.gain, "output bus created");
        let gain = bus.gain;
        self.bus = Some(bus);
        Ok(gain)
    }

    pub(crate) fn bus(&self) -> Option<&OutputBus> {
        self.bus.as_ref()
    }

    /// Close the host. Voices still held by callers become inert.
    pub fn shutdown(&mut self) {
        self.bus = None;
        self.host.close();
        tracing::debug!("audio system shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::graph::SoftwareHost;

    fn host() -> SoftwareHost {
        SoftwareHost::new(48000.0).expect("valid sample rate")
    }

    #[test]
    fn bus_is_created_lazily_once() {
        let mut system = AudioSystem::new(host());
        assert!(system.bus().is_none());
        assert_eq!(system.host().node_count(), 0);

        let first = system.bus_node().expect("open host");
        let second = system.bus_node().expect("open host");
        assert_eq!(first, second);
        assert_eq!(system.host().node_count(), 1);
        assert!(system.host().is_connected(first));
        assert_eq!(system.host().param_value(first), Some(0.0), "Bus should start silent");
    }

    #[test]
    fn shutdown_closes_host() {
        let mut system = AudioSystem::new(host());
        system.bus_node().expect("open host");
        system.shutdown();
        assert_eq!(system.host().state(), HostState::Closed);
        assert!(matches!(
            system.bus_node(),
            Err(ToneError::UnsupportedEnvironment(_))
        ));
    }
}
