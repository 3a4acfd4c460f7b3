//! The capability set the core needs from a host audio subsystem.
//!
//! Anything that can run a continuous sine source, scale it through a
//! rampable gain, route it into a physical output and report whether it is
//! running can back the voice engine. [`crate::dsp::graph::SoftwareHost`]
//! renders the graph itself; the `native` feature wraps it around an output
//! device.

use std::fmt;

use crate::error::ToneError;

/// Opaque handle to a node in the host's audio graph.
///
/// Hosts may reuse a released node's index; the generation tells a stale
/// handle apart from the node now living there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Suspended,
    Running,
    Closed,
}

/// Where a node's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    /// The physical output.
    Destination,
}

pub trait AudioHost {
    /// Host clock in seconds. Stands still while suspended.
    fn current_time(&self) -> f64;

    fn state(&self) -> HostState;

    /// Bring the host to `Running`. May be refused by host policy.
    fn resume(&mut self) -> Result<(), ToneError>;

    /// Stop rendering for good. Later graph calls fail.
    fn close(&mut self);

    /// A sine source at `frequency` Hz. Silent until started.
    fn create_oscillator(&mut self, frequency: f64) -> Result<NodeId, ToneError>;

    fn create_gain(&mut self, initial: f64) -> Result<NodeId, ToneError>;

    fn connect(&mut self, from: NodeId, to: Target) -> Result<(), ToneError>;

    fn disconnect(&mut self, node: NodeId) -> Result<(), ToneError>;

    fn start(&mut self, oscillator: NodeId) -> Result<(), ToneError>;

    /// Fails with `InvalidState` when the oscillator already stopped.
    fn stop(&mut self, oscillator: NodeId) -> Result<(), ToneError>;

    /// Drop a node from the graph. Its handle is dead afterwards.
    fn release(&mut self, node: NodeId) -> Result<(), ToneError>;

    /// Jump the node's parameter (frequency or gain) to `value` at `time`.
    fn set_value_at_time(&mut self, node: NodeId, value: f64, time: f64)
    -> Result<(), ToneError>;

    /// Exponentially approach `target` from `time` on.
    fn set_target_at_time(
        &mut self,
        node: NodeId,
        target: f64,
        time: f64,
        time_constant: f64,
    ) -> Result<(), ToneError>;

    /// The parameter value as last rendered.
    fn param_value(&self, node: NodeId) -> Option<f64>;
}
