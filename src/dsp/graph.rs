//! Software audio host: renders a small oscillator/gain graph in Rust.
//!
//! Every node has one automatable parameter (frequency for oscillators,
//! gain for gain nodes) and at most one output. Rendering walks the nodes
//! in topological order once per sample, so parameter events land on the
//! exact sample they were scheduled for.

use std::collections::VecDeque;

use crate::error::ToneError;
use crate::host::{AudioHost, HostState, NodeId, Target};

use super::mixer::Mixer;
use super::oscillator::Oscillator;
use super::param::AudioParam;

/// Whether `resume` needs a prior user activation, as browsers require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPolicy {
    AllowAutoplay,
    RequireActivation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Idle,
    Started,
    Stopped,
}

#[derive(Debug, Clone)]
enum Kind {
    Oscillator(Oscillator, Playback),
    Gain,
}

#[derive(Debug, Clone)]
struct Slot {
    kind: Kind,
    param: AudioParam,
    output: Option<Target>,
}

/// Arena entry. The generation is bumped on release so stale handles
/// miss the node that reuses the index.
#[derive(Debug, Clone, Default)]
struct Entry {
    generation: u32,
    slot: Option<Slot>,
}

#[derive(Debug, Clone)]
pub struct SoftwareHost {
    sample_rate: f64,
    frame: u64,
    state: HostState,
    policy: HostPolicy,
    activated: bool,
    /// Indexed by node index.
    slots: Vec<Entry>,
    /// Released indices, reused before the arena grows.
    free: Vec<u32>,
    /// Topological render order; rebuilt after any graph change.
    plan: Option<Vec<usize>>,
    inputs: Vec<f64>,
    mixer: Mixer,
}

impl SoftwareHost {
    pub fn new(sample_rate: f64) -> Result<Self, ToneError> {
        Self::with_policy(sample_rate, HostPolicy::AllowAutoplay)
    }

    /// Fails with `InvalidParameter` unless `sample_rate` is finite and
    /// positive.
    pub fn with_policy(sample_rate: f64, policy: HostPolicy) -> Result<Self, ToneError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ToneError::InvalidParameter { value: sample_rate });
        }
        Ok(SoftwareHost {
            sample_rate,
            frame: 0,
            state: HostState::Suspended,
            policy,
            activated: false,
            slots: Vec::new(),
            free: Vec::new(),
            plan: None,
            inputs: Vec::new(),
            mixer: Mixer::new(),
        })
    }

    /// Record a user gesture; unlocks `resume` under `RequireActivation`.
    pub fn grant_activation(&mut self) {
        self.activated = true;
    }

    /// Pause the clock. Graph and parameters are kept.
    pub fn suspend(&mut self) {
        if self.state == HostState::Running {
            self.state = HostState::Suspended;
        }
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.live().count()
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.slot(node).is_ok_and(|s| s.output.is_some())
    }

    /// Render mono frames into `out`.
    ///
    /// Writes silence without advancing the clock unless running.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.state != HostState::Running {
            out.fill(0.0);
            return;
        }

        let plan = match self.plan.take() {
            Some(plan) => plan,
            None => self.build_plan(),
        };

        self.mixer.clear(out.len());
        self.inputs.resize(self.slots.len(), 0.0);
        for i in 0..out.len() {
            let now = self.frame as f64 / self.sample_rate;
            self.inputs.fill(0.0);
            for &idx in &plan {
                let Some(slot) = self.slots[idx].slot.as_mut() else {
                    continue;
                };
                let value = slot.param.advance(now, self.sample_rate);
                let sample = match &mut slot.kind {
                    Kind::Oscillator(osc, playback) => {
                        osc.frequency = value;
                        if *playback == Playback::Started {
                            osc.next_sample()
                        } else {
                            0.0
                        }
                    }
                    Kind::Gain => self.inputs[idx] * value,
                };
                match slot.output {
                    Some(Target::Node(to)) => self.inputs[to.index as usize] += sample,
                    Some(Target::Destination) => self.mixer.add(i, sample),
                    None => {}
                }
            }
            self.frame += 1;
        }
        self.mixer.write_to(out);
        self.plan = Some(plan);
    }

    fn live(&self) -> impl Iterator<Item = (usize, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| entry.slot.as_ref().map(|slot| (idx, slot)))
    }

    /// Kahn's algorithm over the live nodes. Sources come first.
    fn build_plan(&self) -> Vec<usize> {
        let mut in_degree = vec![0usize; self.slots.len()];
        for (_, slot) in self.live() {
            if let Some(Target::Node(to)) = slot.output {
                in_degree[to.index as usize] += 1;
            }
        }

        let mut queue: VecDeque<usize> = self
            .live()
            .filter(|(idx, _)| in_degree[*idx] == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut plan = Vec::with_capacity(queue.len());
        while let Some(idx) = queue.pop_front() {
            plan.push(idx);
            if let Some(Target::Node(to)) = self.slots[idx].slot.as_ref().and_then(|s| s.output) {
                let to = to.index as usize;
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    queue.push_back(to);
                }
            }
        }
        plan
    }

    fn ensure_open(&self) -> Result<(), ToneError> {
        if self.state == HostState::Closed {
            Err(ToneError::UnsupportedEnvironment(
                "audio host is closed".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn slot(&self, node: NodeId) -> Result<&Slot, ToneError> {
        self.slots
            .get(node.index as usize)
            .filter(|entry| entry.generation == node.generation)
            .and_then(|entry| entry.slot.as_ref())
            .ok_or(ToneError::UnknownNode(node))
    }

    fn slot_mut(&mut self, node: NodeId) -> Result<&mut Slot, ToneError> {
        self.ensure_open()?;
        self.slots
            .get_mut(node.index as usize)
            .filter(|entry| entry.generation == node.generation)
            .and_then(|entry| entry.slot.as_mut())
            .ok_or(ToneError::UnknownNode(node))
    }

    fn insert(&mut self, kind: Kind, initial: f64) -> Result<NodeId, ToneError> {
        self.ensure_open()?;
        if !initial.is_finite() {
            return Err(ToneError::InvalidParameter { value: initial });
        }
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Entry::default());
                (self.slots.len() - 1) as u32
            }
        };
        let entry = &mut self.slots[index as usize];
        entry.slot = Some(Slot {
            kind,
            param: AudioParam::new(initial),
            output: None,
        });
        self.plan = None;
        Ok(NodeId {
            index,
            generation: entry.generation,
        })
    }

    fn oscillator_mut(&mut self, node: NodeId) -> Result<&mut Playback, ToneError> {
        match &mut self.slot_mut(node)?.kind {
            Kind::Oscillator(_, playback) => Ok(playback),
            Kind::Gain => Err(ToneError::InvalidState(format!(
                "node {node} is not an oscillator"
            ))),
        }
    }
}

impl AudioHost for SoftwareHost {
    fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate
    }

    fn state(&self) -> HostState {
        self.state
    }

    fn resume(&mut self) -> Result<(), ToneError> {
        self.ensure_open()?;
        if self.policy == HostPolicy::RequireActivation && !self.activated {
            return Err(ToneError::HostPolicyDenied(
                "resume requires a user activation".to_string(),
            ));
        }
        self.state = HostState::Running;
        Ok(())
    }

    fn close(&mut self) {
        self.state = HostState::Closed;
        self.slots.clear();
        self.free.clear();
        self.plan = None;
    }

    fn create_oscillator(&mut self, frequency: f64) -> Result<NodeId, ToneError> {
        let osc = Oscillator::new(frequency, self.sample_rate);
        self.insert(Kind::Oscillator(osc, Playback::Idle), frequency)
    }

    fn create_gain(&mut self, initial: f64) -> Result<NodeId, ToneError> {
        self.insert(Kind::Gain, initial)
    }

    /// Each node feeds one target; connecting again re-routes it.
    fn connect(&mut self, from: NodeId, to: Target) -> Result<(), ToneError> {
        self.slot_mut(from)?;
        if let Target::Node(mut cursor) = to {
            loop {
                if cursor == from {
                    return Err(ToneError::InvalidState(format!(
                        "connecting {from} to {cursor} would create a cycle"
                    )));
                }
                match self.slot(cursor)?.output {
                    Some(Target::Node(next)) => cursor = next,
                    _ => break,
                }
            }
        }
        self.slot_mut(from)?.output = Some(to);
        self.plan = None;
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), ToneError> {
        self.slot_mut(node)?.output = None;
        self.plan = None;
        Ok(())
    }

    fn start(&mut self, oscillator: NodeId) -> Result<(), ToneError> {
        let playback = self.oscillator_mut(oscillator)?;
        if *playback != Playback::Idle {
            return Err(ToneError::InvalidState(format!(
                "oscillator {oscillator} was already started"
            )));
        }
        *playback = Playback::Started;
        Ok(())
    }

    fn stop(&mut self, oscillator: NodeId) -> Result<(), ToneError> {
        let playback = self.oscillator_mut(oscillator)?;
        match *playback {
            Playback::Started => {
                *playback = Playback::Stopped;
                Ok(())
            }
            Playback::Idle => Err(ToneError::InvalidState(format!(
                "oscillator {oscillator} was never started"
            ))),
            Playback::Stopped => Err(ToneError::InvalidState(format!(
                "oscillator {oscillator} is already stopped"
            ))),
        }
    }

    fn release(&mut self, node: NodeId) -> Result<(), ToneError> {
        self.slot_mut(node)?;
        let entry = &mut self.slots[node.index as usize];
        entry.slot = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(node.index);
        for slot in self.slots.iter_mut().filter_map(|e| e.slot.as_mut()) {
            if slot.output == Some(Target::Node(node)) {
                slot.output = None;
            }
        }
        self.plan = None;
        Ok(())
    }

    fn set_value_at_time(
        &mut self,
        node: NodeId,
        value: f64,
        time: f64,
    ) -> Result<(), ToneError> {
        self.slot_mut(node)?.param.set_value_at_time(value, time)
    }

    fn set_target_at_time(
        &mut self,
        node: NodeId,
        target: f64,
        time: f64,
        time_constant: f64,
    ) -> Result<(), ToneError> {
        self.slot_mut(node)?
            .param
            .set_target_at_time(target, time, time_constant)
    }

    fn param_value(&self, node: NodeId) -> Option<f64> {
        self.slot(node).ok().map(|s| s.param.value())
    }
}
