//! Session: the wave list and play/pause state, updated one action at a
//! time.
//!
//! Views send an [`Action`] to [`Session::dispatch`] and redraw from the
//! returned events. The session keeps each wave's voice in step with its
//! model, so a view never touches the audio system directly.

use serde::{Deserialize, Serialize};

use crate::bus::PlaybackState;
use crate::config::ToneConfig;
use crate::error::ToneError;
use crate::host::AudioHost;
use crate::pitch::{NearestNote, NoteId, NoteTable, Octave, PitchClass};
use crate::system::AudioSystem;
use crate::voice::VoiceHandle;

pub type WaveId = u32;

/// What the user sees and edits for one wave.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveModel {
    pub id: WaveId,
    pub freq: f64,
    pub volume: f64,
    pub muted: bool,
    pub color: String,
}

impl WaveModel {
    /// Gain actually sent to the voice.
    pub fn effective_gain(&self) -> f64 {
        if self.muted { 0.0 } else { self.volume }
    }
}

/// Partial update of a [`WaveModel`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WavePatch {
    pub freq: Option<f64>,
    pub volume: Option<f64>,
    pub muted: Option<bool>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddWave,
    ChangeWave(WaveId, WavePatch),
    DeleteWave(WaveId),
    /// Note picker: tune a wave to a table note.
    SnapToNote(WaveId, NoteId),
    TogglePlay,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    WaveAdded(WaveId),
    WaveChanged(WaveId),
    WaveRemoved(WaveId),
    PlaybackChanged(PlaybackState),
    /// Playback was switched on but the host would not start.
    OutputBlocked,
}

/// One entry in the note picker's octave menu.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OctaveOption {
    pub note: NoteId,
    pub frequency: f64,
    pub is_nearest: bool,
}

struct Row {
    model: WaveModel,
    voice: VoiceHandle,
}

pub struct Session<H: AudioHost> {
    system: AudioSystem<H>,
    table: NoteTable,
    rows: Vec<Row>,
    playback: PlaybackState,
    output_blocked: bool,
    next_id: WaveId,
}

impl<H: AudioHost> Session<H> {
    pub fn new(host: H) -> Result<Self, ToneError> {
        Self::with_config(host, ToneConfig::default())
    }

    pub fn with_config(host: H, config: ToneConfig) -> Result<Self, ToneError> {
        config.validate()?;
        let table = NoteTable::with_tuning(config.tuning_pitch)?;
        Ok(Session {
            system: AudioSystem::with_config(host, config),
            table,
            rows: Vec::new(),
            playback: PlaybackState::Stopped,
            output_blocked: false,
            next_id: 1,
        })
    }

    pub fn dispatch(&mut self, action: Action) -> Result<Vec<SessionEvent>, ToneError> {
        match action {
            Action::AddWave => self.add_wave(),
            Action::ChangeWave(id, patch) => self.change_wave(id, patch),
            Action::DeleteWave(id) => Ok(self.delete_wave(id)),
            Action::SnapToNote(id, note) => {
                let freq = self.table.frequency(note);
                let patch = WavePatch {
                    freq: Some(freq),
                    ..WavePatch::default()
                };
                self.change_wave(id, patch)
            }
            Action::TogglePlay => self.toggle_play(),
        }
    }

    fn add_wave(&mut self) -> Result<Vec<SessionEvent>, ToneError> {
        let next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| ToneError::InvalidState("wave ids exhausted".to_string()))?;
        let defaults = &self.system.config().default_wave;
        let model = WaveModel {
            id: self.next_id,
            freq: self.system.config().clamp_frequency(defaults.freq),
            volume: defaults.volume.clamp(0.0, 1.0),
            muted: false,
            color: defaults.color.clone(),
        };
        let voice = self.system.create_voice(model.freq, model.effective_gain())?;
        self.next_id = next_id;

        let id = model.id;
        self.rows.push(Row { model, voice });
        Ok(vec![SessionEvent::WaveAdded(id)])
    }

    fn change_wave(
        &mut self,
        id: WaveId,
        patch: WavePatch,
    ) -> Result<Vec<SessionEvent>, ToneError> {
        if let Some(freq) = patch.freq {
            if !freq.is_finite() {
                return Err(ToneError::InvalidFrequency(freq));
            }
        }
        if let Some(volume) = patch.volume {
            if !volume.is_finite() {
                return Err(ToneError::InvalidParameter { value: volume });
            }
        }

        let Some(row) = self.rows.iter_mut().find(|r| r.model.id == id) else {
            tracing::debug!(id, "change for unknown wave ignored");
            return Ok(Vec::new());
        };

        if let Some(freq) = patch.freq {
            row.model.freq = self.system.config().clamp_frequency(freq);
            self.system.set_frequency(&row.voice, row.model.freq);
        }
        if let Some(volume) = patch.volume {
            row.model.volume = volume.clamp(0.0, 1.0);
        }
        if let Some(muted) = patch.muted {
            row.model.muted = muted;
        }
        if patch.volume.is_some() || patch.muted.is_some() {
            self.system.set_gain(&row.voice, row.model.effective_gain());
        }
        if let Some(color) = patch.color {
            row.model.color = color;
        }
        Ok(vec![SessionEvent::WaveChanged(id)])
    }

    fn delete_wave(&mut self, id: WaveId) -> Vec<SessionEvent> {
        let Some(pos) = self.rows.iter().position(|r| r.model.id == id) else {
            return Vec::new();
        };
        let row = self.rows.remove(pos);
        self.system.destroy_voice(&row.voice);
        vec![SessionEvent::WaveRemoved(id)]
    }

    /// The play state flips even when the host refuses to start, so the
    /// toggle never sticks; the refusal is reported as `OutputBlocked` and
    /// the next toggle to playing retries.
    fn toggle_play(&mut self) -> Result<Vec<SessionEvent>, ToneError> {
        let mut events = Vec::new();
        match self.playback {
            PlaybackState::Stopped => {
                self.system.resume()?;
                self.playback = PlaybackState::Playing;
                self.output_blocked = !self.system.is_running();
                events.push(SessionEvent::PlaybackChanged(self.playback));
                if self.output_blocked {
                    events.push(SessionEvent::OutputBlocked);
                }
            }
            PlaybackState::Playing => {
                self.system.suspend_output()?;
                self.playback = PlaybackState::Stopped;
                self.output_blocked = false;
                events.push(SessionEvent::PlaybackChanged(self.playback));
            }
        }
        Ok(events)
    }

    pub fn waves(&self) -> impl Iterator<Item = &WaveModel> {
        self.rows.iter().map(|r| &r.model)
    }

    pub fn wave(&self, id: WaveId) -> Option<&WaveModel> {
        self.waves().find(|w| w.id == id)
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    /// True while playing but the host has not started.
    pub fn output_blocked(&self) -> bool {
        self.output_blocked
    }

    pub fn is_audible(&self) -> bool {
        self.system.is_audible()
    }

    pub fn system(&self) -> &AudioSystem<H> {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut AudioSystem<H> {
        &mut self.system
    }

    pub fn table(&self) -> &NoteTable {
        &self.table
    }

    /// Realized voice gain of a wave.
    pub fn voice_gain(&self, id: WaveId) -> Option<f64> {
        let row = self.rows.iter().find(|r| r.model.id == id)?;
        self.system.voice_gain(&row.voice)
    }

    /// Realized voice frequency of a wave.
    pub fn voice_frequency(&self, id: WaveId) -> Option<f64> {
        let row = self.rows.iter().find(|r| r.model.id == id)?;
        self.system.voice_frequency(&row.voice)
    }

    /// Nearest note for display; `None` outside the playable window.
    pub fn display_note(&self, freq: f64) -> Option<NearestNote> {
        if !self.system.config().in_window(freq) {
            return None;
        }
        self.table.nearest(freq)
    }

    /// Frequency label for a wave, e.g. `"440 Hz (A4)"` or
    /// `"450 Hz (~ A4)"` when off pitch.
    pub fn readout(&self, id: WaveId) -> Option<String> {
        let wave = self.wave(id)?;
        Some(match self.display_note(wave.freq) {
            Some(n) => {
                let approx = if n.abs_cents > 0.0 { "~ " } else { "" };
                format!("{} Hz ({approx}{})", wave.freq, n.note)
            }
            None => format!("{} Hz", wave.freq),
        })
    }

    /// Octave menu for `pitch_class`, marking the octave that holds the
    /// nearest note to `current_freq`.
    pub fn octave_options(
        &self,
        pitch_class: PitchClass,
        current_freq: Option<f64>,
    ) -> Vec<OctaveOption> {
        let nearest = current_freq.and_then(|f| self.table.nearest(f));
        Octave::all()
            .map(|octave| {
                let note = NoteId {
                    pitch_class,
                    octave,
                };
                OctaveOption {
                    note,
                    frequency: self.table.frequency(note),
                    is_nearest: nearest.as_ref().is_some_and(|n| n.note == note),
                }
            })
            .collect()
    }

    /// Destroy every voice and close the host.
    pub fn shutdown(&mut self) {
        for row in self.rows.drain(..) {
            self.system.destroy_voice(&row.voice);
        }
        self.playback = PlaybackState::Stopped;
        self.output_blocked = false;
        self.system.shutdown();
    }
}
