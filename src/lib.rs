pub mod bus;
pub mod config;
pub mod dsp;
pub mod error;
pub mod host;
pub mod pitch;
pub mod session;
pub mod system;
pub mod voice;

use std::fmt::Display;

use crate::config::ToneConfig;
use crate::dsp::graph::SoftwareHost;
use crate::pitch::{NoteId, PitchClass};
use crate::session::{Action, OctaveOption, Session, WaveId, WaveModel, WavePatch};
use wasm_bindgen::prelude::*;

pub use crate::bus::PlaybackState;
pub use crate::error::ToneError;
pub use crate::pitch::{NearestNote, NoteTable, nearest_note};
pub use crate::system::AudioSystem;
pub use crate::voice::VoiceHandle;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the sinegen-core version string.
#[wasm_bindgen(js_name = coreVersion)]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_err(e: impl Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

/// WASM-exposed: nearest note to `freq` as
/// `{ name, root, octave, cents, absCents }`, or `null`.
#[wasm_bindgen(js_name = nearestNote)]
pub fn find_nearest_note(freq: f64) -> Result<JsValue, JsValue> {
    match nearest_note(freq) {
        Some(n) => serde_wasm_bindgen::to_value(&n).map_err(js_err),
        None => Ok(JsValue::NULL),
    }
}

/// WASM-exposed tone generator. Starts with one wave, paused.
///
/// The AudioWorklet pulls mono samples with `render`; the page calls
/// `togglePlay` from a click handler after resuming its AudioContext.
#[wasm_bindgen]
pub struct ToneGenerator {
    session: Session<SoftwareHost>,
}

impl ToneGenerator {
    fn build(sample_rate: f64, config: ToneConfig) -> Result<ToneGenerator, ToneError> {
        let mut session = Session::with_config(SoftwareHost::new(sample_rate)?, config)?;
        session.dispatch(Action::AddWave)?;
        Ok(ToneGenerator { session })
    }

    fn from_json(sample_rate: f64, config_json: &str) -> Result<ToneGenerator, ToneError> {
        Self::build(sample_rate, ToneConfig::from_json(config_json)?)
    }

    fn change(&mut self, id: WaveId, patch: WavePatch) -> Result<(), JsValue> {
        self.session
            .dispatch(Action::ChangeWave(id, patch))
            .map(|_| ())
            .map_err(js_err)
    }

    fn snap(&mut self, id: WaveId, note: &str) -> Result<(), ToneError> {
        let note: NoteId = note.parse()?;
        self.session.dispatch(Action::SnapToNote(id, note)).map(|_| ())
    }

    fn octave_menu(
        &self,
        pitch_class: &str,
        current_freq: Option<f64>,
    ) -> Result<Vec<OctaveOption>, ToneError> {
        let pc = PitchClass::from_name(pitch_class)
            .ok_or_else(|| ToneError::InvalidNoteName(pitch_class.to_string()))?;
        Ok(self.session.octave_options(pc, current_freq))
    }
}

#[wasm_bindgen]
impl ToneGenerator {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64) -> Result<ToneGenerator, JsValue> {
        Self::build(sample_rate, ToneConfig::default()).map_err(js_err)
    }

    /// Construct with a JSON config; missing fields keep their defaults.
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(sample_rate: f64, config_json: &str) -> Result<ToneGenerator, JsValue> {
        Self::from_json(sample_rate, config_json).map_err(js_err)
    }

    /// Returns the new wave's id.
    #[wasm_bindgen(js_name = addWave)]
    pub fn add_wave(&mut self) -> Result<u32, JsValue> {
        self.session.dispatch(Action::AddWave).map_err(js_err)?;
        self.session
            .waves()
            .last()
            .map(|w| w.id)
            .ok_or_else(|| js_err("wave was not added"))
    }

    #[wasm_bindgen(js_name = deleteWave)]
    pub fn delete_wave(&mut self, id: u32) -> Result<(), JsValue> {
        self.session
            .dispatch(Action::DeleteWave(id))
            .map(|_| ())
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = setFrequency)]
    pub fn set_frequency(&mut self, id: u32, freq: f64) -> Result<(), JsValue> {
        let patch = WavePatch {
            freq: Some(freq),
            ..WavePatch::default()
        };
        self.change(id, patch)
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&mut self, id: u32, volume: f64) -> Result<(), JsValue> {
        let patch = WavePatch {
            volume: Some(volume),
            ..WavePatch::default()
        };
        self.change(id, patch)
    }

    #[wasm_bindgen(js_name = setMuted)]
    pub fn set_muted(&mut self, id: u32, muted: bool) -> Result<(), JsValue> {
        let patch = WavePatch {
            muted: Some(muted),
            ..WavePatch::default()
        };
        self.change(id, patch)
    }

    #[wasm_bindgen(js_name = setColor)]
    pub fn set_color(&mut self, id: u32, color: String) -> Result<(), JsValue> {
        let patch = WavePatch {
            color: Some(color),
            ..WavePatch::default()
        };
        self.change(id, patch)
    }

    /// Tune a wave to a note name such as "A#4".
    #[wasm_bindgen(js_name = snapToNote)]
    pub fn snap_to_note(&mut self, id: u32, note: &str) -> Result<(), JsValue> {
        self.snap(id, note).map_err(js_err)
    }

    /// Flip play/pause. Returns whether the generator is now playing.
    #[wasm_bindgen(js_name = togglePlay)]
    pub fn toggle_play(&mut self) -> Result<bool, JsValue> {
        self.session.dispatch(Action::TogglePlay).map_err(js_err)?;
        Ok(self.session.playback().is_playing())
    }

    #[wasm_bindgen(js_name = isPlaying)]
    pub fn is_playing(&self) -> bool {
        self.session.playback().is_playing()
    }

    #[wasm_bindgen(js_name = isAudible)]
    pub fn is_audible(&self) -> bool {
        self.session.is_audible()
    }

    #[wasm_bindgen(js_name = outputBlocked)]
    pub fn output_blocked(&self) -> bool {
        self.session.output_blocked()
    }

    pub fn readout(&self, id: u32) -> Option<String> {
        self.session.readout(id)
    }

    /// All waves as an array of `{ id, freq, volume, muted, color }`.
    pub fn waves(&self) -> Result<JsValue, JsValue> {
        let waves: Vec<&WaveModel> = self.session.waves().collect();
        serde_wasm_bindgen::to_value(&waves).map_err(js_err)
    }

    /// Octave menu for a pitch class name ("C", "F#", ...).
    #[wasm_bindgen(js_name = octaveOptions)]
    pub fn octave_options(
        &self,
        pitch_class: &str,
        current_freq: Option<f64>,
    ) -> Result<JsValue, JsValue> {
        let options = self.octave_menu(pitch_class, current_freq).map_err(js_err)?;
        serde_wasm_bindgen::to_value(&options).map_err(js_err)
    }

    /// Render `frames` mono samples for the AudioWorklet.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0_f32; frames];
        self.session.system_mut().host_mut().render(&mut out);
        out
    }

    pub fn shutdown(&mut self) {
        self.session.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_starts_with_one_paused_wave() {
        let tg = ToneGenerator::build(48000.0, ToneConfig::default()).expect("host available");
        assert_eq!(tg.session.waves().count(), 1);
        assert!(!tg.is_playing());
        assert!(!tg.is_audible());
    }

    #[test]
    fn generator_plays_after_toggle() {
        let mut tg = ToneGenerator::build(48000.0, ToneConfig::default()).expect("host available");
        assert!(tg.render(128).iter().all(|&s| s == 0.0), "Paused generator should be silent");

        tg.session.dispatch(Action::TogglePlay).expect("host available");
        let out = tg.render(9600);
        assert_eq!(out.len(), 9600);
        assert!(out.iter().any(|s| s.abs() > 0.1));
        assert!(tg.is_audible());
    }

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn unusable_sample_rate_is_rejected() {
        assert!(matches!(
            ToneGenerator::build(0.0, ToneConfig::default()),
            Err(ToneError::InvalidParameter { .. })
        ));
        assert!(ToneGenerator::build(f64::NAN, ToneConfig::default()).is_err());
    }

    #[test]
    fn json_config_is_applied_or_rejected() {
        let tg = ToneGenerator::from_json(48000.0, r#"{ "defaultWave": { "freq": 261.5 } }"#)
            .expect("valid config");
        let freq = tg.session.waves().next().map(|w| w.freq);
        assert_eq!(freq, Some(261.5));

        assert!(matches!(
            ToneGenerator::from_json(48000.0, "{ not json"),
            Err(ToneError::Config(_))
        ));
        assert!(ToneGenerator::from_json(48000.0, r#"{ "tuningPitch": -1 }"#).is_err());
    }

    #[test]
    fn snap_parses_note_names() {
        let mut tg = ToneGenerator::build(48000.0, ToneConfig::default()).expect("host available");
        let id = tg.session.waves().next().map(|w| w.id).expect("one wave");
        tg.snap(id, "C5").expect("valid note");
        let c5: NoteId = "C5".parse().expect("valid note");
        let expected = format!("{} Hz (C5)", tg.session.table().frequency(c5));
        assert_eq!(tg.readout(id), Some(expected.clone()));

        for bad in ["H4", "A", "a4", ""] {
            assert!(
                matches!(tg.snap(id, bad), Err(ToneError::InvalidNoteName(_))),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(tg.readout(id), Some(expected), "Bad names should leave the wave alone");
    }

    #[test]
    fn octave_menu_marks_the_nearest_octave() {
        let tg = ToneGenerator::build(48000.0, ToneConfig::default()).expect("host available");
        let menu = tg.octave_menu("A", Some(445.0)).expect("valid pitch class");
        assert_eq!(menu.len(), 9);
        let marked: Vec<String> = menu
            .iter()
            .filter(|o| o.is_nearest)
            .map(|o| o.note.to_string())
            .collect();
        assert_eq!(marked, ["A4"]);

        assert!(matches!(
            tg.octave_menu("X", None),
            Err(ToneError::InvalidNoteName(_))
        ));
    }
}
