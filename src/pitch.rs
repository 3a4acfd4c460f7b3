//! Pitch Mapper: nearest equal-tempered note for an arbitrary frequency.
//!
//! Distance is measured in cents (`1200 * log2(f / ref)`), so a note a
//! semitone sharp and a note a semitone flat are equally far away even
//! though their distances in Hz differ.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Serialize, Serializer};

use crate::error::ToneError;

/// Reference pitch of A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

/// The twelve pitch classes, sharps only, in ascending order from C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitones above C.
    pub fn semitone(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        PitchClass::ALL.into_iter().find(|pc| pc.name() == name)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for PitchClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// An octave number within the note table's range (0..=8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Octave(u8);

impl Octave {
    pub const LOWEST: u8 = 0;
    pub const HIGHEST: u8 = 8;

    pub fn new(number: u8) -> Option<Self> {
        (number <= Self::HIGHEST).then_some(Octave(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Every octave the table covers, lowest first.
    pub fn all() -> impl Iterator<Item = Octave> {
        (Self::LOWEST..=Self::HIGHEST).map(Octave)
    }
}

/// Typed key into the [`NoteTable`]: a pitch class in a given octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteId {
    pub pitch_class: PitchClass,
    pub octave: Octave,
}

impl NoteId {
    pub fn new(pitch_class: PitchClass, octave: u8) -> Result<Self, ToneError> {
        let octave = Octave::new(octave)
            .ok_or_else(|| ToneError::InvalidNoteName(format!("{pitch_class}{octave}")))?;
        Ok(NoteId { pitch_class, octave })
    }

    /// MIDI note number: C4 = 60, A4 = 69.
    pub fn midi(self) -> i32 {
        12 * (self.octave.number() as i32 + 1) + self.pitch_class.semitone() as i32
    }

    fn table_index(self) -> usize {
        self.octave.number() as usize * 12 + self.pitch_class.semitone() as usize
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave.number())
    }
}

/// Parses `[A-G]#?[0-9]+`, e.g. "A4" or "C#0".
impl FromStr for NoteId {
    type Err = ToneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ToneError::InvalidNoteName(s.to_string());

        let split = s.find(|c: char| c.is_ascii_digit()).ok_or_else(invalid)?;
        let (root, digits) = s.split_at(split);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let pitch_class = PitchClass::from_name(root).ok_or_else(invalid)?;
        let octave: u8 = digits.parse().map_err(|_| invalid())?;
        let octave = Octave::new(octave).ok_or_else(invalid)?;
        Ok(NoteId { pitch_class, octave })
    }
}

impl Serialize for NoteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of mapping a frequency onto the note table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestNote {
    #[serde(rename = "name")]
    pub note: NoteId,
    pub root: PitchClass,
    pub octave: u8,
    /// Signed distance from the note; positive means sharp.
    pub cents: f64,
    pub abs_cents: f64,
}

impl NearestNote {
    pub fn is_exact(&self) -> bool {
        self.abs_cents == 0.0
    }
}

/// Equal-tempered reference frequencies for C0 through B8.
///
/// Entries are stored in ascending frequency order, which is also the
/// enumeration order used by [`NoteTable::nearest`]: on an exact tie the
/// lower note wins.
#[derive(Debug, Clone)]
pub struct NoteTable {
    entries: Vec<(NoteId, f64)>,
}

impl NoteTable {
    /// The A4 = 440 Hz table, built once per process.
    pub fn standard() -> &'static NoteTable {
        static STANDARD: OnceLock<NoteTable> = OnceLock::new();
        STANDARD.get_or_init(|| NoteTable::build(A4_FREQUENCY))
    }

    /// Build a table around a custom A4 reference (e.g. 432 Hz).
    pub fn with_tuning(tuning_pitch: f64) -> Result<Self, ToneError> {
        if !tuning_pitch.is_finite() || tuning_pitch <= 0.0 {
            return Err(ToneError::InvalidFrequency(tuning_pitch));
        }
        Ok(NoteTable::build(tuning_pitch))
    }

    fn build(tuning_pitch: f64) -> Self {
        let entries = Octave::all()
            .flat_map(|octave| {
                PitchClass::ALL.into_iter().map(move |pitch_class| {
                    let note = NoteId { pitch_class, octave };
                    (note, midi_to_frequency(note.midi(), tuning_pitch))
                })
            })
            .collect();
        NoteTable { entries }
    }

    pub fn frequency(&self, note: NoteId) -> f64 {
        self.entries[note.table_index()].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (NoteId, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nearest note to `freq` by absolute cents.
    ///
    /// Returns `None` for non-finite or non-positive input. Frequencies
    /// beyond either end of the table map to the edge note.
    pub fn nearest(&self, freq: f64) -> Option<NearestNote> {
        if !freq.is_finite() || freq <= 0.0 {
            return None;
        }

        let mut best: Option<(NoteId, f64)> = None;
        let mut best_abs = f64::INFINITY;
        for (note, reference) in self.iter() {
            let cents = cents_between(freq, reference);
            if cents.abs() < best_abs {
                best_abs = cents.abs();
                best = Some((note, cents));
            }
        }

        let (note, cents) = best?;
        Some(NearestNote {
            note,
            root: note.pitch_class,
            octave: note.octave.number(),
            cents,
            abs_cents: best_abs,
        })
    }
}

/// Nearest note on the standard A4 = 440 Hz table.
pub fn nearest_note(freq: f64) -> Option<NearestNote> {
    NoteTable::standard().nearest(freq)
}

/// Signed pitch distance from `reference` to `freq` in cents.
pub fn cents_between(freq: f64, reference: f64) -> f64 {
    1200.0 * (freq / reference).log2()
}

/// `tuning_pitch * 2^((midi - 69) / 12)`
pub fn midi_to_frequency(midi: i32, tuning_pitch: f64) -> f64 {
    tuning_pitch * 2.0_f64.powf((midi as f64 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(s: &str) -> NoteId {
        s.parse().expect("valid note name")
    }

    #[test]
    fn a4_is_exact() {
        let n = nearest_note(440.0).expect("440 Hz should match");
        assert_eq!(n.note.to_string(), "A4");
        assert_eq!(n.root, PitchClass::A);
        assert_eq!(n.octave, 4);
        assert_eq!(n.cents, 0.0);
        assert!(n.is_exact());
    }

    #[test]
    fn slightly_sharp_a_sharp() {
        let n = nearest_note(466.5).expect("466.5 Hz should match");
        assert_eq!(n.note, note("A#4"));
        assert!(n.cents > 0.0 && n.cents < 5.0, "Expected small sharp offset, got {}", n.cents);
        assert_eq!(n.abs_cents, n.cents);
    }

    #[test]
    fn flat_offset_is_negative() {
        // 432 Hz sits about 31.8 cents under A4
        let n = nearest_note(432.0).expect("432 Hz should match");
        assert_eq!(n.note, note("A4"));
        assert!((n.cents - (-31.77)).abs() < 0.1, "Expected ~-31.8 cents, got {}", n.cents);
        assert!((n.abs_cents - 31.77).abs() < 0.1);
    }

    #[test]
    fn rejects_non_positive_and_non_finite() {
        for f in [0.0, -0.0, -440.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(nearest_note(f).is_none(), "{f} should not match a note");
        }
    }

    #[test]
    fn every_table_entry_maps_to_itself() {
        let table = NoteTable::standard();
        assert_eq!(table.len(), 108);
        for (id, freq) in table.iter() {
            let n = table.nearest(freq).expect("table frequency should match");
            assert_eq!(n.note, id, "{freq} Hz should map back to {id}");
            assert_eq!(n.cents, 0.0, "{id} should be exact");
        }
    }

    #[test]
    fn table_is_ascending() {
        let freqs: Vec<f64> = NoteTable::standard().iter().map(|(_, f)| f).collect();
        assert!(freqs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(NoteTable::standard().iter().next().map(|(id, _)| id), Some(note("C0")));
        assert_eq!(NoteTable::standard().iter().last().map(|(id, _)| id), Some(note("B8")));
    }

    #[test]
    fn reference_frequencies() {
        let table = NoteTable::standard();
        assert!((table.frequency(note("A0")) - 27.5).abs() < 1e-9);
        assert!((table.frequency(note("C4")) - 261.6256).abs() < 1e-3);
        assert!((table.frequency(note("C0")) - 16.3516).abs() < 1e-3);
        assert!((table.frequency(note("B8")) - 7902.133).abs() < 1e-2);
    }

    #[test]
    fn root_is_octave_invariant() {
        for f in [33.3, 100.0, 123.4, 261.0, 300.0, 777.7, 1000.0, 2500.0] {
            let low = nearest_note(f).expect("in range");
            let high = nearest_note(2.0 * f).expect("in range");
            assert_eq!(low.root, high.root, "{f} Hz and {} Hz should share a root", 2.0 * f);
            assert_eq!(low.octave + 1, high.octave);
        }
    }

    #[test]
    fn out_of_range_maps_to_edge_notes() {
        let low = nearest_note(1.0).expect("positive input should match");
        assert_eq!(low.note, note("C0"));
        assert!(low.cents < 0.0);

        let high = nearest_note(20_000.0).expect("positive input should match");
        assert_eq!(high.note, note("B8"));
        assert!(high.cents > 0.0);
    }

    #[test]
    fn custom_tuning() {
        let table = NoteTable::with_tuning(432.0).expect("valid tuning");
        let n = table.nearest(432.0).expect("should match");
        assert_eq!(n.note, note("A4"));
        assert_eq!(n.cents, 0.0);
        assert!(NoteTable::with_tuning(0.0).is_err());
        assert!(NoteTable::with_tuning(f64::NAN).is_err());
    }

    #[test]
    fn parses_note_names() {
        let id = note("A#4");
        assert_eq!(id.pitch_class, PitchClass::ASharp);
        assert_eq!(id.octave.number(), 4);
        assert_eq!(id.midi(), 70);
        assert_eq!(note("C4").midi(), 60);
        assert_eq!(note("C0").to_string(), "C0");
    }

    #[test]
    fn rejects_malformed_note_names() {
        for bad in ["", "A", "A#", "H4", "a4", "Bb4", "E#4", "A9", "A4x", "#4", "A-1", "A300"] {
            assert!(
                bad.parse::<NoteId>().is_err(),
                "'{bad}' should not parse as a note"
            );
        }
    }

    #[test]
    fn note_id_validates_octave() {
        assert!(NoteId::new(PitchClass::G, 8).is_ok());
        assert!(matches!(
            NoteId::new(PitchClass::G, 9),
            Err(ToneError::InvalidNoteName(_))
        ));
    }

    #[test]
    fn serializes_with_display_names() {
        let n = nearest_note(440.0).expect("should match");
        let json = serde_json::to_value(&n).expect("serializable");
        assert_eq!(json["name"], "A4");
        assert_eq!(json["root"], "A");
        assert_eq!(json["octave"], 4);
        assert_eq!(json["absCents"], 0.0);
    }
}
