//! Tunable constants for the tone generator, loadable from JSON.

use serde::{Deserialize, Serialize};

use crate::error::ToneError;

/// Settings for a new wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveDefaults {
    pub freq: f64,
    pub volume: f64,
    pub color: String,
}

impl Default for WaveDefaults {
    fn default() -> Self {
        WaveDefaults {
            freq: 440.0,
            volume: 0.3,
            color: "#7cafc2".to_string(),
        }
    }
}

/// Engine and display configuration.
///
/// Missing JSON fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToneConfig {
    /// Lower bound of a voice's frequency, in Hz.
    pub min_frequency: f64,
    /// Upper bound of a voice's frequency, in Hz.
    pub max_frequency: f64,
    /// A4 reference for the note table.
    pub tuning_pitch: f64,
    /// Bus gain while playing.
    pub bus_target_gain: f64,
    /// Seconds.
    pub bus_time_constant: f64,
    /// Seconds.
    pub voice_time_constant: f64,
    /// Bus gain above which output counts as audible.
    pub audible_threshold: f64,
    pub default_wave: WaveDefaults,
}

impl Default for ToneConfig {
    fn default() -> Self {
        ToneConfig {
            min_frequency: 20.0,
            max_frequency: 8000.0,
            tuning_pitch: 440.0,
            bus_target_gain: 0.9,
            bus_time_constant: 0.02,
            voice_time_constant: 0.01,
            audible_threshold: 0.0001,
            default_wave: WaveDefaults::default(),
        }
    }
}

impl ToneConfig {
    pub fn from_json(json: &str) -> Result<Self, ToneError> {
        let config: ToneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ToneError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(ToneError::Config(format!("{name} must be a positive number, got {v}")))
            }
        };
        positive("minFrequency", self.min_frequency)?;
        positive("maxFrequency", self.max_frequency)?;
        positive("tuningPitch", self.tuning_pitch)?;
        if self.min_frequency > self.max_frequency {
            return Err(ToneError::Config(format!(
                "minFrequency {} exceeds maxFrequency {}",
                self.min_frequency, self.max_frequency
            )));
        }
        for (name, v) in [
            ("busTimeConstant", self.bus_time_constant),
            ("voiceTimeConstant", self.voice_time_constant),
            ("busTargetGain", self.bus_target_gain),
            ("audibleThreshold", self.audible_threshold),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ToneError::Config(format!(
                    "{name} must be zero or positive, got {v}"
                )));
            }
        }
        Ok(())
    }

    /// Clamp a frequency into the playable window.
    pub fn clamp_frequency(&self, freq: f64) -> f64 {
        freq.clamp(self.min_frequency, self.max_frequency)
    }

    pub fn in_window(&self, freq: f64) -> bool {
        (self.min_frequency..=self.max_frequency).contains(&freq)
    }
}
