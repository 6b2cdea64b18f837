//! Transcription parameters

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CREPE_FRAME_STEP_SECONDS, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MIN_DURATION_SECONDS, DEFAULT_SMOOTH_SECONDS,
    MELODIA_HOP_SIZE, MELODIA_LEADING_SILENCE_FRAMES, MELODIA_SAMPLE_RATE,
};
use crate::error::{require_non_negative, require_positive, Result, TranscriptionError};
use crate::postprocessing::midi::MidiExportOptions;
use crate::postprocessing::segmentation::FinalRunPolicy;
use crate::preprocessing::smoothing::BoundaryMode;

/// Which kind of pitch track is being transcribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Frames carry a confidence and arrive at a fixed step; runs are confidence-gated.
    #[default]
    Crepe,
    /// Frequencies only, at a hop-size frame rate; runs are median-smoothed first.
    Melodia,
}

/// Transcription configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub algorithm: Algorithm,

    // Melodia
    /// Median filter length in seconds, 0 disables smoothing (default: 0.25)
    pub smooth_seconds: f64,

    /// Sample rate of the audio the pitch track was computed from (default: 44100)
    pub sample_rate: f64,

    /// Samples between frames (default: 128)
    pub hop_size: usize,

    /// Silent frames prepended to line the first estimate up with its timestamp (default: 8)
    pub leading_silence_frames: usize,

    /// Median filter padding (default: zero)
    pub boundary: BoundaryMode,

    // CREPE
    /// Frames at or below this confidence cannot start or end a note (default: 0.9)
    pub confidence_threshold: f32,

    /// Seconds between frames (default: 0.01)
    pub frame_step_seconds: f64,

    // Segmentation
    /// Notes shorter than this are dropped (default: 0.1)
    pub min_duration_seconds: f64,

    /// Whether the last note also has to meet `min_duration_seconds` (default: unconditional)
    pub final_run: FinalRunPolicy,

    pub midi: MidiExportOptions,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            smooth_seconds: DEFAULT_SMOOTH_SECONDS,
            sample_rate: MELODIA_SAMPLE_RATE,
            hop_size: MELODIA_HOP_SIZE,
            leading_silence_frames: MELODIA_LEADING_SILENCE_FRAMES,
            boundary: BoundaryMode::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            frame_step_seconds: CREPE_FRAME_STEP_SECONDS,
            min_duration_seconds: DEFAULT_MIN_DURATION_SECONDS,
            final_run: FinalRunPolicy::default(),
            midi: MidiExportOptions::default(),
        }
    }
}

impl TranscriptionConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: TranscriptionConfig =
            toml::from_str(source).map_err(|e| TranscriptionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loading configuration from {}", path.as_ref().display());
        Self::from_toml_str(&source)
    }

    /// Check every parameter range.
    pub fn validate(&self) -> Result<()> {
        require_non_negative("min_duration", self.min_duration_seconds)?;
        require_positive("sample_rate", self.sample_rate)?;
        require_positive("frame_step", self.frame_step_seconds)?;
        if self.hop_size == 0 {
            return Err(TranscriptionError::invalid_parameter("hop_size must be greater than zero"));
        }
        if !self.smooth_seconds.is_finite() {
            return Err(TranscriptionError::invalid_parameter(format!(
                "smooth must be a finite number of seconds, got {}",
                self.smooth_seconds
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(TranscriptionError::invalid_parameter(format!(
                "confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_defaults() {
        let config = TranscriptionConfig::default();
        assert_eq!(config.algorithm, Algorithm::Crepe);
        assert_eq!(config.smooth_seconds, 0.25);
        assert_eq!(config.min_duration_seconds, 0.1);
        assert_eq!(config.confidence_threshold, 0.9);
        assert_eq!(config.sample_rate, 44100.0);
        assert_eq!(config.hop_size, 128);
        assert_eq!(config.final_run, FinalRunPolicy::Unconditional);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides() {
        let config = TranscriptionConfig::from_toml_str(
            r#"
            algorithm = "melodia"
            smooth_seconds = 0.0
            boundary = "edge"
            final_run = "enforce-min-duration"

            [midi]
            velocity = 80
            "#,
        )
        .unwrap();

        assert_eq!(config.algorithm, Algorithm::Melodia);
        assert_eq!(config.smooth_seconds, 0.0);
        assert_eq!(config.boundary, BoundaryMode::Edge);
        assert_eq!(config.final_run, FinalRunPolicy::EnforceMinDuration);
        assert_eq!(config.midi.velocity, 80);
        assert_eq!(config.midi.ticks_per_beat, 960);
        assert_eq!(config.hop_size, 128);
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            TranscriptionConfig::from_toml_str("algorithm = \"yin\""),
            Err(TranscriptionError::Config(_))
        ));
    }

    #[test]
    fn test_out_of_range_values() {
        assert!(matches!(
            TranscriptionConfig::from_toml_str("confidence_threshold = 1.5"),
            Err(TranscriptionError::InvalidParameter(_))
        ));
        assert!(matches!(
            TranscriptionConfig::from_toml_str("smooth_seconds = inf"),
            Err(TranscriptionError::InvalidParameter(_))
        ));
        assert!(matches!(
            TranscriptionConfig::from_toml_str("hop_size = 0"),
            Err(TranscriptionError::InvalidParameter(_))
        ));
        assert!(matches!(
            TranscriptionConfig::from_toml_str("sample_rate = -44100.0"),
            Err(TranscriptionError::InvalidParameter(_))
        ));
    }
}
