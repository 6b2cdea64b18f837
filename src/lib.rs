//! Pitch track to MIDI transcription.
//!
//! Takes the frame-rate output of a monophonic pitch tracker (CREPE or Melodia style),
//! quantizes it to MIDI pitches, segments it into notes and writes a single-track MIDI file.
//!
//! ```no_run
//! use pitch_to_midi::{transcribe, read_pitch_track, TranscriptionConfig};
//!
//! let frames = read_pitch_track("song.f0.csv")?;
//! let config = TranscriptionConfig::default();
//! let transcription = transcribe(&frames, 120.0, &config)?;
//! transcription.write_midi("song.mid", &config)?;
//! # Ok::<(), pitch_to_midi::TranscriptionError>(())
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod pipeline;
pub mod io {
    pub mod pitch_track;
}
pub mod preprocessing {
    pub mod pitch;
    pub mod smoothing;
}
pub mod postprocessing {
    pub mod midi;
    pub mod segmentation;
}

pub use config::{Algorithm, TranscriptionConfig};
pub use error::{Result, TranscriptionError};
pub use io::pitch_track::{parse_pitch_track, read_pitch_track};
pub use pipeline::{audio_to_midi, transcribe, PitchTracker, ScoreRenderer, Transcription};
pub use postprocessing::midi::{encode, seconds_to_beats, write_midi_file, MidiExportOptions};
pub use postprocessing::segmentation::{segment, segment_with_confidence, FinalRunPolicy, Note};
pub use preprocessing::pitch::{hz_to_quantized, PitchFrame, QuantizedPitch};
pub use preprocessing::smoothing::{smooth, BoundaryMode};
