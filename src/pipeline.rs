//! End-to-end transcription: pitch track in, notes and MIDI out.

use std::path::Path;

use crate::config::{Algorithm, TranscriptionConfig};
use crate::error::{require_positive, Result, TranscriptionError};
use crate::postprocessing::midi::{encode_with_options, write_midi_file_with_options};
use crate::postprocessing::segmentation::{segment_with_confidence_step, segment_with_final_run, Note};
use crate::preprocessing::pitch::{hz_to_quantized, hz_to_quantized_pitch, PitchFrame, QuantizedPitch};
use crate::preprocessing::smoothing::smooth_with_boundary;

/// Produces a pitch track from mono audio.
pub trait PitchTracker {
    fn predict_pitch(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<PitchFrame>>;
}

/// Renders MIDI data to a printable score.
pub trait ScoreRenderer {
    fn render_score(&self, midi: &[u8]) -> Result<Vec<u8>>;
}

/// Notes segmented from a pitch track, together with the tempo they will be written at.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub notes: Vec<Note>,
    pub tempo_bpm: f64,
}

impl Transcription {
    pub fn to_midi_bytes(&self, config: &TranscriptionConfig) -> Result<Vec<u8>> {
        encode_with_options(&self.notes, self.tempo_bpm, &config.midi)
    }

    pub fn write_midi<P: AsRef<Path>>(&self, path: P, config: &TranscriptionConfig) -> Result<()> {
        write_midi_file_with_options(path, &self.notes, self.tempo_bpm, &config.midi)
    }

    pub fn render<R: ScoreRenderer>(&self, renderer: &R, config: &TranscriptionConfig) -> Result<Vec<u8>> {
        let midi = self.to_midi_bytes(config)?;
        renderer.render_score(&midi)
    }
}

/// Segment a Melodia-style frequency sequence: quantize, median-smooth, then split into runs.
pub fn notes_from_frequencies(frequencies: &[f32], config: &TranscriptionConfig) -> Result<Vec<Note>> {
    let mut padded = vec![0.0; config.leading_silence_frames];
    padded.extend_from_slice(frequencies);

    let pitches = hz_to_quantized(&padded);
    let smoothed = smooth_with_boundary(
        &pitches,
        config.smooth_seconds,
        config.sample_rate,
        config.hop_size,
        config.boundary,
    )?;

    segment_with_final_run(
        &smoothed,
        config.sample_rate,
        config.hop_size,
        config.min_duration_seconds,
        config.final_run,
    )
}

/// Segment CREPE-style frames with the confidence gate.
pub fn notes_from_confident_frames(frames: &[PitchFrame], config: &TranscriptionConfig) -> Result<Vec<Note>> {
    let quantized = frames
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            let confidence = frame
                .confidence
                .ok_or_else(|| TranscriptionError::invalid_frame(index, "confidence is missing"))?;
            Ok((frame.time_seconds, hz_to_quantized_pitch(frame.frequency_hz), confidence))
        })
        .collect::<Result<Vec<(f64, QuantizedPitch, f32)>>>()?;

    segment_with_confidence_step(
        &quantized,
        config.min_duration_seconds,
        config.confidence_threshold,
        config.frame_step_seconds,
        config.final_run,
    )
}

/// Turn a pitch track into notes using the algorithm selected in `config`.
///
/// # Arguments
///
/// * `frames` - Pitch track from an upstream tracker.
/// * `tempo_bpm` - Tempo the notes will be written at.
/// * `config` - Transcription parameters.
///
/// # Returns
///
/// * The segmented notes and their tempo.
pub fn transcribe(frames: &[PitchFrame], tempo_bpm: f64, config: &TranscriptionConfig) -> Result<Transcription> {
    config.validate()?;
    require_positive("tempo", tempo_bpm)?;
    if let Some(index) = frames.iter().position(|frame| frame.frequency_hz.is_nan()) {
        return Err(TranscriptionError::invalid_frame(index, "frequency is NaN"));
    }

    log::info!("Transcribing {} frames with {:?}", frames.len(), config.algorithm);

    let notes = match config.algorithm {
        Algorithm::Melodia => {
            let frequencies: Vec<f32> = frames.iter().map(|frame| frame.frequency_hz).collect();
            notes_from_frequencies(&frequencies, config)?
        }
        Algorithm::Crepe => notes_from_confident_frames(frames, config)?,
    };

    log::info!("Transcribed {} notes", notes.len());
    Ok(Transcription { notes, tempo_bpm })
}

/// Track pitch in `samples`, transcribe it and write the MIDI file to `output`.
pub fn audio_to_midi<T: PitchTracker, P: AsRef<Path>>(
    tracker: &T,
    samples: &[f32],
    sample_rate: u32,
    tempo_bpm: f64,
    config: &TranscriptionConfig,
    output: P,
) -> Result<Transcription> {
    let frames = tracker.predict_pitch(samples, sample_rate)?;
    let transcription = transcribe(&frames, tempo_bpm, config)?;
    transcription.write_midi(output, config)?;
    Ok(transcription)
}
