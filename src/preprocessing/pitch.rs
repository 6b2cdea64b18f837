use crate::constants::{REFERENCE_FREQUENCY_HZ, REFERENCE_MIDI_PITCH, SILENCE_PITCH};

/// Integer MIDI pitch. 0 (and anything below) means silence.
pub type QuantizedPitch = i32;

/// One analysis frame from an upstream pitch tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    pub time_seconds: f64,
    /// Estimated fundamental, `<= 0` when unvoiced.
    pub frequency_hz: f32,
    /// Voicing confidence in [0, 1], when the tracker reports one.
    pub confidence: Option<f32>,
}

/// Converts a frequency in Hz to the corresponding (unrounded) MIDI pitch.
///
/// # Arguments
///
/// * `hz` - A frequency in Hz.
///
/// # Returns
///
/// * The corresponding MIDI pitch.
pub fn hz_to_midi(hz: f32) -> f32 {
    REFERENCE_MIDI_PITCH + 12.0 * (hz / REFERENCE_FREQUENCY_HZ).log2()
}

/// Converts a MIDI pitch to the corresponding frequency in Hz.
///
/// # Arguments
///
/// * `midi` - A MIDI pitch.
///
/// # Returns
///
/// * The corresponding frequency in Hz.
pub fn midi_to_hz(midi: f32) -> f32 {
    REFERENCE_FREQUENCY_HZ * 2.0f32.powf((midi - REFERENCE_MIDI_PITCH) / 12.0)
}

/// Rounds a continuous MIDI pitch to the nearest semitone.
///
/// Exact halves round to the even neighbour, so 60.5 becomes 60 and 61.5 becomes 62.
pub fn quantize_midi(midi: f32) -> QuantizedPitch {
    midi.round_ties_even() as QuantizedPitch
}

/// Quantizes a single frequency. Unvoiced (non-positive) and non-finite values are silence.
pub fn hz_to_quantized_pitch(hz: f32) -> QuantizedPitch {
    if !hz.is_finite() || hz <= 0.0 {
        return SILENCE_PITCH;
    }
    quantize_midi(hz_to_midi(hz))
}

/// Quantizes a frame-rate sequence of frequencies to MIDI pitches.
///
/// # Arguments
///
/// * `frequencies` - One frequency in Hz per analysis frame. Values `<= 0` mark unvoiced frames.
///
/// # Returns
///
/// * A sequence of the same length, with 0 for every unvoiced frame.
pub fn hz_to_quantized(frequencies: &[f32]) -> Vec<QuantizedPitch> {
    frequencies.iter().map(|&hz| hz_to_quantized_pitch(hz)).collect()
}
