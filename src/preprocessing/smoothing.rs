use ndarray::{concatenate, Array1, Axis};
use serde::{Deserialize, Serialize};

use crate::constants::SILENCE_PITCH;
use crate::error::{require_positive, Result, TranscriptionError};

use super::pitch::QuantizedPitch;

/// How the median filter fills the half-window that hangs over either end of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryMode {
    /// Pad with silence, like `scipy.signal.medfilt`. Notes touching the edges lose up to
    /// half a window.
    #[default]
    Zero,
    /// Repeat the first and last values, so edge notes keep their full length.
    Edge,
}

/// Number of frames covered by a smoothing window, forced odd.
///
/// Returns 0 when smoothing is disabled (`window_seconds <= 0`).
pub fn window_frames(window_seconds: f64, sample_rate: f64, hop_size: usize) -> Result<usize> {
    require_positive("sample_rate", sample_rate)?;
    if hop_size == 0 {
        return Err(TranscriptionError::invalid_parameter("hop_size must be greater than zero"));
    }
    if !window_seconds.is_finite() {
        return Err(TranscriptionError::invalid_parameter(format!(
            "smoothing window must be a finite number of seconds, got {window_seconds}"
        )));
    }
    if window_seconds <= 0.0 {
        return Ok(0);
    }

    let mut frames = (window_seconds * sample_rate / hop_size as f64).floor() as usize;
    if frames % 2 == 0 {
        frames += 1;
    }
    Ok(frames)
}

/// Centered median filter over an integer pitch sequence.
///
/// # Arguments
///
/// * `pitches` - Quantized pitch per frame.
/// * `window` - Odd window length in frames. Windows longer than `2 * len + 1` are capped there.
/// * `boundary` - Padding used for the frames near either edge.
///
/// # Returns
///
/// * The filtered sequence, same length as the input.
pub fn median_filter(pitches: &[QuantizedPitch], window: usize, boundary: BoundaryMode) -> Result<Vec<QuantizedPitch>> {
    if window % 2 == 0 {
        return Err(TranscriptionError::invalid_parameter(format!("median window must be odd, got {window}")));
    }
    if pitches.is_empty() || window == 1 {
        return Ok(pitches.to_vec());
    }

    // At this length every window covers the whole sequence. Under `Zero` the result is all
    // silence from here on; under `Edge` any longer window filters exactly like this one.
    let window = window.min(2 * pitches.len() + 1);
    let half = window / 2;
    let (left_fill, right_fill) = match boundary {
        BoundaryMode::Zero => (SILENCE_PITCH, SILENCE_PITCH),
        BoundaryMode::Edge => (pitches[0], pitches[pitches.len() - 1]),
    };

    let signal = Array1::from(pitches.to_vec());
    let left = Array1::from_elem(half, left_fill);
    let right = Array1::from_elem(half, right_fill);
    let padded = concatenate(Axis(0), &[left.view(), signal.view(), right.view()])
        .map_err(|e| TranscriptionError::invalid_parameter(format!("cannot pad pitch sequence: {e}")))?;

    let mut scratch = Vec::with_capacity(window);
    let filtered: Vec<QuantizedPitch> = padded
        .windows(window)
        .into_iter()
        .map(|w| {
            scratch.clear();
            scratch.extend(w.iter().copied());
            scratch.sort_unstable();
            scratch[half]
        })
        .collect();

    Ok(filtered)
}

/// Smooth a quantized pitch sequence with a median filter whose length is given in seconds.
///
/// Uses [`BoundaryMode::Zero`]. A non-positive `window_seconds` disables smoothing and the
/// input comes back unchanged.
pub fn smooth(
    pitches: &[QuantizedPitch],
    window_seconds: f64,
    sample_rate: f64,
    hop_size: usize,
) -> Result<Vec<QuantizedPitch>> {
    smooth_with_boundary(pitches, window_seconds, sample_rate, hop_size, BoundaryMode::default())
}

pub fn smooth_with_boundary(
    pitches: &[QuantizedPitch],
    window_seconds: f64,
    sample_rate: f64,
    hop_size: usize,
    boundary: BoundaryMode,
) -> Result<Vec<QuantizedPitch>> {
    let window = window_frames(window_seconds, sample_rate, hop_size)?;
    if window == 0 {
        return Ok(pitches.to_vec());
    }

    log::debug!("Median filtering {} frames with a {}-frame window ({:?} boundary)", pitches.len(), window, boundary);
    median_filter(pitches, window, boundary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_frames_forced_odd() {
        // 0.25 s at 44100 Hz / 128 hop = 86.13 -> 86 -> 87
        assert_eq!(window_frames(0.25, 44100.0, 128).unwrap(), 87);
        assert_eq!(window_frames(3.0, 1.0, 1).unwrap(), 3);
        assert_eq!(window_frames(4.0, 1.0, 1).unwrap(), 5);
        assert_eq!(window_frames(0.0, 44100.0, 128).unwrap(), 0);
    }

    #[test]
    fn test_window_frames_rejects_bad_timing() {
        assert!(matches!(window_frames(0.25, 0.0, 128), Err(TranscriptionError::InvalidParameter(_))));
        assert!(matches!(window_frames(0.25, -44100.0, 128), Err(TranscriptionError::InvalidParameter(_))));
        assert!(matches!(window_frames(0.25, 44100.0, 0), Err(TranscriptionError::InvalidParameter(_))));
    }

    #[test]
    fn test_disabled_smoothing_is_identity() {
        let inputs: Vec<Vec<QuantizedPitch>> = vec![
            vec![],
            vec![60],
            vec![0, 60, 0, 61, 61, 0],
            vec![60, 72, 60, 72, 60],
        ];
        for input in inputs {
            assert_eq!(smooth(&input, 0.0, 44100.0, 128).unwrap(), input);
            assert_eq!(smooth(&input, -1.0, 1.0, 1).unwrap(), input);
        }
    }

    #[test]
    fn test_removes_single_frame_spike() {
        let pitches = vec![60, 60, 60, 67, 60, 60, 60];
        let smoothed = smooth(&pitches, 3.0, 1.0, 1).unwrap();
        assert_eq!(smoothed, vec![60; 7]);
    }

    #[test]
    fn test_zero_boundary_erodes_edges() {
        let pitches = vec![60, 60, 60, 60, 60];
        let smoothed = median_filter(&pitches, 5, BoundaryMode::Zero).unwrap();
        // First window is [0, 0, 60, 60, 60].
        assert_eq!(smoothed, vec![60, 60, 60, 60, 60]);

        let pitches = vec![60, 60, 62, 62, 62];
        let smoothed = median_filter(&pitches, 5, BoundaryMode::Zero).unwrap();
        // Last window is [62, 62, 62, 0, 0] sorted [0, 0, 62, 62, 62].
        assert_eq!(smoothed, vec![60, 60, 62, 62, 62]);

        let pitches = vec![60, 60, 0, 0, 0];
        let smoothed = median_filter(&pitches, 5, BoundaryMode::Zero).unwrap();
        assert_eq!(smoothed, vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_edge_boundary_keeps_edges() {
        let pitches = vec![60, 60, 0, 0, 0];
        let smoothed = median_filter(&pitches, 5, BoundaryMode::Edge).unwrap();
        // First window is [60, 60, 60, 60, 0].
        assert_eq!(smoothed, vec![60, 60, 0, 0, 0]);
    }

    #[test]
    fn test_window_longer_than_sequence() {
        let pitches = vec![60, 61, 60];
        let smoothed = median_filter(&pitches, 9, BoundaryMode::Zero).unwrap();
        assert_eq!(smoothed, vec![0, 0, 0]);
        let smoothed = median_filter(&pitches, 9, BoundaryMode::Edge).unwrap();
        assert_eq!(smoothed, vec![60, 60, 60]);
    }

    #[test]
    fn test_rejects_non_finite_window() {
        assert!(matches!(smooth(&[60, 60, 60], f64::INFINITY, 44100.0, 128), Err(TranscriptionError::InvalidParameter(_))));
        assert!(matches!(window_frames(f64::NAN, 44100.0, 128), Err(TranscriptionError::InvalidParameter(_))));
    }

    #[test]
    fn test_huge_window_is_capped() {
        let pitches = vec![60, 60, 60];
        assert_eq!(smooth(&pitches, 1e20, 44100.0, 128).unwrap(), vec![0, 0, 0]);
        assert_eq!(smooth_with_boundary(&pitches, 1e20, 44100.0, 128, BoundaryMode::Edge).unwrap(), vec![60, 60, 60]);
        assert_eq!(median_filter(&[60, 61, 62], usize::MAX, BoundaryMode::Zero).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn test_even_window_rejected() {
        assert!(median_filter(&[60, 60], 4, BoundaryMode::Zero).is_err());
    }
}
