use serde::{Deserialize, Serialize};

use crate::constants::CREPE_FRAME_STEP_SECONDS;
use crate::error::{require_non_negative, require_positive, Result, TranscriptionError};
use crate::preprocessing::pitch::QuantizedPitch;

/// A discrete note event, timed in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub onset_seconds: f64,
    pub duration_seconds: f64,
    pub pitch: QuantizedPitch,
}

impl Note {
    pub fn end_seconds(&self) -> f64 {
        self.onset_seconds + self.duration_seconds
    }
}

/// What happens to the run that is still open when the stream ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalRunPolicy {
    /// Emit it whenever it is voiced, however short it is.
    #[default]
    Unconditional,
    /// Hold it to the same rules as every other run.
    EnforceMinDuration,
}

/// Converts frame counts to seconds as `frames * hop / rate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    hop: f64,
    rate: f64,
}

impl FrameClock {
    /// Clock for frames spaced `hop_size` samples apart in audio sampled at `sample_rate`.
    pub fn from_hop(sample_rate: f64, hop_size: usize) -> Result<Self> {
        require_positive("sample_rate", sample_rate)?;
        if hop_size == 0 {
            return Err(TranscriptionError::invalid_parameter("hop_size must be greater than zero"));
        }
        Ok(FrameClock { hop: hop_size as f64, rate: sample_rate })
    }

    /// Clock for frames a fixed number of seconds apart.
    pub fn from_step(step_seconds: f64) -> Result<Self> {
        require_positive("frame step", step_seconds)?;
        Ok(FrameClock { hop: step_seconds, rate: 1.0 })
    }

    pub fn seconds(&self, frames: usize) -> f64 {
        frames as f64 * self.hop / self.rate
    }
}

/// One frame as seen by the run accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunFrame {
    pub time_seconds: f64,
    pub pitch: QuantizedPitch,
    pub confidence: f32,
}

/// The run currently being accumulated. `pitch` and `confidence` are those of the frame
/// that opened it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Run {
    pub onset_seconds: f64,
    pub frames: usize,
    pub pitch: QuantizedPitch,
    pub confidence: f32,
}

impl Run {
    fn silent() -> Self {
        Run { onset_seconds: 0.0, frames: 0, pitch: 0, confidence: 0.0 }
    }

    fn open(frame: &RunFrame) -> Self {
        Run {
            onset_seconds: frame.time_seconds,
            frames: 1,
            pitch: frame.pitch,
            confidence: frame.confidence,
        }
    }

    pub fn is_voiced(&self) -> bool {
        self.pitch > 0
    }
}

/// Decides where runs break and which closed runs become notes.
pub trait RunPolicy {
    /// Whether `frame` extends `run` instead of closing it.
    fn continues(&self, run: &Run, frame: &RunFrame) -> bool;

    /// Whether a closed run becomes a note.
    fn should_emit(&self, run: &Run, duration_seconds: f64) -> bool;
}

/// Runs of identical pitch.
#[derive(Debug, Clone, Copy)]
pub struct PlainRuns {
    pub min_duration_seconds: f64,
}

impl RunPolicy for PlainRuns {
    fn continues(&self, run: &Run, frame: &RunFrame) -> bool {
        frame.pitch == run.pitch
    }

    fn should_emit(&self, run: &Run, duration_seconds: f64) -> bool {
        run.is_voiced() && duration_seconds >= self.min_duration_seconds
    }
}

/// Runs of identical pitch where frames at or below the confidence threshold never break a run.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceGatedRuns {
    pub min_duration_seconds: f64,
    pub threshold: f32,
}

impl RunPolicy for ConfidenceGatedRuns {
    fn continues(&self, run: &Run, frame: &RunFrame) -> bool {
        frame.pitch == run.pitch || frame.confidence <= self.threshold
    }

    fn should_emit(&self, run: &Run, duration_seconds: f64) -> bool {
        run.is_voiced() && run.confidence > self.threshold && duration_seconds >= self.min_duration_seconds
    }
}

/// Single-pass run-length segmenter shared by both segmentation variants.
#[derive(Debug, Clone)]
pub struct RunAccumulator<P> {
    policy: P,
    clock: FrameClock,
    final_run: FinalRunPolicy,
}

impl<P: RunPolicy> RunAccumulator<P> {
    pub fn new(policy: P, clock: FrameClock) -> Self {
        RunAccumulator { policy, clock, final_run: FinalRunPolicy::default() }
    }

    pub fn with_final_run(mut self, final_run: FinalRunPolicy) -> Self {
        self.final_run = final_run;
        self
    }

    /// Scan the frames in order and return the emitted notes.
    pub fn segment<I>(&self, frames: I) -> Vec<Note>
    where
        I: IntoIterator<Item = RunFrame>,
    {
        let mut notes = Vec::new();
        let mut run = Run::silent();

        for frame in frames {
            if self.policy.continues(&run, &frame) {
                run.frames += 1;
                continue;
            }

            let duration_seconds = self.clock.seconds(run.frames);
            if self.policy.should_emit(&run, duration_seconds) {
                notes.push(self.note(&run, duration_seconds));
            }
            run = Run::open(&frame);
        }

        let duration_seconds = self.clock.seconds(run.frames);
        let flush = match self.final_run {
            FinalRunPolicy::Unconditional => run.is_voiced() && run.frames > 0,
            FinalRunPolicy::EnforceMinDuration => run.frames > 0 && self.policy.should_emit(&run, duration_seconds),
        };
        if flush {
            notes.push(self.note(&run, duration_seconds));
        }

        notes
    }

    fn note(&self, run: &Run, duration_seconds: f64) -> Note {
        Note {
            onset_seconds: run.onset_seconds,
            duration_seconds,
            pitch: run.pitch,
        }
    }
}

/// Segment a quantized pitch sequence into notes of identical pitch.
///
/// # Arguments
///
/// * `pitches` - Quantized pitch per frame, 0 for silence.
/// * `sample_rate` - Sample rate of the analysed audio.
/// * `hop_size` - Samples between consecutive frames.
/// * `min_duration_seconds` - Shorter notes are dropped, except the final one.
///
/// # Returns
///
/// * Notes with onsets and durations in seconds.
pub fn segment(
    pitches: &[QuantizedPitch],
    sample_rate: f64,
    hop_size: usize,
    min_duration_seconds: f64,
) -> Result<Vec<Note>> {
    segment_with_final_run(pitches, sample_rate, hop_size, min_duration_seconds, FinalRunPolicy::default())
}

pub fn segment_with_final_run(
    pitches: &[QuantizedPitch],
    sample_rate: f64,
    hop_size: usize,
    min_duration_seconds: f64,
    final_run: FinalRunPolicy,
) -> Result<Vec<Note>> {
    let clock = FrameClock::from_hop(sample_rate, hop_size)?;
    require_non_negative("min_duration", min_duration_seconds)?;

    let frames = pitches.iter().enumerate().map(|(index, &pitch)| RunFrame {
        time_seconds: clock.seconds(index),
        pitch,
        confidence: 1.0,
    });

    let notes = RunAccumulator::new(PlainRuns { min_duration_seconds }, clock)
        .with_final_run(final_run)
        .segment(frames);

    log::debug!("Segmented {} frames into {} notes", pitches.len(), notes.len());
    Ok(notes)
}

/// Segment `(time, pitch, confidence)` frames, letting only confident frames break a run.
///
/// Frames are assumed to be `CREPE_FRAME_STEP_SECONDS` apart.
///
/// # Arguments
///
/// * `frames` - `(time_seconds, quantized_pitch, confidence)` per frame.
/// * `min_duration_seconds` - Shorter notes are dropped, except the final one.
/// * `confidence_threshold` - Frames at or below this confidence never open or close a note.
///
/// # Returns
///
/// * Notes with onsets and durations in seconds.
pub fn segment_with_confidence(
    frames: &[(f64, QuantizedPitch, f32)],
    min_duration_seconds: f64,
    confidence_threshold: f32,
) -> Result<Vec<Note>> {
    segment_with_confidence_step(
        frames,
        min_duration_seconds,
        confidence_threshold,
        CREPE_FRAME_STEP_SECONDS,
        FinalRunPolicy::default(),
    )
}

pub fn segment_with_confidence_step(
    frames: &[(f64, QuantizedPitch, f32)],
    min_duration_seconds: f64,
    confidence_threshold: f32,
    frame_step_seconds: f64,
    final_run: FinalRunPolicy,
) -> Result<Vec<Note>> {
    let clock = FrameClock::from_step(frame_step_seconds)?;
    require_non_negative("min_duration", min_duration_seconds)?;
    if !(0.0..=1.0).contains(&confidence_threshold) {
        return Err(TranscriptionError::invalid_parameter(format!(
            "confidence threshold must be within [0, 1], got {confidence_threshold}"
        )));
    }
    validate_frames(frames)?;

    let policy = ConfidenceGatedRuns { min_duration_seconds, threshold: confidence_threshold };
    let notes = RunAccumulator::new(policy, clock)
        .with_final_run(final_run)
        .segment(frames.iter().map(|&(time_seconds, pitch, confidence)| RunFrame {
            time_seconds,
            pitch,
            confidence,
        }));

    log::debug!(
        "Segmented {} frames into {} notes (confidence threshold {})",
        frames.len(),
        notes.len(),
        confidence_threshold
    );
    Ok(notes)
}

fn validate_frames(frames: &[(f64, QuantizedPitch, f32)]) -> Result<()> {
    let mut previous_time = f64::NEG_INFINITY;
    for (index, &(time, _, confidence)) in frames.iter().enumerate() {
        if !time.is_finite() {
            return Err(TranscriptionError::invalid_frame(index, format!("time {time} is not finite")));
        }
        if time < previous_time {
            return Err(TranscriptionError::invalid_frame(
                index,
                format!("time {time} is earlier than the previous frame at {previous_time}"),
            ));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(TranscriptionError::invalid_frame(
                index,
                format!("confidence {confidence} is outside [0, 1]"),
            ));
        }
        previous_time = time;
    }
    Ok(())
}
