use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use midly::num::{u24, u28, u7};
use midly::Format;
use midly::Header;
use midly::MetaMessage;
use midly::MidiMessage;
use midly::Smf;
use midly::Timing;
use midly::Track;
use midly::TrackEvent;
use midly::TrackEventKind;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_MIDI_PITCH, MICROSECONDS_PER_MINUTE, NOTE_VELOCITY, TICKS_PER_BEAT, TRACK_NAME};
use crate::error::{require_positive, Result, TranscriptionError};
use crate::preprocessing::pitch::QuantizedPitch;

use super::segmentation::Note;

/// MIDI export options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note
    pub ticks_per_beat: u16,

    /// Velocity shared by every note
    pub velocity: u8,

    /// Name written to the track's TrackName meta event
    pub track_name: String,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ticks_per_beat: TICKS_PER_BEAT,
            velocity: NOTE_VELOCITY,
            track_name: TRACK_NAME.to_string(),
        }
    }
}

/// A note timed in beats of the output tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatNote {
    pub onset_beats: f64,
    pub duration_beats: f64,
    pub pitch: QuantizedPitch,
}

/// Convert wall-clock seconds to beats at `tempo_bpm`.
pub fn seconds_to_beats(seconds: f64, tempo_bpm: f64) -> f64 {
    seconds * tempo_bpm / 60.0
}

/// Rescale note timings from seconds to beats.
pub fn notes_to_beats(notes: &[Note], tempo_bpm: f64) -> Vec<BeatNote> {
    notes
        .iter()
        .map(|note| BeatNote {
            onset_beats: seconds_to_beats(note.onset_seconds, tempo_bpm),
            duration_beats: seconds_to_beats(note.duration_seconds, tempo_bpm),
            pitch: note.pitch,
        })
        .collect()
}

fn tempo_meta(tempo_bpm: f64) -> Result<u24> {
    require_positive("tempo", tempo_bpm)?;
    let micros_per_beat = (MICROSECONDS_PER_MINUTE / tempo_bpm).round();
    if micros_per_beat < 1.0 || micros_per_beat > 0xFF_FFFF as f64 {
        return Err(TranscriptionError::invalid_parameter(format!(
            "tempo {tempo_bpm} BPM cannot be stored in a MIDI tempo event"
        )));
    }
    Ok(u24::new(micros_per_beat as u32))
}

fn note_key(pitch: QuantizedPitch) -> Result<u7> {
    if !(1..=MAX_MIDI_PITCH).contains(&pitch) {
        return Err(TranscriptionError::invalid_parameter(format!(
            "pitch {pitch} is outside the MIDI note range 1..={MAX_MIDI_PITCH}"
        )));
    }
    Ok(u7::new(pitch as u8))
}

/// Absolute tick of a beat position. Fails past the 28-bit range a delta time can carry.
fn beats_to_tick(beats: f64, ticks_per_beat: u16) -> Result<u32> {
    let tick = (beats * ticks_per_beat as f64).round().max(0.0);
    let max_tick = u28::max_value().as_int();
    if !tick.is_finite() || tick > max_tick as f64 {
        return Err(TranscriptionError::invalid_parameter(format!(
            "beat position {beats} is past the last representable tick {max_tick}"
        )));
    }
    Ok(tick as u32)
}

/// Build note on/off pairs with delta times, in the order the notes are given.
pub fn generate_ordered_midi_events(
    notes: &[BeatNote],
    options: &MidiExportOptions,
) -> Result<Vec<TrackEvent<'static>>> {
    if options.velocity > 127 {
        return Err(TranscriptionError::invalid_parameter(format!("velocity {} exceeds 127", options.velocity)));
    }
    let velocity = u7::new(options.velocity);

    let mut events_absolute: Vec<(u32, TrackEventKind<'static>)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let key = note_key(note.pitch)?;
        let start_tick = beats_to_tick(note.onset_beats, options.ticks_per_beat)?;
        // The end tick comes from the absolute end time so back-to-back notes never overlap after rounding.
        let end_tick = beats_to_tick(note.onset_beats + note.duration_beats, options.ticks_per_beat)?.max(start_tick);

        events_absolute.push((
            start_tick,
            TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn { key, vel: velocity },
            },
        ));
        events_absolute.push((
            end_tick,
            TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOff { key, vel: 0.into() },
            },
        ));
    }

    // Stable, so events sharing a tick keep note order.
    events_absolute.sort_by_key(|(tick, _)| *tick);

    let mut last_tick = 0;
    let track_events = events_absolute
        .into_iter()
        .map(|(tick, kind)| {
            let delta = tick.saturating_sub(last_tick);
            last_tick = tick;
            TrackEvent { delta: u28::new(delta), kind }
        })
        .collect();

    Ok(track_events)
}

/// Generate MIDI file data from notes.
///
/// # Arguments
///
/// * `notes` - Notes timed in seconds.
/// * `tempo_bpm` - Tempo used to rescale seconds to beats and written as the track tempo.
///
/// # Returns
///
/// * A vector of bytes representing the MIDI file.
pub fn encode(notes: &[Note], tempo_bpm: f64) -> Result<Vec<u8>> {
    encode_with_options(notes, tempo_bpm, &MidiExportOptions::default())
}

pub fn encode_with_options(notes: &[Note], tempo_bpm: f64, options: &MidiExportOptions) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_smf(&mut buffer, notes, tempo_bpm, options)?;
    Ok(buffer)
}

/// Write notes as a MIDI file at `path`.
///
/// The file is closed when this returns, whether or not writing succeeded.
pub fn write_midi_file<P: AsRef<Path>>(path: P, notes: &[Note], tempo_bpm: f64) -> Result<()> {
    write_midi_file_with_options(path, notes, tempo_bpm, &MidiExportOptions::default())
}

pub fn write_midi_file_with_options<P: AsRef<Path>>(
    path: P,
    notes: &[Note],
    tempo_bpm: f64,
    options: &MidiExportOptions,
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_smf(&mut writer, notes, tempo_bpm, options)?;
    writer.flush()?;

    log::info!("Wrote {} notes at {:.2} BPM to {}", notes.len(), tempo_bpm, path.display());
    Ok(())
}

fn write_smf<W: Write>(writer: &mut W, notes: &[Note], tempo_bpm: f64, options: &MidiExportOptions) -> Result<()> {
    let tempo = tempo_meta(tempo_bpm)?;
    if options.ticks_per_beat == 0 || options.ticks_per_beat > 0x7FFF {
        return Err(TranscriptionError::invalid_parameter(format!(
            "ticks per beat must be within 1..=32767, got {}",
            options.ticks_per_beat
        )));
    }

    let beat_notes = notes_to_beats(notes, tempo_bpm);
    let note_events = generate_ordered_midi_events(&beat_notes, options)?;

    let mut smf = Smf::new(Header {
        format: Format::SingleTrack,
        timing: Timing::Metrical(options.ticks_per_beat.into()),
    });
    let mut track = Track::new();

    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(options.track_name.as_bytes())),
    });
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(tempo)),
    });
    track.extend(note_events);
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);
    smf.write_std(writer)?;

    log::debug!("Encoded {} notes into a single-track MIDI file", notes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::u15;

    fn note(onset_seconds: f64, duration_seconds: f64, pitch: QuantizedPitch) -> Note {
        Note { onset_seconds, duration_seconds, pitch }
    }

    /// (absolute tick, kind) for every event of the only track.
    fn absolute_events(bytes: &[u8]) -> Vec<(u32, TrackEventKind<'_>)> {
        let smf = Smf::parse(bytes).unwrap();
        assert_eq!(smf.tracks.len(), 1);
        let mut tick = 0;
        smf.tracks[0]
            .iter()
            .map(|event| {
                tick += event.delta.as_int();
                (tick, event.kind)
            })
            .collect()
    }

    #[test]
    fn test_tempo_scaling() {
        assert_eq!(seconds_to_beats(2.0, 120.0), 4.0);
        assert_eq!(seconds_to_beats(1.0, 120.0), 2.0);

        let beats = notes_to_beats(&[note(2.0, 1.0, 60)], 120.0);
        assert_eq!(beats, vec![BeatNote { onset_beats: 4.0, duration_beats: 2.0, pitch: 60 }]);
    }

    #[test]
    fn test_header_and_meta_events() {
        let bytes = encode(&[note(0.5, 0.5, 69)], 120.0).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(smf.header.timing, Timing::Metrical(TICKS_PER_BEAT.into()));

        let events = absolute_events(&bytes);
        assert_eq!(events[0], (0, TrackEventKind::Meta(MetaMessage::TrackName(TRACK_NAME.as_bytes()))));
        assert_eq!(events[1], (0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000)))));
        assert_eq!(events.last().unwrap().1, TrackEventKind::Meta(MetaMessage::EndOfTrack));
    }

    #[test]
    fn test_note_ticks() {
        // 2 s at 120 BPM is beat 4, 1 s is 2 beats.
        let bytes = encode(&[note(2.0, 1.0, 60)], 120.0).unwrap();
        let events = absolute_events(&bytes);

        assert_eq!(
            events[2],
            (
                4 * TICKS_PER_BEAT as u32,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: MidiMessage::NoteOn { key: u7::new(60), vel: u7::new(NOTE_VELOCITY) },
                }
            )
        );
        assert_eq!(
            events[3],
            (
                6 * TICKS_PER_BEAT as u32,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: MidiMessage::NoteOff { key: u7::new(60), vel: u7::new(0) },
                }
            )
        );
    }

    #[test]
    fn test_back_to_back_notes_keep_order() {
        let notes = vec![note(0.0, 0.5, 60), note(0.5, 0.5, 60), note(1.0, 0.25, 62)];
        let bytes = encode(&notes, 60.0).unwrap();
        let events = absolute_events(&bytes);

        let messages: Vec<_> = events
            .iter()
            .filter_map(|(tick, kind)| match kind {
                TrackEventKind::Midi { message: MidiMessage::NoteOn { key, .. }, .. } => Some((*tick, "on", key.as_int())),
                TrackEventKind::Midi { message: MidiMessage::NoteOff { key, .. }, .. } => Some((*tick, "off", key.as_int())),
                _ => None,
            })
            .collect();

        assert_eq!(
            messages,
            vec![
                (0, "on", 60),
                (480, "off", 60),
                (480, "on", 60),
                (960, "off", 60),
                (960, "on", 62),
                (1200, "off", 62),
            ]
        );
    }

    #[test]
    fn test_empty_note_list_still_writes_a_track() {
        let bytes = encode(&[], 100.0).unwrap();
        let events = absolute_events(&bytes);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_rejects_bad_tempo() {
        for tempo in [0.0, -120.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(encode(&[note(0.0, 1.0, 60)], tempo), Err(TranscriptionError::InvalidParameter(_))));
        }
        // Too slow to fit 24 bits of microseconds per beat.
        assert!(matches!(encode(&[], 1.0), Err(TranscriptionError::InvalidParameter(_))));
    }

    #[test]
    fn test_rejects_out_of_range_pitch() {
        assert!(matches!(encode(&[note(0.0, 1.0, 128)], 120.0), Err(TranscriptionError::InvalidParameter(_))));
        assert!(matches!(encode(&[note(0.0, 1.0, 0)], 120.0), Err(TranscriptionError::InvalidParameter(_))));
    }

    #[test]
    fn test_rejects_notes_past_last_tick() {
        // 1e9 s at 120 BPM is 2e9 beats, far beyond 28 bits of ticks.
        assert!(matches!(encode(&[note(1e9, 1.0, 60)], 120.0), Err(TranscriptionError::InvalidParameter(_))));
        // A note that starts in range but ends past it.
        assert!(matches!(encode(&[note(0.0, 1e9, 60)], 120.0), Err(TranscriptionError::InvalidParameter(_))));
        assert!(matches!(encode(&[note(f64::INFINITY, 1.0, 60)], 120.0), Err(TranscriptionError::InvalidParameter(_))));
    }

    #[test]
    fn test_custom_options() {
        let options = MidiExportOptions { ticks_per_beat: 480, velocity: 64, track_name: "Melody".to_string() };
        let bytes = encode_with_options(&[note(1.0, 1.0, 72)], 60.0, &options).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(480)));

        let events = absolute_events(&bytes);
        assert_eq!(events[0].1, TrackEventKind::Meta(MetaMessage::TrackName(&b"Melody"[..])));
        assert_eq!(
            events[2],
            (
                480,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: MidiMessage::NoteOn { key: u7::new(72), vel: u7::new(64) },
                }
            )
        );
    }
}
