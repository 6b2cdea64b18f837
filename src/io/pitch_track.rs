use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{Result, TranscriptionError};
use crate::preprocessing::pitch::PitchFrame;

/// Read a pitch track file. See [`parse_pitch_track`] for the format.
pub fn read_pitch_track<P: AsRef<Path>>(path: P) -> Result<Vec<PitchFrame>> {
    let file = File::open(path.as_ref())?;
    let frames = parse_pitch_track_from(file)?;
    log::debug!("Read {} frames from {}", frames.len(), path.as_ref().display());
    Ok(frames)
}

/// Parse a comma separated pitch track.
///
/// Each row is `time,frequency` or `time,frequency,confidence`, the layout CREPE writes.
/// A first row with no numeric field is a header and is skipped. Blank lines and `#`
/// comments are skipped too.
pub fn parse_pitch_track(source: &str) -> Result<Vec<PitchFrame>> {
    parse_pitch_track_from(source.as_bytes())
}

pub fn parse_pitch_track_from<R: Read>(source: R) -> Result<Vec<PitchFrame>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source);

    let mut frames = Vec::new();
    let mut first_record = true;

    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        let line = record.position().map_or(0, |p| p.line() as usize);

        if std::mem::take(&mut first_record) && is_header(&record) {
            continue;
        }

        let parse_error = |message: String| TranscriptionError::Parse { line, message };

        if record.len() != 2 && record.len() != 3 {
            return Err(parse_error(format!("expected 2 or 3 columns, found {}", record.len())));
        }

        let time_seconds = record[0]
            .parse::<f64>()
            .map_err(|e| parse_error(format!("bad time {:?}: {e}", &record[0])))?;
        let frequency_hz = record[1]
            .parse::<f32>()
            .map_err(|e| parse_error(format!("bad frequency {:?}: {e}", &record[1])))?;
        let confidence = match record.get(2) {
            Some(field) => Some(
                field
                    .parse::<f32>()
                    .map_err(|e| parse_error(format!("bad confidence {field:?}: {e}")))?,
            ),
            None => None,
        };

        frames.push(PitchFrame { time_seconds, frequency_hz, confidence });
    }

    Ok(frames)
}

/// A header names its columns; no field of it reads as a number.
fn is_header(record: &StringRecord) -> bool {
    record.iter().all(|field| field.parse::<f64>().is_err())
}

fn csv_error(err: csv::Error) -> TranscriptionError {
    let line = err.position().map_or(0, |p| p.line() as usize);
    match err.into_kind() {
        csv::ErrorKind::Io(io) => TranscriptionError::Io(io),
        kind => TranscriptionError::Parse { line, message: format!("{kind:?}") },
    }
}
