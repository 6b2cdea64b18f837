use std::{error::Error, path::PathBuf};

use clap::Parser;

use pitch_to_midi::{read_pitch_track, transcribe, Algorithm, TranscriptionConfig};

/// Convert a pitch track (time,frequency[,confidence] CSV) to a MIDI file
#[derive(Parser)]
#[command(name = "pitch-to-midi")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Pitch track CSV written by the pitch tracker
    input: PathBuf,

    /// Output MIDI file (default: input path with a .mid extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Tempo of the song in BPM
    #[arg(short, long)]
    tempo: f64,

    /// TOML file with transcription parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How the pitch track was produced
    #[arg(short, long, value_enum)]
    algorithm: Option<Algorithm>,

    /// Median filter length in seconds, 0 disables smoothing (melodia)
    #[arg(long)]
    smooth: Option<f64>,

    /// Minimum note duration in seconds
    #[arg(long)]
    min_duration: Option<f64>,

    /// Confidence a frame needs to start or end a note (crepe)
    #[arg(long)]
    confidence: Option<f32>,

    /// Sample rate of the analysed audio (melodia)
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Samples between frames (melodia)
    #[arg(long)]
    hop_size: Option<usize>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TranscriptionConfig::load(path)?,
        None => TranscriptionConfig::default(),
    };
    if let Some(algorithm) = cli.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(smooth) = cli.smooth {
        config.smooth_seconds = smooth;
    }
    if let Some(min_duration) = cli.min_duration {
        config.min_duration_seconds = min_duration;
    }
    if let Some(confidence) = cli.confidence {
        config.confidence_threshold = confidence;
    }
    if let Some(sample_rate) = cli.sample_rate {
        config.sample_rate = sample_rate;
    }
    if let Some(hop_size) = cli.hop_size {
        config.hop_size = hop_size;
    }

    let frames = read_pitch_track(&cli.input)?;
    let transcription = transcribe(&frames, cli.tempo, &config)?;

    let output_file_path = cli.output.unwrap_or_else(|| cli.input.with_extension("mid"));
    transcription.write_midi(&output_file_path, &config)?;

    println!("{} notes written to {}", transcription.notes.len(), output_file_path.display());

    Ok(())
}
