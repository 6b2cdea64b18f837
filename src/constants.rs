// Pitch quantization
pub const REFERENCE_FREQUENCY_HZ: f32 = 440.0;
pub const REFERENCE_MIDI_PITCH: f32 = 69.0;
pub const SILENCE_PITCH: i32 = 0;

// Melodia analysis
pub const MELODIA_SAMPLE_RATE: f64 = 44100.0;
pub const MELODIA_HOP_SIZE: usize = 128;
/// Melodia's first estimate lands 8 hops into the signal.
pub const MELODIA_LEADING_SILENCE_FRAMES: usize = 8;

// CREPE analysis
pub const CREPE_FRAME_STEP_SECONDS: f64 = 0.01;

// Service defaults
pub const DEFAULT_SMOOTH_SECONDS: f64 = 0.25;
pub const DEFAULT_MIN_DURATION_SECONDS: f64 = 0.1;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.9;

// MIDI Conversion
pub const TICKS_PER_BEAT: u16 = 960;
pub const NOTE_VELOCITY: u8 = 100;
pub const TRACK_NAME: &str = "MIDI TRACK";
pub const MAX_MIDI_PITCH: i32 = 127;
pub const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;
