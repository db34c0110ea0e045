use thiserror::Error;

/// Misconfiguration detected while building sectors, mappers or the synth.
///
/// These are fatal at construction time: nothing is substituted with a default.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown note '{0}' (not in the diatonic note table)")]
    UnknownNote(String),

    #[error("malformed note name '{0}' (expected a letter A-G followed by an octave, e.g. C4)")]
    InvalidNoteName(String),

    #[error("lowest note {lowest} is above highest note {highest}")]
    InvertedNoteOrder { lowest: String, highest: String },

    #[error("invalid distance range [{min}, {max}] (need 0 <= min < max)")]
    InvalidRange { min: f32, max: f32 },

    #[error("invalid camera intrinsics: fx={fx}, fy={fy} (focal lengths must be non-zero)")]
    InvalidIntrinsics { fx: f32, fy: f32 },

    #[error("invalid sector bounds: {0}")]
    InvalidBounds(String),

    #[error("configuration contains no sectors")]
    NoSectors,

    #[error("duplicate sector name '{0}'")]
    DuplicateSector(String),

    #[error("depth frame is {actual_width}x{actual_height} ({samples} samples), expected {width}x{height}")]
    FrameSizeMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
        samples: usize,
    },

    #[error("invalid synth setting: {0}")]
    InvalidSynth(String),
}

/// Failure to acquire or drive the audio output device.
///
/// Reported once from `ToneGenerator::start`; the running callback never returns errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("failed to query device configuration: {0}")]
    DeviceConfig(String),

    #[error("failed to build output stream: {0}")]
    BuildStream(String),

    #[error("failed to start output stream: {0}")]
    PlayStream(String),

    #[error("audio thread failed: {0}")]
    ThreadSpawn(String),
}
