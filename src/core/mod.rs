pub mod geometry;
pub mod instrument;
pub mod notes;
pub mod scene;
pub mod synth;

pub use instrument::Instrument;
pub use synth::ToneGenerator;
