//! Lock-free handoff between the frame pipeline and the audio callback

mod bus;
mod types;

pub use self::bus::{FrequencyBus, FrequencyReceiver};
pub use self::types::{TargetFrequencies, MAX_TONE_CHANNELS};
