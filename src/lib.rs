//! Depth-camera sectors played as a piano.
//!
//! Each configured sector watches an angular window of the depth stream; the
//! closest point inside it picks a note (closer is higher) and a bank of sine
//! oscillators glides between the resulting frequencies.

pub mod config;
pub mod core;
pub mod error;
pub mod messaging;
pub mod utils;

pub use crate::config::PianoConfig;
pub use crate::core::geometry::{CameraIntrinsics, DepthFrame};
pub use crate::core::{Instrument, ToneGenerator};
pub use crate::error::{AudioError, ConfigError};
