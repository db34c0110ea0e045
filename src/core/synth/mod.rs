pub mod oscillator;
pub mod render;
mod stream;

pub use self::oscillator::{BufferPlan, ToneOscillator, ToneState};
pub use self::render::ToneBank;
pub use self::stream::StreamInfo;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use self::stream::AudioThread;
use crate::error::{AudioError, ConfigError};
use crate::messaging::{FrequencyBus, TargetFrequencies, MAX_TONE_CHANNELS};

/// Output stream and mixing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub sample_rate: u32,
    /// Frames per render block
    pub buffer_size: u32,
    /// Number of independent tone channels
    pub channels: usize,
    /// Per-buffer frequency smoothing coefficient
    pub smoothing: f32,
    /// Per-buffer gain smoothing coefficient
    pub amplitude_smoothing: f32,
    /// Device channel count; `None` keeps the device default
    pub output_channels: Option<u16>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            buffer_size: 4096,
            channels: 4,
            smoothing: 0.05,
            amplitude_smoothing: 0.3,
            output_channels: None,
        }
    }
}

impl SynthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSynth("sample rate must be positive".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::InvalidSynth("buffer size must be positive".to_string()));
        }
        if self.channels == 0 || self.channels > MAX_TONE_CHANNELS {
            return Err(ConfigError::InvalidSynth(format!(
                "channels must be between 1 and {}, got {}",
                MAX_TONE_CHANNELS, self.channels
            )));
        }
        for (name, value) in [
            ("smoothing", self.smoothing),
            ("amplitude_smoothing", self.amplitude_smoothing),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::InvalidSynth(format!(
                    "{} must be in [0, 1), got {}",
                    name, value
                )));
            }
        }
        if self.output_channels == Some(0) {
            return Err(ConfigError::InvalidSynth("output channels must be positive".to_string()));
        }
        Ok(())
    }

    /// Seconds of audio per render block
    pub fn buffer_duration(&self) -> f32 {
        self.buffer_size as f32 / self.sample_rate as f32
    }
}

/// Live tone synthesizer driving the default output device.
///
/// `Stopped -> Running -> Stopped`. Target frequencies may be set from any
/// thread at any time; while stopped they are kept and take effect on the
/// next `start`.
pub struct ToneGenerator {
    config: SynthConfig,
    bus: FrequencyBus,
    last_targets: Mutex<TargetFrequencies>,
    faults: Arc<AtomicU64>,
    audio: Option<AudioThread>,
}

impl ToneGenerator {
    pub fn new(config: SynthConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let silent = TargetFrequencies::silent(config.channels);
        Ok(ToneGenerator {
            config,
            bus: FrequencyBus::new(),
            last_targets: Mutex::new(silent),
            faults: Arc::new(AtomicU64::new(0)),
            audio: None,
        })
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Open the output device and begin rendering. No-op when already running.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.audio.is_some() {
            debug!("Tone generator already running");
            return Ok(());
        }

        // Replay the most recent targets so a restart resumes where it left off
        if let Ok(last) = self.last_targets.lock() {
            self.bus.publish(*last);
        }

        let audio = AudioThread::spawn(self.config.clone(), self.bus.receiver(), Arc::clone(&self.faults))?;
        info!(
            "Tone generator running on '{}' ({} channels of tone)",
            audio.info().device_name,
            self.config.channels
        );
        self.audio = Some(audio);
        Ok(())
    }

    /// Halt rendering and wait until the device has been released
    pub fn stop(&mut self) {
        if let Some(audio) = self.audio.take() {
            audio.shutdown();
            info!("Tone generator stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.audio.is_some()
    }

    /// Replace the whole target set; 0 Hz entries are silent channels
    pub fn set_target_frequencies(&self, frequencies: &[f32]) {
        let targets = TargetFrequencies::from_slice(frequencies);
        if let Ok(mut last) = self.last_targets.lock() {
            *last = targets;
        }
        self.bus.publish(targets);
    }

    pub fn last_targets(&self) -> TargetFrequencies {
        self.last_targets
            .lock()
            .map(|last| *last)
            .unwrap_or_default()
    }

    /// Buffers replaced by silence after a render failure
    pub fn render_faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.audio.as_ref().map(|audio| audio.info())
    }
}

impl Drop for ToneGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}
