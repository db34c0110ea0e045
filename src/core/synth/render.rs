use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use cpal::{FromSample, Sample};

use super::oscillator::ToneOscillator;
use super::SynthConfig;
use crate::messaging::{FrequencyReceiver, TargetFrequencies};

/// Fixed set of tone channels mixed into one mono signal.
///
/// Shared by the live output stream and offline rendering. Rendering never
/// allocates once constructed.
#[derive(Debug, Clone)]
pub struct ToneBank {
    oscillators: Vec<ToneOscillator>,
    sample_rate: f32,
    // Per-channel amplitude, 1/N so a full chord cannot clip
    amplitude: f32,
    mix: Vec<f32>,
}

impl ToneBank {
    pub fn new(config: &SynthConfig) -> Self {
        let channels = config.channels.max(1);
        let oscillators = (0..channels)
            .map(|_| ToneOscillator::new(config.smoothing, config.amplitude_smoothing))
            .collect();

        ToneBank {
            oscillators,
            sample_rate: config.sample_rate as f32,
            amplitude: 1.0 / channels as f32,
            mix: vec![0.0; config.buffer_size.max(1) as usize],
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.oscillators.len()
    }

    pub fn oscillators(&self) -> &[ToneOscillator] {
        &self.oscillators
    }

    /// Apply a complete target set; missing channels go silent and extras are ignored
    pub fn set_targets(&mut self, targets: &TargetFrequencies) {
        for (channel, osc) in self.oscillators.iter_mut().enumerate() {
            osc.set_target(targets.get(channel));
        }
    }

    pub fn set_target_frequencies(&mut self, frequencies: &[f32]) {
        self.set_targets(&TargetFrequencies::from_slice(frequencies));
    }

    /// Render one buffer of mono samples into `out`
    pub fn render(&mut self, out: &mut [f32]) {
        mix_into(&mut self.oscillators, out, self.sample_rate, self.amplitude);
    }

    /// Fill an interleaved device buffer, duplicating the mono mix onto every
    /// output channel. Long buffers are rendered in blocks of the configured
    /// buffer size.
    pub fn render_interleaved<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: Sample + FromSample<f32>,
    {
        let channels = channels.max(1);
        data.fill(T::EQUILIBRIUM);

        let block_frames = self.mix.len();
        for block in data.chunks_mut(block_frames * channels) {
            let frames = block.len() / channels;
            let mono = &mut self.mix[..frames];
            mix_into(&mut self.oscillators, mono, self.sample_rate, self.amplitude);
            for (frame, &value) in block.chunks_mut(channels).zip(mono.iter()) {
                let value = T::from_sample(value);
                for sample in frame.iter_mut() {
                    *sample = value;
                }
            }
        }
    }

    /// Silence every channel immediately
    pub fn reset(&mut self) {
        for osc in &mut self.oscillators {
            osc.reset();
        }
    }
}

/// Body of the device callback: pick up the newest targets, then fill `data`
/// with `render`. A panic in `render` leaves a silent buffer, resets the bank
/// and bumps `faults`; the next call renders normally.
pub fn fill_output<T, F>(
    bank: &mut ToneBank,
    receiver: &FrequencyReceiver,
    data: &mut [T],
    faults: &AtomicU64,
    render: F,
) where
    T: Sample,
    F: FnOnce(&mut ToneBank, &mut [T]),
{
    if let Some(targets) = receiver.latest() {
        bank.set_targets(&targets);
    }
    let rendered = panic::catch_unwind(AssertUnwindSafe(|| render(&mut *bank, &mut *data)));
    if rendered.is_err() {
        data.fill(T::EQUILIBRIUM);
        bank.reset();
        faults.fetch_add(1, Ordering::Relaxed);
    }
}

fn mix_into(oscillators: &mut [ToneOscillator], out: &mut [f32], sample_rate: f32, amplitude: f32) {
    out.fill(0.0);
    for osc in oscillators.iter_mut() {
        osc.render_into(out, sample_rate, amplitude);
    }
}
