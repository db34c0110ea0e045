use std::f64::consts::TAU;

// Gain below this after a fade counts as silent
const SILENT_GAIN: f32 = 1e-4;
// Frequencies this close (Hz) to the target snap onto it
const FREQ_EPSILON: f32 = 0.01;

/// Lifecycle of one tone channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneState {
    /// Silent, phase frozen
    Idle,
    /// Gliding toward a new frequency and/or fading in or out
    Ramping,
    /// At target frequency and full gain
    Steady,
}

/// Gain and frequency to render for one buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferPlan {
    pub frequency: f32,
    pub gain_start: f32,
    pub gain_end: f32,
}

/// One sine channel with click-free frequency and gain transitions.
///
/// Frequency follows `current = s * current + (1 - s) * target` once per
/// buffer. Gain follows the same rule with `gain_smoothing` toward 1 (sounding)
/// or 0 (silent) and is interpolated linearly sample by sample inside each
/// buffer. A release keeps the last frequency so the waveform fades instead of
/// sweeping down to 0 Hz.
#[derive(Debug, Clone)]
pub struct ToneOscillator {
    state: ToneState,
    target_frequency: f32,
    current_frequency: f32,
    // Phase of the next sample, in [0, 2π)
    phase: f64,
    gain: f32,
    smoothing: f32,
    gain_smoothing: f32,
}

impl ToneOscillator {
    pub fn new(smoothing: f32, gain_smoothing: f32) -> Self {
        Self {
            state: ToneState::Idle,
            target_frequency: 0.0,
            current_frequency: 0.0,
            phase: 0.0,
            gain: 0.0,
            smoothing: smoothing.clamp(0.0, 0.999),
            gain_smoothing: gain_smoothing.clamp(0.0, 0.999),
        }
    }

    pub fn state(&self) -> ToneState {
        self.state
    }

    pub fn target_frequency(&self) -> f32 {
        self.target_frequency
    }

    pub fn current_frequency(&self) -> f32 {
        self.current_frequency
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Command a new goal; 0 (or anything non-positive) releases the channel
    pub fn set_target(&mut self, frequency: f32) {
        let frequency = if frequency.is_finite() && frequency > 0.0 {
            frequency
        } else {
            0.0
        };
        if frequency == self.target_frequency {
            return;
        }
        self.target_frequency = frequency;

        match self.state {
            // Nothing audible to glide from
            ToneState::Idle if frequency > 0.0 => {
                self.current_frequency = frequency;
                self.state = ToneState::Ramping;
            }
            ToneState::Idle => {}
            ToneState::Ramping | ToneState::Steady => self.state = ToneState::Ramping,
        }
    }

    /// Step the smoothers by one buffer and report what to render
    pub fn advance(&mut self) -> BufferPlan {
        let gain_start = self.gain;

        if self.state == ToneState::Idle {
            return BufferPlan {
                frequency: self.current_frequency,
                gain_start,
                gain_end: 0.0,
            };
        }

        let sounding = self.target_frequency > 0.0;
        if sounding {
            let s = self.smoothing;
            self.current_frequency = s * self.current_frequency + (1.0 - s) * self.target_frequency;
            if (self.current_frequency - self.target_frequency).abs() < FREQ_EPSILON {
                self.current_frequency = self.target_frequency;
            }
        }

        let goal = if sounding { 1.0 } else { 0.0 };
        let a = self.gain_smoothing;
        self.gain = a * self.gain + (1.0 - a) * goal;
        if (self.gain - goal).abs() < SILENT_GAIN {
            self.gain = goal;
        }

        self.state = if !sounding && self.gain == 0.0 {
            ToneState::Idle
        } else if self.gain == 1.0 && self.current_frequency == self.target_frequency {
            ToneState::Steady
        } else {
            ToneState::Ramping
        };

        BufferPlan {
            frequency: self.current_frequency,
            gain_start,
            gain_end: self.gain,
        }
    }

    /// Advance one buffer and add this channel's samples (scaled by
    /// `amplitude`) into `out`
    pub fn render_into(&mut self, out: &mut [f32], sample_rate: f32, amplitude: f32) {
        let n = out.len();
        if n == 0 {
            return;
        }
        let plan = self.advance();
        if plan.gain_start == 0.0 && plan.gain_end == 0.0 {
            return;
        }

        let step = TAU * plan.frequency as f64 / sample_rate as f64;
        let ramp = plan.gain_end - plan.gain_start;
        for (i, sample) in out.iter_mut().enumerate() {
            let gain = plan.gain_start + ramp * (i + 1) as f32 / n as f32;
            let value = (self.phase + step * i as f64).sin() as f32;
            *sample += amplitude * gain * value;
        }

        // Carry the phase of the sample that follows this buffer
        self.phase = (self.phase + step * n as f64).rem_euclid(TAU);
    }

    /// Drop straight to silence without a fade
    pub fn reset(&mut self) {
        self.state = ToneState::Idle;
        self.target_frequency = 0.0;
        self.gain = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44_100.0;

    #[test]
    fn test_idle_until_targeted() {
        let mut osc = ToneOscillator::new(0.05, 0.3);
        let mut buf = vec![0.0; 256];
        osc.render_into(&mut buf, SR, 1.0);
        assert_eq!(osc.state(), ToneState::Idle);
        assert!(buf.iter().all(|&s| s == 0.0));
        assert_eq!(osc.phase(), 0.0);
    }

    #[test]
    fn test_idle_snaps_frequency_and_fades_in() {
        let mut osc = ToneOscillator::new(0.05, 0.3);
        osc.set_target(440.0);
        assert_eq!(osc.state(), ToneState::Ramping);
        assert_eq!(osc.current_frequency(), 440.0);

        let plan = osc.advance();
        assert_eq!(plan.frequency, 440.0);
        assert_eq!(plan.gain_start, 0.0);
        assert!((plan.gain_end - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_reaches_steady() {
        let mut osc = ToneOscillator::new(0.05, 0.3);
        osc.set_target(440.0);
        for _ in 0..20 {
            osc.advance();
        }
        assert_eq!(osc.state(), ToneState::Steady);
        assert_eq!(osc.gain(), 1.0);
    }

    #[test]
    fn test_frequency_smoothing_rule() {
        let mut osc = ToneOscillator::new(0.05, 0.3);
        osc.set_target(200.0);
        for _ in 0..20 {
            osc.advance();
        }
        osc.set_target(400.0);
        let plan = osc.advance();
        assert!((plan.frequency - (0.05 * 200.0 + 0.95 * 400.0)).abs() < 1e-3);
        assert_eq!(osc.state(), ToneState::Ramping);
    }

    #[test]
    fn test_release_holds_frequency_and_goes_idle() {
        let mut osc = ToneOscillator::new(0.05, 0.3);
        osc.set_target(330.0);
        for _ in 0..20 {
            osc.advance();
        }
        osc.set_target(0.0);
        let mut previous = osc.gain();
        for _ in 0..12 {
            let plan = osc.advance();
            assert_eq!(plan.frequency, 330.0);
            assert!(plan.gain_end <= previous);
            previous = plan.gain_end;
        }
        assert_eq!(osc.state(), ToneState::Idle);
        assert_eq!(osc.gain(), 0.0);
    }

    #[test]
    fn test_phase_carries_next_sample() {
        let mut osc = ToneOscillator::new(0.05, 0.3);
        osc.set_target(1000.0);
        let mut buf = vec![0.0; 100];
        osc.render_into(&mut buf, SR, 1.0);
        let expected = (TAU * 1000.0 * 100.0 / SR as f64).rem_euclid(TAU);
        assert!((osc.phase() - expected).abs() < 1e-9);
        assert!(osc.phase() >= 0.0 && osc.phase() < TAU);
    }

    #[test]
    fn test_invalid_targets_release() {
        let mut osc = ToneOscillator::new(0.05, 0.3);
        osc.set_target(440.0);
        osc.advance();
        osc.set_target(f32::NAN);
        assert_eq!(osc.target_frequency(), 0.0);
        osc.set_target(-20.0);
        assert_eq!(osc.target_frequency(), 0.0);
    }
}
