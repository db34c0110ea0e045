/// Upper bound on simultaneously rendered tone channels
pub const MAX_TONE_CHANNELS: usize = 8;

/// One complete set of target frequencies (Hz) handed to the audio thread.
///
/// Fixed-capacity and `Copy` so the audio callback can receive it without
/// allocating. A value of 0 means the channel should be silent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetFrequencies {
    values: [f32; MAX_TONE_CHANNELS],
    len: usize,
}

impl TargetFrequencies {
    /// Copy up to `MAX_TONE_CHANNELS` frequencies; extras are dropped.
    /// Non-finite or negative entries become silence.
    pub fn from_slice(frequencies: &[f32]) -> Self {
        let mut values = [0.0; MAX_TONE_CHANNELS];
        let len = frequencies.len().min(MAX_TONE_CHANNELS);
        for (slot, &freq) in values.iter_mut().zip(frequencies) {
            *slot = if freq.is_finite() && freq > 0.0 { freq } else { 0.0 };
        }
        Self { values, len }
    }

    /// `len` silent channels
    pub fn silent(len: usize) -> Self {
        Self {
            values: [0.0; MAX_TONE_CHANNELS],
            len: len.min(MAX_TONE_CHANNELS),
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Target for `channel`; channels past the end read as silent
    pub fn get(&self, channel: usize) -> f32 {
        self.as_slice().get(channel).copied().unwrap_or(0.0)
    }

    pub fn any_sounding(&self) -> bool {
        self.as_slice().iter().any(|&f| f > 0.0)
    }
}

impl Default for TargetFrequencies {
    fn default() -> Self {
        Self::silent(0)
    }
}

impl From<&[f32]> for TargetFrequencies {
    fn from(frequencies: &[f32]) -> Self {
        Self::from_slice(frequencies)
    }
}
