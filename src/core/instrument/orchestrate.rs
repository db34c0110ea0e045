use std::time::Duration;

use super::Instrument;

/// Where a melody note can be played: which sector, at what distance
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratedNote {
    pub note: String,
    /// `None` for rests and notes no sector covers
    pub sector: Option<String>,
    pub distance_m: Option<f32>,
    pub frequency: Option<f32>,
}

impl OrchestratedNote {
    pub fn is_rest(&self) -> bool {
        self.frequency.is_none()
    }

    /// How long to hold this entry at `bpm`: a sixteenth of a beat for
    /// notes, half that for rests
    pub fn duration(&self, bpm: f32) -> Duration {
        let note = note_duration(bpm);
        if self.is_rest() {
            note / 2
        } else {
            note
        }
    }
}

const DEFAULT_BPM: f32 = 60.0;

/// Seconds per note at `bpm`; tempos that give no representable duration
/// fall back to 60 bpm
pub fn note_duration(bpm: f32) -> Duration {
    let fallback = Duration::from_secs_f32(60.0 / (DEFAULT_BPM * 4.0));
    if !(bpm.is_finite() && bpm > 0.0) {
        return fallback;
    }
    Duration::try_from_secs_f32(60.0 / (bpm * 4.0)).unwrap_or(fallback)
}

/// Assign each note to the first sector whose range table contains it.
/// The distance is the middle of that note's bin, so standing there plays it.
pub fn orchestrate<S: AsRef<str>>(melody: &[S], instrument: &Instrument) -> Vec<OrchestratedNote> {
    melody
        .iter()
        .map(|note| {
            let note = note.as_ref().trim();
            let placement = instrument.sectors().iter().find_map(|sector| {
                let distance = sector.mapper().distance_for_note(note)?;
                let frequency = sector.mapper().frequency_from_distance(distance)?;
                Some((sector.name().to_string(), distance, frequency))
            });

            match placement {
                Some((sector, distance, frequency)) => OrchestratedNote {
                    note: note.to_string(),
                    sector: Some(sector),
                    distance_m: Some(distance),
                    frequency: Some(frequency),
                },
                None => OrchestratedNote {
                    note: note.to_string(),
                    sector: None,
                    distance_m: None,
                    frequency: None,
                },
            }
        })
        .collect()
}

/// Split a comma or whitespace separated melody; empty slots become rests
pub fn parse_melody(text: &str) -> Vec<String> {
    if text.contains(',') {
        text.split(',').map(|n| n.trim().to_string()).collect()
    } else {
        text.split_whitespace().map(str::to_string).collect()
    }
}
