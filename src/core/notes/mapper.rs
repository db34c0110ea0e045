use serde::{Deserialize, Serialize};

use super::{note_frequency, NOTE_TABLE};
use crate::error::ConfigError;

/// Converts a detected distance into a note of the diatonic table
pub trait NoteMapper: Send + Sync {
    /// Range table, ordered farthest (lowest note) to nearest (highest note)
    fn ranges(&self) -> &[NoteRange];

    /// Note whose bin contains `distance_m`, or `None` outside the mapped range
    fn note_from_distance(&self, distance_m: f32) -> Option<&'static str> {
        if !distance_m.is_finite() {
            return None;
        }
        self.ranges()
            .iter()
            .find(|range| range.contains(distance_m))
            .map(|range| range.note)
    }

    /// Frequency (Hz) of the resolved note; `None` means silence
    fn frequency_from_distance(&self, distance_m: f32) -> Option<f32> {
        self.note_from_distance(distance_m).and_then(note_frequency)
    }

    /// Midpoint of the bin assigned to `note`
    fn distance_for_note(&self, note: &str) -> Option<f32> {
        self.ranges()
            .iter()
            .find(|range| range.note == note)
            .map(|range| range.midpoint())
    }
}

/// Distance range and note span for one sector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMapperConfig {
    #[serde(default = "default_min_range")]
    pub min_range: f32,
    #[serde(default = "default_max_range")]
    pub max_range: f32,
    #[serde(default = "default_lowest_note")]
    pub lowest_note: String,
    #[serde(default = "default_highest_note")]
    pub highest_note: String,
}

fn default_min_range() -> f32 {
    0.5
}

fn default_max_range() -> f32 {
    3.5
}

fn default_lowest_note() -> String {
    "C3".to_string()
}

fn default_highest_note() -> String {
    "C4".to_string()
}

impl Default for NoteMapperConfig {
    fn default() -> Self {
        Self {
            min_range: default_min_range(),
            max_range: default_max_range(),
            lowest_note: default_lowest_note(),
            highest_note: default_highest_note(),
        }
    }
}

/// One distance bin. Half-open `[min, max)`, closed at `max` when `closed_max` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteRange {
    pub min: f32,
    pub max: f32,
    pub note: &'static str,
    pub closed_max: bool,
}

impl NoteRange {
    pub fn contains(&self, distance_m: f32) -> bool {
        distance_m >= self.min
            && (distance_m < self.max || (self.closed_max && distance_m <= self.max))
    }

    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) / 2.0
    }

    pub fn width(&self) -> f32 {
        self.max - self.min
    }
}

/// Equal-width bins over `[min_range, max_range]`, nearest bin = highest note
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceNoteMapper {
    config: NoteMapperConfig,
    ranges: Vec<NoteRange>,
}

impl DistanceNoteMapper {
    pub fn new(config: NoteMapperConfig) -> Result<Self, ConfigError> {
        let ranges = calculate_ranges(&config)?;
        Ok(Self { config, ranges })
    }

    pub fn config(&self) -> &NoteMapperConfig {
        &self.config
    }

    pub fn min_range(&self) -> f32 {
        self.config.min_range
    }

    pub fn max_range(&self) -> f32 {
        self.config.max_range
    }

    /// Notes covered by this mapper, lowest first
    pub fn note_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ranges.iter().map(|range| range.note)
    }

    pub fn covers(&self, note: &str) -> bool {
        self.ranges.iter().any(|range| range.note == note)
    }
}

impl NoteMapper for DistanceNoteMapper {
    fn ranges(&self) -> &[NoteRange] {
        &self.ranges
    }
}

fn calculate_ranges(config: &NoteMapperConfig) -> Result<Vec<NoteRange>, ConfigError> {
    let (min, max) = (config.min_range, config.max_range);
    if !min.is_finite() || !max.is_finite() || min < 0.0 || min >= max {
        return Err(ConfigError::InvalidRange { min, max });
    }

    let lowest = NOTE_TABLE.index_of(&config.lowest_note)?;
    let highest = NOTE_TABLE.index_of(&config.highest_note)?;
    if lowest > highest {
        return Err(ConfigError::InvertedNoteOrder {
            lowest: config.lowest_note.clone(),
            highest: config.highest_note.clone(),
        });
    }

    let table: &'static [super::Note] = NOTE_TABLE.notes();
    let selected = &table[lowest..=highest];
    let count = selected.len();
    let section = (max - min) / count as f32;

    // edges[k] is the far edge of bin k; neighbours share the exact same value
    let edges: Vec<f32> = (0..=count)
        .map(|k| if k == count { min } else { max - k as f32 * section })
        .collect();

    Ok(selected
        .iter()
        .enumerate()
        .map(|(i, note)| NoteRange {
            min: edges[i + 1],
            max: edges[i],
            note: note.name.as_str(),
            closed_max: i == 0,
        })
        .collect())
}
