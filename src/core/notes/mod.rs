//! Diatonic note table and frequency lookups

pub mod mapper;

pub use self::mapper::{DistanceNoteMapper, NoteMapper, NoteMapperConfig, NoteRange};

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::ConfigError;

const A4_FREQ: f32 = 440.0;
const LOWEST_OCTAVE: i32 = 1;
const HIGHEST_OCTAVE: i32 = 8;

/// Default tolerance (percent) for reverse frequency lookups
pub const DEFAULT_TOLERANCE_PERCENT: f32 = 1.0;

// C major scale letters with their semitone offset from A in the same octave
const SCALE: [(char, i32); 7] = [
    ('C', -9),
    ('D', -7),
    ('E', -5),
    ('F', -4),
    ('G', -2),
    ('A', 0),
    ('B', 2),
];

/// One entry of the master note table
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub name: String,
    pub frequency: f32,
}

/// Ordered (ascending pitch) table of diatonic notes, C1 through C8
#[derive(Debug)]
pub struct NoteTable {
    notes: Vec<Note>,
    index: HashMap<String, usize>,
}

impl NoteTable {
    fn build() -> Self {
        let mut notes = Vec::new();

        for octave in LOWEST_OCTAVE..=HIGHEST_OCTAVE {
            for &(letter, offset) in SCALE.iter() {
                // The table ends on C8, the top of a piano keyboard
                if octave == HIGHEST_OCTAVE && letter != 'C' {
                    break;
                }
                let semitones_from_a4 = offset + (octave - 4) * 12;
                notes.push(Note {
                    name: format!("{}{}", letter, octave),
                    frequency: A4_FREQ * 2.0f32.powf(semitones_from_a4 as f32 / 12.0),
                });
            }
        }

        let index = notes
            .iter()
            .enumerate()
            .map(|(i, note)| (note.name.clone(), i))
            .collect();

        Self { notes, index }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Position of `name` in the ascending table
    pub fn index_of(&self, name: &str) -> Result<usize, ConfigError> {
        if let Some(&idx) = self.index.get(name) {
            return Ok(idx);
        }
        if is_well_formed(name) {
            Err(ConfigError::UnknownNote(name.to_string()))
        } else {
            Err(ConfigError::InvalidNoteName(name.to_string()))
        }
    }
}

/// Shared, read-only note table
pub static NOTE_TABLE: LazyLock<NoteTable> = LazyLock::new(NoteTable::build);

fn is_well_formed(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(letter) = chars.next() else {
        return false;
    };
    if !('A'..='G').contains(&letter) {
        return false;
    }
    let rest: &str = chars.as_str();
    let digits = rest.trim_start_matches(['#', 'b']);
    // At most one accidental
    if rest.len() - digits.len() > 1 {
        return false;
    }
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Index of a note name in the master table
pub fn note_index(name: &str) -> Result<usize, ConfigError> {
    NOTE_TABLE.index_of(name)
}

/// Frequency (Hz) of a named note, if it exists in the table
pub fn note_frequency(name: &str) -> Option<f32> {
    let table: &'static NoteTable = &NOTE_TABLE;
    table.index.get(name).map(|&i| table.notes[i].frequency)
}

/// Resolve a name to the table's own `'static` copy of it
pub fn canonical_name(name: &str) -> Option<&'static str> {
    let table: &'static NoteTable = &NOTE_TABLE;
    table.index.get(name).map(|&i| table.notes[i].name.as_str())
}

/// Map a frequency back to the first note within `tolerance_percent` of it
pub fn note_from_frequency(frequency: f32, tolerance_percent: f32) -> Option<&'static str> {
    if !(frequency > 0.0) {
        return None;
    }
    let table: &'static NoteTable = &NOTE_TABLE;
    table
        .notes
        .iter()
        .find(|note| (frequency - note.frequency).abs() / note.frequency * 100.0 <= tolerance_percent)
        .map(|note| note.name.as_str())
}

/// Closest note by absolute frequency difference (tuner-style lookup)
pub fn nearest_note(frequency: f32) -> Option<&'static str> {
    if !(frequency > 0.0) || !frequency.is_finite() {
        return None;
    }
    let table: &'static NoteTable = &NOTE_TABLE;
    table
        .notes
        .iter()
        .min_by(|a, b| {
            (a.frequency - frequency)
                .abs()
                .total_cmp(&(b.frequency - frequency).abs())
        })
        .map(|note| note.name.as_str())
}
