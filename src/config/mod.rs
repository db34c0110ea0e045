//! Sector layout and synth settings, stored as JSON

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::core::geometry::{AngularBounds, BoxBounds};
use crate::core::notes::{DistanceNoteMapper, NoteMapperConfig};
use crate::core::synth::SynthConfig;
use crate::error::ConfigError;

const CONFIG_DIR_NAME: &str = "sector-piano";
const CONFIG_FILE_NAME: &str = "sectors.json";

/// Ray window of one sector, in degrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayConfig {
    pub azimuth_center: f32,
    pub azimuth_span: f32,
    #[serde(default)]
    pub elevation_center: f32,
    #[serde(default)]
    pub elevation_span: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorConfig {
    pub name: String,
    /// Overlay colour, passed through untouched
    #[serde(default = "default_color")]
    pub color: [u8; 3],
    pub ray: RayConfig,
    #[serde(default)]
    pub note_mapper: NoteMapperConfig,
    /// Camera-space box; replaces the ray window when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoxBounds>,
}

fn default_color() -> [u8; 3] {
    [255, 255, 255]
}

impl SectorConfig {
    /// Angular window plus the note mapper's distance band
    pub fn angular_bounds(&self) -> AngularBounds {
        AngularBounds {
            azimuth_center: self.ray.azimuth_center,
            azimuth_span: self.ray.azimuth_span,
            elevation_center: self.ray.elevation_center,
            elevation_span: self.ray.elevation_span,
            min_range: self.note_mapper.min_range,
            max_range: self.note_mapper.max_range,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.bounding_box {
            Some(bbox) => bbox.validate()?,
            None => self.angular_bounds().validate()?,
        }
        DistanceNoteMapper::new(self.note_mapper.clone())?;
        Ok(())
    }
}

/// Complete instrument configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PianoConfig {
    pub sectors: Vec<SectorConfig>,
    #[serde(default)]
    pub synth: SynthConfig,
    /// Detections with fewer valid pixels are treated as silence
    #[serde(default = "default_min_valid_points")]
    pub min_valid_points: usize,
}

fn default_min_valid_points() -> usize {
    10
}

impl Default for PianoConfig {
    fn default() -> Self {
        // Four voices side by side, bass on the left
        let voice = |name: &str, color: [u8; 3], azimuth: f32, low: &str, high: &str| SectorConfig {
            name: name.to_string(),
            color,
            ray: RayConfig {
                azimuth_center: azimuth,
                azimuth_span: 20.0,
                elevation_center: 0.0,
                elevation_span: 20.0,
            },
            note_mapper: NoteMapperConfig {
                min_range: 0.5,
                max_range: 3.5,
                lowest_note: low.to_string(),
                highest_note: high.to_string(),
            },
            bounding_box: None,
        };

        Self {
            sectors: vec![
                voice("Bass", [255, 64, 64], -30.0, "C2", "C3"),
                voice("Tenor", [255, 200, 0], -10.0, "C3", "C4"),
                voice("Alto", [64, 200, 64], 10.0, "C4", "C5"),
                voice("Soprano", [64, 128, 255], 30.0, "C5", "C6"),
            ],
            synth: SynthConfig::default(),
            min_valid_points: default_min_valid_points(),
        }
    }
}

impl PianoConfig {
    /// Reject anything that would mis-tune or mis-place a sector
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sectors.is_empty() {
            return Err(ConfigError::NoSectors);
        }

        let mut names = HashSet::new();
        for sector in &self.sectors {
            if !names.insert(sector.name.as_str()) {
                return Err(ConfigError::DuplicateSector(sector.name.clone()));
            }
            sector.validate()?;
        }

        self.synth.validate()?;
        // One tone channel per sector, in configuration order
        if self.sectors.len() > self.synth.channels {
            return Err(ConfigError::InvalidSynth(format!(
                "{} sectors need {} tone channels, only {} configured",
                self.sectors.len(),
                self.sectors.len(),
                self.synth.channels
            )));
        }
        Ok(())
    }

    /// Default location: `<config dir>/sector-piano/sectors.json`
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        path.push(CONFIG_DIR_NAME);
        path.push(CONFIG_FILE_NAME);
        Ok(path)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize configuration")?;

        let mut file = File::create(path)
            .with_context(|| format!("Failed to create config file {}", path.display()))?;
        file.write_all(json.as_bytes())
            .context("Failed to write configuration")?;

        info!("Wrote configuration to {}", path.display());
        Ok(())
    }

    /// Parse and validate a configuration file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .context("Failed to read config file")?;

        let config: Self = serde_json::from_str(&contents).context("Failed to parse configuration")?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        info!(
            "Loaded {} sector(s) from {}",
            config.sectors.len(),
            path.display()
        );
        Ok(config)
    }

    /// Explicit path if given, else the default file if present, else built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }
        match Self::default_path() {
            Ok(default) if default.exists() => Self::load_from_file(&default),
            _ => {
                info!("No configuration file found, using the built-in four-voice layout");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test gets its own directory
    fn temp_path(test: &str, name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("sector-piano-{}-{}", test, std::process::id()))
            .join(name)
    }

    #[test]
    fn test_default_layout_is_valid() {
        let config = PianoConfig::default();
        assert_eq!(config.sectors.len(), 4);
        assert_eq!(config.min_valid_points, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let json = r#"{
            "sectors": [
                { "name": "Left", "ray": { "azimuth_center": -20, "azimuth_span": 10 } }
            ]
        }"#;
        let config: PianoConfig = serde_json::from_str(json).unwrap();
        let sector = &config.sectors[0];
        assert_eq!(sector.color, [255, 255, 255]);
        assert_eq!(sector.ray.elevation_center, 0.0);
        assert_eq!(sector.ray.elevation_span, 0.0);
        assert_eq!(sector.note_mapper, NoteMapperConfig::default());
        assert_eq!(sector.bounding_box, None);
        assert_eq!(config.synth, SynthConfig::default());
        assert_eq!(config.min_valid_points, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = PianoConfig::default();
        config.sectors.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoSectors));

        let mut config = PianoConfig::default();
        config.sectors[1].name = "Bass".to_string();
        assert_eq!(config.validate(), Err(ConfigError::DuplicateSector("Bass".to_string())));

        let mut config = PianoConfig::default();
        config.sectors[0].note_mapper.highest_note = "Q9".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidNoteName(_))));

        let mut config = PianoConfig::default();
        config.sectors[2].note_mapper.min_range = 4.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRange { .. })));

        let mut config = PianoConfig::default();
        config.synth.channels = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSynth(_))));
    }

    #[test]
    fn test_more_sectors_than_channels_is_rejected() {
        let mut config = PianoConfig::default();
        let mut extra = config.sectors[1].clone();
        extra.name = "Descant".to_string();
        config.sectors.push(extra);
        config.synth.channels = 3;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSynth(_))));
        assert!(crate::core::Instrument::from_config(&config, crate::core::geometry::CameraIntrinsics::default()).is_err());

        config.synth.channels = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_box_sector_json() {
        let json = r#"{
            "name": "Box",
            "ray": { "azimuth_center": 0, "azimuth_span": 0 },
            "bounding_box": { "min": [-0.5, -0.5, 0.5], "max": [0.5, 0.5, 2.0] }
        }"#;
        let sector: SectorConfig = serde_json::from_str(json).unwrap();
        assert!(sector.bounding_box.is_some());
        assert!(sector.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_file() {
        let path = temp_path("save", "sectors.json");
        let config = PianoConfig::default();
        config.save_to_file(&path).unwrap();

        let loaded = PianoConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(PianoConfig::load_or_default(Some(&path)).unwrap(), config);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let path = temp_path("invalid", "broken.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "sectors": [] }"#).unwrap();
        assert!(PianoConfig::load_from_file(&path).is_err());
        assert!(PianoConfig::load_from_file(&temp_path("invalid", "missing.json")).is_err());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
