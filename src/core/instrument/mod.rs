//! Per-frame pipeline: depth frame -> sector detections -> notes -> frequencies

pub mod orchestrate;

pub use self::orchestrate::{orchestrate, OrchestratedNote};

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::{PianoConfig, SectorConfig};
use crate::core::geometry::{
    AngularSectorDetector, BoxSectorDetector, CameraIntrinsics, DepthFrame, SectorDetection, SectorDetector,
    SectorMask,
};
use crate::core::notes::{note_frequency, DistanceNoteMapper, NoteMapper};
use crate::error::ConfigError;

const STATS_INTERVAL: u64 = 30;

/// One virtual key: where to look and which notes it plays
pub struct Sector {
    name: String,
    color: [u8; 3],
    detector: Box<dyn SectorDetector>,
    mapper: Box<dyn NoteMapper>,
}

impl Sector {
    pub fn new(
        name: impl Into<String>,
        color: [u8; 3],
        detector: Box<dyn SectorDetector>,
        mapper: Box<dyn NoteMapper>,
    ) -> Self {
        Self {
            name: name.into(),
            color,
            detector,
            mapper,
        }
    }

    pub fn from_config(config: &SectorConfig, intrinsics: CameraIntrinsics) -> Result<Self, ConfigError> {
        let detector: Box<dyn SectorDetector> = match config.bounding_box {
            Some(bbox) => Box::new(BoxSectorDetector::new(bbox, intrinsics)?),
            None => Box::new(AngularSectorDetector::new(config.angular_bounds(), intrinsics)?),
        };
        let mapper = DistanceNoteMapper::new(config.note_mapper.clone())?;
        Ok(Self::new(config.name.clone(), config.color, detector, Box::new(mapper)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }

    pub fn detector(&self) -> &dyn SectorDetector {
        self.detector.as_ref()
    }

    pub fn mapper(&self) -> &dyn NoteMapper {
        self.mapper.as_ref()
    }

    /// Detect, quantize and look up the frequency for one frame
    pub fn read(&self, frame: &DepthFrame, min_valid_points: usize, with_mask: bool) -> SectorReading {
        let detection = self.detector.detect(frame);
        let note = detection
            .filter(|d| d.num_valid_points >= min_valid_points)
            .and_then(|d| self.mapper.note_from_distance(d.min_distance_m));
        let frequency = note.and_then(note_frequency).unwrap_or(0.0);

        SectorReading {
            name: self.name.clone(),
            color: self.color,
            detection,
            note,
            frequency,
            mask: with_mask.then(|| self.detector.valid_mask(frame)),
        }
    }
}

/// Result of one sector for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SectorReading {
    pub name: String,
    pub color: [u8; 3],
    pub detection: Option<SectorDetection>,
    /// `None` when the sector is silent this frame
    pub note: Option<&'static str>,
    /// Hz, 0.0 when silent
    pub frequency: f32,
    /// Valid-pixel mask, only when mask collection is enabled
    pub mask: Option<SectorMask>,
}

impl SectorReading {
    pub fn is_sounding(&self) -> bool {
        self.note.is_some()
    }
}

/// All sector readings of one frame, in configuration order
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub readings: Vec<SectorReading>,
}

impl FrameOutput {
    /// One target per sector, ready for the tone generator
    pub fn frequencies(&self) -> Vec<f32> {
        self.readings.iter().map(|r| r.frequency).collect()
    }

    pub fn notes(&self) -> Vec<Option<&'static str>> {
        self.readings.iter().map(|r| r.note).collect()
    }

    pub fn sounding(&self) -> impl Iterator<Item = &SectorReading> {
        self.readings.iter().filter(|r| r.is_sounding())
    }
}

/// Frame-rate bookkeeping, logged every 30 frames
#[derive(Debug, Clone)]
pub struct FrameStats {
    frames: u64,
    started: Instant,
    last_frame_at: Option<Instant>,
    last_frame_time: Duration,
    last_processing: Duration,
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            frames: 0,
            started: Instant::now(),
            last_frame_at: None,
            last_frame_time: Duration::ZERO,
            last_processing: Duration::ZERO,
        }
    }

    pub fn record(&mut self, processing: Duration) {
        let now = Instant::now();
        if let Some(previous) = self.last_frame_at {
            self.last_frame_time = now.duration_since(previous);
        }
        self.last_frame_at = Some(now);
        self.last_processing = processing;
        self.frames += 1;

        if self.frames % STATS_INTERVAL == 0 {
            info!(
                "FPS: {:.1}, Frame time: {:.1}ms, Process time: {:.1}ms",
                self.fps(),
                self.last_frame_time.as_secs_f64() * 1000.0,
                processing.as_secs_f64() * 1000.0
            );
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Average frames per second since creation
    pub fn fps(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn last_processing(&self) -> Duration {
        self.last_processing
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

/// The full instrument: every configured sector over one camera stream
pub struct Instrument {
    sectors: Vec<Sector>,
    intrinsics: CameraIntrinsics,
    min_valid_points: usize,
    collect_masks: bool,
    stats: FrameStats,
}

impl Instrument {
    pub fn new(sectors: Vec<Sector>, intrinsics: CameraIntrinsics, min_valid_points: usize) -> Result<Self, ConfigError> {
        intrinsics.validate()?;
        if sectors.is_empty() {
            return Err(ConfigError::NoSectors);
        }
        Ok(Self {
            sectors,
            intrinsics,
            min_valid_points,
            collect_masks: false,
            stats: FrameStats::new(),
        })
    }

    /// Build every sector up front; any bad sector aborts the whole instrument
    pub fn from_config(config: &PianoConfig, intrinsics: CameraIntrinsics) -> Result<Self, ConfigError> {
        config.validate()?;
        let sectors = config
            .sectors
            .iter()
            .map(|sector| Sector::from_config(sector, intrinsics))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "Instrument ready: {} sector(s) over a {}x{} depth stream",
            sectors.len(),
            intrinsics.width,
            intrinsics.height
        );
        Self::new(sectors, intrinsics, config.min_valid_points)
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn sector(&self, name: &str) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.name() == name)
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn min_valid_points(&self) -> usize {
        self.min_valid_points
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Also return each sector's valid-pixel mask (for overlays)
    pub fn set_collect_masks(&mut self, collect: bool) {
        self.collect_masks = collect;
    }

    /// Run every sector over one frame
    pub fn process_frame(&mut self, frame: &DepthFrame) -> Result<FrameOutput, ConfigError> {
        frame.check_matches(&self.intrinsics)?;
        let start = Instant::now();

        let readings: Vec<SectorReading> = self
            .sectors
            .iter()
            .map(|sector| sector.read(frame, self.min_valid_points, self.collect_masks))
            .collect();

        for reading in &readings {
            match (&reading.detection, reading.note) {
                (Some(d), Some(note)) => debug!(
                    "{}: {} at {:.2} m ({} points, azimuth {:.1})",
                    reading.name, note, d.min_distance_m, d.num_valid_points, d.azimuth_deg
                ),
                (Some(d), None) => debug!(
                    "{}: silent ({} points at {:.2} m)",
                    reading.name, d.num_valid_points, d.min_distance_m
                ),
                (None, _) => debug!("{}: nothing detected", reading.name),
            }
        }

        self.stats.record(start.elapsed());
        Ok(FrameOutput { readings })
    }
}
