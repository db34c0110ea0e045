//! Synthetic depth scenes: a flat background with discs moving toward and
//! away from the camera, one per sector

use std::f32::consts::FRAC_PI_2;

use log::debug;

use crate::config::PianoConfig;
use crate::core::geometry::{point_angles, CameraIntrinsics, DepthFrame};
use crate::core::instrument::Instrument;
use crate::core::synth::{SynthConfig, ToneBank};
use crate::error::ConfigError;

const DEFAULT_BACKGROUND_MM: u16 = 4000;
const DEFAULT_RADIUS_PX: f32 = 28.0;
const DEFAULT_FPS: f32 = 30.0;

/// A disc whose distance oscillates as `center_m + swing_m * sin(rate * t + phase)`
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub azimuth_deg: f32,
    pub elevation_deg: f32,
    pub radius_px: f32,
    pub center_m: f32,
    pub swing_m: f32,
    /// Radians per second
    pub rate: f32,
    pub phase: f32,
}

impl SceneObject {
    pub fn new(azimuth_deg: f32, elevation_deg: f32, phase: f32) -> Self {
        Self {
            azimuth_deg,
            elevation_deg,
            radius_px: DEFAULT_RADIUS_PX,
            center_m: 2.0,
            swing_m: 1.5,
            rate: 1.0,
            phase,
        }
    }

    /// A disc held at a fixed distance
    pub fn stationary(azimuth_deg: f32, elevation_deg: f32, distance_m: f32) -> Self {
        Self {
            center_m: distance_m,
            swing_m: 0.0,
            ..Self::new(azimuth_deg, elevation_deg, 0.0)
        }
    }

    pub fn distance_at(&self, t_secs: f32) -> f32 {
        self.center_m + self.swing_m * (self.rate * t_secs + self.phase).sin()
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticScene {
    intrinsics: CameraIntrinsics,
    depth_scale: f32,
    background_mm: u16,
    objects: Vec<SceneObject>,
    fps: f32,
    /// Uniform noise amplitude, in raw depth units
    noise: f32,
    /// Probability that a pixel reports no return
    dropout: f32,
}

impl SyntheticScene {
    pub fn new(intrinsics: CameraIntrinsics) -> Self {
        Self {
            intrinsics,
            depth_scale: 0.001,
            background_mm: DEFAULT_BACKGROUND_MM,
            objects: Vec::new(),
            fps: DEFAULT_FPS,
            noise: 0.0,
            dropout: 0.0,
        }
    }

    /// One moving disc in the middle of every configured sector, a quarter
    /// period apart
    pub fn for_config(config: &PianoConfig, intrinsics: CameraIntrinsics) -> Self {
        let mut scene = Self::new(intrinsics);
        for (i, sector) in config.sectors.iter().enumerate() {
            let (azimuth, elevation) = match sector.bounding_box {
                Some(bbox) => {
                    let centre = [
                        (bbox.min[0] + bbox.max[0]) / 2.0,
                        (bbox.min[1] + bbox.max[1]) / 2.0,
                        (bbox.min[2] + bbox.max[2]) / 2.0,
                    ];
                    point_angles(centre)
                }
                None => (sector.ray.azimuth_center, sector.ray.elevation_center),
            };
            scene.add_object(SceneObject::new(azimuth, elevation, i as f32 * FRAC_PI_2));
        }
        scene
    }

    pub fn with_noise(mut self, noise_mm: f32, dropout: f32) -> Self {
        self.noise = noise_mm.max(0.0) * 0.001 / self.depth_scale;
        self.dropout = dropout.clamp(0.0, 1.0);
        self
    }

    pub fn with_background(mut self, background_mm: u16) -> Self {
        self.background_mm = background_mm;
        self
    }

    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Frame number `index` of a 30 fps sequence
    pub fn frame(&self, index: u64) -> Result<DepthFrame, ConfigError> {
        self.frame_at(index as f32 / self.fps)
    }

    pub fn frame_at(&self, t_secs: f32) -> Result<DepthFrame, ConfigError> {
        let k = &self.intrinsics;
        let mut frame = DepthFrame::filled(k.width, k.height, self.background_mm, self.depth_scale)?;
        let width = k.width as usize;

        for object in &self.objects {
            let cx = k.column_for_azimuth(object.azimuth_deg);
            let cy = k.row_for_elevation(object.elevation_deg);
            let raw = (object.distance_at(t_secs) / self.depth_scale)
                .round()
                .clamp(0.0, u16::MAX as f32) as u16;

            let r = object.radius_px;
            let x0 = (cx - r).floor().max(0.0) as usize;
            let x1 = ((cx + r).ceil().max(0.0) as usize).min(width.saturating_sub(1));
            let y0 = (cy - r).floor().max(0.0) as usize;
            let y1 = ((cy + r).ceil().max(0.0) as usize).min(k.height as usize - 1);

            let data = frame.data_mut();
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                    if dx * dx + dy * dy < r * r {
                        data[y * width + x] = raw;
                    }
                }
            }
        }

        if self.noise > 0.0 || self.dropout > 0.0 {
            for sample in frame.data_mut().iter_mut() {
                if self.dropout > 0.0 && rand::random::<f32>() < self.dropout {
                    *sample = 0;
                    continue;
                }
                if self.noise > 0.0 && *sample != 0 {
                    let jitter = (rand::random::<f32>() * 2.0 - 1.0) * self.noise;
                    *sample = (*sample as f32 + jitter).round().clamp(1.0, u16::MAX as f32) as u16;
                }
            }
        }

        Ok(frame)
    }

    /// Play the scene through `instrument` into an offline tone bank.
    ///
    /// Audio runs on its own clock: each block of `buffer_size` samples picks
    /// up whatever frame is current at the block's start time, as a live
    /// stream would.
    pub fn perform(
        &self,
        instrument: &mut Instrument,
        synth: &SynthConfig,
        seconds: f32,
    ) -> Result<Vec<f32>, ConfigError> {
        synth.validate()?;
        let mut bank = ToneBank::new(synth);
        let sample_rate = synth.sample_rate as f32;
        let total = (seconds.max(0.0) * sample_rate).round() as usize;
        let block = synth.buffer_size as usize;

        let mut samples = vec![0.0; total];
        let mut current_frame = None;
        for (i, chunk) in samples.chunks_mut(block).enumerate() {
            let t = (i * block) as f32 / sample_rate;
            let index = (t * self.fps).floor() as u64;
            if current_frame != Some(index) {
                let output = instrument.process_frame(&self.frame(index)?)?;
                debug!("frame {} -> {:?}", index, output.notes());
                bank.set_target_frequencies(&output.frequencies());
                current_frame = Some(index);
            }
            bank.render(chunk);
        }
        Ok(samples)
    }
}
