//! Depth-frame geometry: pinhole deprojection and per-sector masking
//!
//! A depth frame is a grid of raw `u16` samples; multiplying by the frame's
//! `depth_scale` gives meters. A raw value of 0 means "no return" and is never
//! a valid point.

mod detector;

pub use self::detector::{AngularSectorDetector, BoxBounds, BoxSectorDetector, SectorDetector};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pinhole intrinsics of the depth stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    /// Principal point (pixels)
    pub ppx: f32,
    pub ppy: f32,
    /// Focal lengths (pixels)
    pub fx: f32,
    pub fy: f32,
}

impl CameraIntrinsics {
    /// Reject intrinsics that would divide by zero during deprojection
    pub fn validate(&self) -> Result<(), ConfigError> {
        let usable = |f: f32| f.is_finite() && f != 0.0;
        if !usable(self.fx) || !usable(self.fy) {
            return Err(ConfigError::InvalidIntrinsics {
                fx: self.fx,
                fy: self.fy,
            });
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidBounds(format!(
                "camera resolution {}x{} is empty",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Camera-space point for pixel `(px, py)` at `depth_m`
    pub fn deproject(&self, px: f32, py: f32, depth_m: f32) -> [f32; 3] {
        [
            (px - self.ppx) * depth_m / self.fx,
            (py - self.ppy) * depth_m / self.fy,
            depth_m,
        ]
    }

    /// Pixel column whose ray has the given azimuth (degrees)
    pub fn column_for_azimuth(&self, azimuth_deg: f32) -> f32 {
        self.ppx + self.fx * azimuth_deg.to_radians().tan()
    }

    /// Pixel row whose ray has the given elevation (degrees)
    pub fn row_for_elevation(&self, elevation_deg: f32) -> f32 {
        self.ppy + self.fy * elevation_deg.to_radians().tan()
    }
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        // 640x480 with the principal point at the image centre
        Self {
            width: 640,
            height: 480,
            ppx: 320.0,
            ppy: 240.0,
            fx: 500.0,
            fy: 500.0,
        }
    }
}

/// Azimuth and elevation (degrees) of a camera-space point
pub fn point_angles(point: [f32; 3]) -> (f32, f32) {
    let [x, y, z] = point;
    (x.atan2(z).to_degrees(), y.atan2(z).to_degrees())
}

/// One depth image, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    width: u32,
    height: u32,
    data: Vec<u16>,
    depth_scale: f32,
}

impl DepthFrame {
    pub fn new(width: u32, height: u32, data: Vec<u16>, depth_scale: f32) -> Result<Self, ConfigError> {
        if data.len() != width as usize * height as usize {
            return Err(ConfigError::FrameSizeMismatch {
                width,
                height,
                actual_width: width,
                actual_height: height,
                samples: data.len(),
            });
        }
        if !(depth_scale.is_finite() && depth_scale > 0.0) {
            return Err(ConfigError::InvalidBounds(format!(
                "depth scale must be positive, got {}",
                depth_scale
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            depth_scale,
        })
    }

    /// A frame where every pixel reads `raw`
    pub fn filled(width: u32, height: u32, raw: u16, depth_scale: f32) -> Result<Self, ConfigError> {
        Self::new(width, height, vec![raw; width as usize * height as usize], depth_scale)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth_scale(&self) -> f32 {
        self.depth_scale
    }

    pub fn data(&self) -> &[u16] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u16] {
        &mut self.data
    }

    pub fn raw(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Depth in meters; `None` for out-of-bounds or no-return pixels
    pub fn depth_m(&self, x: u32, y: u32) -> Option<f32> {
        match self.raw(x, y)? {
            0 => None,
            raw => Some(raw as f32 * self.depth_scale),
        }
    }

    /// Raw samples of row `y`; `None` past the last row
    pub fn row(&self, y: usize) -> Option<&[u16]> {
        if y >= self.height as usize {
            return None;
        }
        let w = self.width as usize;
        self.data.get(y * w..(y + 1) * w)
    }

    /// Check this frame against the stream intrinsics
    pub fn check_matches(&self, intrinsics: &CameraIntrinsics) -> Result<(), ConfigError> {
        if self.width != intrinsics.width || self.height != intrinsics.height {
            return Err(ConfigError::FrameSizeMismatch {
                width: intrinsics.width,
                height: intrinsics.height,
                actual_width: self.width,
                actual_height: self.height,
                samples: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Angular and range acceptance region of one sector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngularBounds {
    /// Degrees, negative = left
    pub azimuth_center: f32,
    /// Degrees, total width
    pub azimuth_span: f32,
    /// Degrees, negative = up (image rows grow downwards)
    pub elevation_center: f32,
    /// Degrees, total height
    pub elevation_span: f32,
    /// Meters, exclusive
    pub min_range: f32,
    /// Meters, exclusive
    pub max_range: f32,
}

impl AngularBounds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let angles = [
            self.azimuth_center,
            self.azimuth_span,
            self.elevation_center,
            self.elevation_span,
        ];
        if angles.iter().any(|a| !a.is_finite()) {
            return Err(ConfigError::InvalidBounds("angles must be finite".to_string()));
        }
        if self.azimuth_span < 0.0 || self.elevation_span < 0.0 {
            return Err(ConfigError::InvalidBounds(format!(
                "spans must be non-negative (azimuth {}, elevation {})",
                self.azimuth_span, self.elevation_span
            )));
        }
        if self.azimuth_span >= 180.0 || self.elevation_span >= 180.0 {
            return Err(ConfigError::InvalidBounds(
                "spans must be below 180 degrees".to_string(),
            ));
        }
        if !self.min_range.is_finite()
            || !self.max_range.is_finite()
            || self.min_range < 0.0
            || self.min_range >= self.max_range
        {
            return Err(ConfigError::InvalidRange {
                min: self.min_range,
                max: self.max_range,
            });
        }
        Ok(())
    }

    pub fn azimuth_window(&self) -> (f32, f32) {
        let half = self.azimuth_span / 2.0;
        (self.azimuth_center - half, self.azimuth_center + half)
    }

    pub fn elevation_window(&self) -> (f32, f32) {
        let half = self.elevation_span / 2.0;
        (self.elevation_center - half, self.elevation_center + half)
    }

    pub fn contains_azimuth(&self, azimuth_deg: f32) -> bool {
        let (lo, hi) = self.azimuth_window();
        azimuth_deg >= lo && azimuth_deg <= hi
    }

    pub fn contains_elevation(&self, elevation_deg: f32) -> bool {
        let (lo, hi) = self.elevation_window();
        elevation_deg >= lo && elevation_deg <= hi
    }

    /// Strict on both ends, so a zero depth is never in range
    pub fn contains_range(&self, depth_m: f32) -> bool {
        depth_m > self.min_range && depth_m < self.max_range
    }
}

/// Closest valid point of one sector in one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorDetection {
    pub min_distance_m: f32,
    pub num_valid_points: usize,
    /// Mean azimuth of the valid points
    pub azimuth_deg: f32,
}

/// Per-pixel validity for overlay collaborators
#[derive(Debug, Clone, PartialEq)]
pub struct SectorMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl SectorMask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_valid(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[y as usize * self.width as usize + x as usize]
    }

    pub(crate) fn set(&mut self, x: usize, y: usize) {
        let idx = y * self.width as usize + x;
        self.bits[idx] = true;
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Coordinates of all valid pixels, row-major
    pub fn iter_valid(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let w = self.width as usize;
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(move |(i, _)| ((i % w) as u32, (i / w) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsics_validation() {
        assert!(CameraIntrinsics::default().validate().is_ok());

        let zero_fx = CameraIntrinsics {
            fx: 0.0,
            ..Default::default()
        };
        assert!(matches!(zero_fx.validate(), Err(ConfigError::InvalidIntrinsics { .. })));

        let nan_fy = CameraIntrinsics {
            fy: f32::NAN,
            ..Default::default()
        };
        assert!(nan_fy.validate().is_err());
    }

    #[test]
    fn test_deproject_principal_point_is_on_axis() {
        let k = CameraIntrinsics::default();
        assert_eq!(k.deproject(320.0, 240.0, 2.0), [0.0, 0.0, 2.0]);

        let p = k.deproject(820.0, 240.0, 1.0);
        let (az, el) = point_angles(p);
        assert!((az - 45.0).abs() < 1e-4);
        assert!(el.abs() < 1e-6);
    }

    #[test]
    fn test_column_for_azimuth_round_trips() {
        let k = CameraIntrinsics::default();
        let col = k.column_for_azimuth(-20.0);
        let (az, _) = point_angles(k.deproject(col, k.ppy, 1.5));
        assert!((az + 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_frame_size_checked() {
        assert!(DepthFrame::new(4, 4, vec![0; 15], 0.001).is_err());
        assert!(DepthFrame::new(4, 4, vec![0; 16], 0.0).is_err());
        let frame = DepthFrame::new(4, 4, vec![0; 16], 0.001).unwrap();
        assert!(frame.check_matches(&CameraIntrinsics::default()).is_err());
    }

    #[test]
    fn test_zero_depth_reads_as_no_return() {
        let mut frame = DepthFrame::filled(2, 2, 0, 0.001).unwrap();
        assert_eq!(frame.depth_m(0, 0), None);
        frame.data_mut()[3] = 1500;
        assert!((frame.depth_m(1, 1).unwrap() - 1.5).abs() < 1e-6);
        assert_eq!(frame.depth_m(2, 0), None);
    }

    #[test]
    fn test_row_access_is_bounded() {
        let mut frame = DepthFrame::filled(3, 2, 0, 0.001).unwrap();
        frame.data_mut()[4] = 900;
        assert_eq!(frame.row(1), Some(&[0u16, 900, 0][..]));
        assert_eq!(frame.row(2), None);
        assert_eq!(frame.row(usize::MAX), None);
    }

    #[test]
    fn test_bounds_windows() {
        let bounds = AngularBounds {
            azimuth_center: -20.0,
            azimuth_span: 10.0,
            elevation_center: -10.0,
            elevation_span: 10.0,
            min_range: 0.5,
            max_range: 3.5,
        };
        assert!(bounds.validate().is_ok());
        assert!(bounds.contains_azimuth(-25.0));
        assert!(bounds.contains_azimuth(-15.0));
        assert!(!bounds.contains_azimuth(-14.9));
        assert!(bounds.contains_elevation(-14.0));
        assert!(!bounds.contains_elevation(0.1));
        assert!(!bounds.contains_range(0.5));
        assert!(!bounds.contains_range(3.5));
        assert!(!bounds.contains_range(0.0));
        assert!(bounds.contains_range(0.51));
    }

    #[test]
    fn test_bounds_validation() {
        let mut bounds = AngularBounds {
            azimuth_center: 0.0,
            azimuth_span: 20.0,
            elevation_center: 0.0,
            elevation_span: 10.0,
            min_range: 3.0,
            max_range: 1.0,
        };
        assert!(matches!(bounds.validate(), Err(ConfigError::InvalidRange { .. })));
        bounds.min_range = 0.5;
        bounds.max_range = 3.5;
        bounds.azimuth_span = -1.0;
        assert!(matches!(bounds.validate(), Err(ConfigError::InvalidBounds(_))));
    }

    #[test]
    fn test_mask_iteration() {
        let mut mask = SectorMask::empty(3, 2);
        mask.set(2, 0);
        mask.set(1, 1);
        assert_eq!(mask.count(), 2);
        assert!(mask.is_valid(2, 0));
        assert!(!mask.is_valid(0, 0));
        assert!(!mask.is_valid(5, 5));
        assert_eq!(mask.iter_valid().collect::<Vec<_>>(), vec![(2, 0), (1, 1)]);
    }
}
