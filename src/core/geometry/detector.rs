use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::{point_angles, AngularBounds, CameraIntrinsics, DepthFrame, SectorDetection, SectorMask};
use crate::error::ConfigError;

/// Extracts the closest valid point of one sector from a depth frame
pub trait SectorDetector: Send + Sync {
    fn detect(&self, frame: &DepthFrame) -> Option<SectorDetection>;

    /// Which pixels counted as valid, for overlay drawing
    fn valid_mask(&self, frame: &DepthFrame) -> SectorMask;

    fn is_valid_pixel(&self, frame: &DepthFrame, x: u32, y: u32) -> bool;
}

// Running min / count / azimuth sum over the valid pixels of one pass
#[derive(Default)]
struct Accumulator {
    min_distance: f32,
    count: usize,
    azimuth_sum: f64,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            min_distance: f32::INFINITY,
            ..Default::default()
        }
    }

    fn push(&mut self, depth_m: f32, azimuth_deg: f32) {
        self.min_distance = self.min_distance.min(depth_m);
        self.count += 1;
        self.azimuth_sum += azimuth_deg as f64;
    }

    fn finish(self) -> Option<SectorDetection> {
        if self.count == 0 {
            return None;
        }
        Some(SectorDetection {
            min_distance_m: self.min_distance,
            num_valid_points: self.count,
            azimuth_deg: (self.azimuth_sum / self.count as f64) as f32,
        })
    }
}

/// Sector defined by an azimuth/elevation window and a range band
///
/// For any pixel with positive depth, `atan2(x, z)` reduces to
/// `atan((px - ppx) / fx)`, so ray angles depend only on the pixel position.
/// They are tabulated once per stream and the angular window collapses to a
/// contiguous block of columns and rows.
#[derive(Debug, Clone)]
pub struct AngularSectorDetector {
    bounds: AngularBounds,
    intrinsics: CameraIntrinsics,
    column_azimuths: Vec<f32>,
    columns: Range<usize>,
    rows: Range<usize>,
}

impl AngularSectorDetector {
    pub fn new(bounds: AngularBounds, intrinsics: CameraIntrinsics) -> Result<Self, ConfigError> {
        intrinsics.validate()?;
        bounds.validate()?;

        let column_azimuths: Vec<f32> = (0..intrinsics.width)
            .map(|px| ray_angle(px as f32, intrinsics.ppx, intrinsics.fx))
            .collect();
        let row_elevations: Vec<f32> = (0..intrinsics.height)
            .map(|py| ray_angle(py as f32, intrinsics.ppy, intrinsics.fy))
            .collect();

        let columns = window_span(&column_azimuths, |az| bounds.contains_azimuth(az));
        let rows = window_span(&row_elevations, |el| bounds.contains_elevation(el));

        Ok(Self {
            bounds,
            intrinsics,
            column_azimuths,
            columns,
            rows,
        })
    }

    pub fn bounds(&self) -> &AngularBounds {
        &self.bounds
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Number of pixels inside the angular window, ignoring depth
    pub fn window_pixels(&self) -> usize {
        self.columns.len() * self.rows.len()
    }

    fn matches_frame(&self, frame: &DepthFrame) -> bool {
        frame.width() == self.intrinsics.width && frame.height() == self.intrinsics.height
    }

    fn scan(&self, frame: &DepthFrame, mut visit: impl FnMut(usize, usize, f32)) {
        if !self.matches_frame(frame) {
            return;
        }
        let scale = frame.depth_scale();
        for y in self.rows.clone() {
            let Some(row) = frame.row(y) else {
                continue;
            };
            for x in self.columns.clone() {
                let raw = row[x];
                if raw == 0 {
                    continue;
                }
                let depth_m = raw as f32 * scale;
                if self.bounds.contains_range(depth_m) {
                    visit(x, y, depth_m);
                }
            }
        }
    }
}

impl SectorDetector for AngularSectorDetector {
    fn detect(&self, frame: &DepthFrame) -> Option<SectorDetection> {
        let mut acc = Accumulator::new();
        self.scan(frame, |x, _, depth_m| acc.push(depth_m, self.column_azimuths[x]));
        acc.finish()
    }

    fn valid_mask(&self, frame: &DepthFrame) -> SectorMask {
        let mut mask = SectorMask::empty(frame.width(), frame.height());
        self.scan(frame, |x, y, _| mask.set(x, y));
        mask
    }

    fn is_valid_pixel(&self, frame: &DepthFrame, x: u32, y: u32) -> bool {
        if !self.matches_frame(frame) {
            return false;
        }
        if !self.columns.contains(&(x as usize)) || !self.rows.contains(&(y as usize)) {
            return false;
        }
        match frame.raw(x, y) {
            Some(0) | None => false,
            Some(raw) => self.bounds.contains_range(raw as f32 * frame.depth_scale()),
        }
    }
}

/// Axis-aligned camera-space box (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxBounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoxBounds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for axis in 0..3 {
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(ConfigError::InvalidBounds(format!(
                    "box axis {} has min {} above max {}",
                    axis, lo, hi
                )));
            }
        }
        if self.max[2] <= 0.0 {
            return Err(ConfigError::InvalidBounds(
                "box lies entirely behind the camera".to_string(),
            ));
        }
        Ok(())
    }

    pub fn contains(&self, point: [f32; 3]) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }
}

/// Sector defined by a box in camera space instead of angles
#[derive(Debug, Clone)]
pub struct BoxSectorDetector {
    bounds: BoxBounds,
    intrinsics: CameraIntrinsics,
}

impl BoxSectorDetector {
    pub fn new(bounds: BoxBounds, intrinsics: CameraIntrinsics) -> Result<Self, ConfigError> {
        intrinsics.validate()?;
        bounds.validate()?;
        Ok(Self { bounds, intrinsics })
    }

    pub fn bounds(&self) -> &BoxBounds {
        &self.bounds
    }

    fn scan(&self, frame: &DepthFrame, mut visit: impl FnMut(usize, usize, [f32; 3])) {
        let scale = frame.depth_scale();
        for y in 0..frame.height() as usize {
            let Some(row) = frame.row(y) else {
                continue;
            };
            for (x, &raw) in row.iter().enumerate() {
                if raw == 0 {
                    continue;
                }
                let point = self
                    .intrinsics
                    .deproject(x as f32, y as f32, raw as f32 * scale);
                if self.bounds.contains(point) {
                    visit(x, y, point);
                }
            }
        }
    }
}

impl SectorDetector for BoxSectorDetector {
    fn detect(&self, frame: &DepthFrame) -> Option<SectorDetection> {
        let mut acc = Accumulator::new();
        self.scan(frame, |_, _, point| acc.push(point[2], point_angles(point).0));
        acc.finish()
    }

    fn valid_mask(&self, frame: &DepthFrame) -> SectorMask {
        let mut mask = SectorMask::empty(frame.width(), frame.height());
        self.scan(frame, |x, y, _| mask.set(x, y));
        mask
    }

    fn is_valid_pixel(&self, frame: &DepthFrame, x: u32, y: u32) -> bool {
        frame
            .depth_m(x, y)
            .map(|d| self.bounds.contains(self.intrinsics.deproject(x as f32, y as f32, d)))
            .unwrap_or(false)
    }
}

// Angle (degrees) of the ray through pixel coordinate `p`
fn ray_angle(p: f32, principal: f32, focal: f32) -> f32 {
    ((p - principal) / focal).atan().to_degrees()
}

// Ray angles are monotonic in pixel position, so matches form one contiguous block
fn window_span(angles: &[f32], inside: impl Fn(f32) -> bool) -> Range<usize> {
    match (
        angles.iter().position(|&a| inside(a)),
        angles.iter().rposition(|&a| inside(a)),
    ) {
        (Some(start), Some(end)) => start..end + 1,
        _ => 0..0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(az_center: f32, az_span: f32, el_center: f32, el_span: f32) -> AngularBounds {
        AngularBounds {
            azimuth_center: az_center,
            azimuth_span: az_span,
            elevation_center: el_center,
            elevation_span: el_span,
            min_range: 0.5,
            max_range: 3.5,
        }
    }

    // Disc of constant depth centred on pixel (cx, cy)
    fn disc_frame(k: &CameraIntrinsics, cx: f32, cy: f32, radius: f32, raw: u16) -> DepthFrame {
        let mut frame = DepthFrame::filled(k.width, k.height, 0, 0.001).unwrap();
        let w = k.width as usize;
        for (i, sample) in frame.data_mut().iter_mut().enumerate() {
            let (x, y) = ((i % w) as f32, (i / w) as f32);
            if (x - cx).powi(2) + (y - cy).powi(2) < radius * radius {
                *sample = raw;
            }
        }
        frame
    }

    #[test]
    fn test_centred_disc_is_detected() {
        let k = CameraIntrinsics::default();
        let frame = disc_frame(&k, 320.0, 240.0, 100.0, 1000);
        let detector = AngularSectorDetector::new(bounds(0.0, 20.0, 0.0, 10.0), k).unwrap();

        let detection = detector.detect(&frame).expect("disc should be detected");
        assert!(detection.min_distance_m >= 0.95 && detection.min_distance_m <= 1.05);
        assert!(detection.azimuth_deg.abs() <= 10.0);
        assert!(detection.azimuth_deg.abs() < 1.0);
        assert!(detection.num_valid_points > 0);
    }

    #[test]
    fn test_off_centre_disc_matches_its_sector_only() {
        let k = CameraIntrinsics::default();
        let col = k.column_for_azimuth(-20.0);
        let frame = disc_frame(&k, col, k.ppy, 20.0, 1500);

        let left = AngularSectorDetector::new(bounds(-20.0, 10.0, 0.0, 20.0), k).unwrap();
        let centre = AngularSectorDetector::new(bounds(0.0, 10.0, 0.0, 20.0), k).unwrap();

        let detection = left.detect(&frame).unwrap();
        assert!(detection.azimuth_deg >= -25.0 && detection.azimuth_deg <= -15.0);
        assert!((detection.min_distance_m - 1.5).abs() < 1e-3);
        assert!(centre.detect(&frame).is_none());
    }

    #[test]
    fn test_zero_depth_never_valid() {
        let k = CameraIntrinsics::default();
        let frame = DepthFrame::filled(k.width, k.height, 0, 0.001).unwrap();
        let mut wide = bounds(0.0, 170.0, 0.0, 170.0);
        wide.min_range = 0.0;
        let detector = AngularSectorDetector::new(wide, k).unwrap();

        assert!(detector.detect(&frame).is_none());
        assert_eq!(detector.valid_mask(&frame).count(), 0);
        assert!(!detector.is_valid_pixel(&frame, 320, 240));
    }

    #[test]
    fn test_range_band_applies_to_whole_window() {
        let k = CameraIntrinsics::default();
        // 0.4 m sits below min_range
        let frame = DepthFrame::filled(k.width, k.height, 400, 0.001).unwrap();
        let detector = AngularSectorDetector::new(bounds(0.0, 20.0, 0.0, 20.0), k).unwrap();
        assert!(detector.detect(&frame).is_none());

        let frame = DepthFrame::filled(k.width, k.height, 600, 0.001).unwrap();
        let detection = detector.detect(&frame).unwrap();
        assert_eq!(detection.num_valid_points, detector.window_pixels());
    }

    #[test]
    fn test_closest_point_wins() {
        let k = CameraIntrinsics::default();
        let mut frame = disc_frame(&k, 320.0, 240.0, 50.0, 2000);
        let idx = 240 * k.width as usize + 330;
        frame.data_mut()[idx] = 900;
        let detector = AngularSectorDetector::new(bounds(0.0, 20.0, 0.0, 20.0), k).unwrap();
        let detection = detector.detect(&frame).unwrap();
        assert!((detection.min_distance_m - 0.9).abs() < 1e-4);
    }

    #[test]
    fn test_elevation_center_is_honoured() {
        let k = CameraIntrinsics::default();
        let row = k.row_for_elevation(-15.0);
        let frame = disc_frame(&k, k.ppx, row, 15.0, 1200);

        let raised = AngularSectorDetector::new(bounds(0.0, 20.0, -15.0, 10.0), k).unwrap();
        let level = AngularSectorDetector::new(bounds(0.0, 20.0, 0.0, 10.0), k).unwrap();
        assert!(raised.detect(&frame).is_some());
        assert!(level.detect(&frame).is_none());
    }

    #[test]
    fn test_mask_agrees_with_detection() {
        let k = CameraIntrinsics::default();
        let frame = disc_frame(&k, 320.0, 240.0, 30.0, 1000);
        let detector = AngularSectorDetector::new(bounds(0.0, 20.0, 0.0, 20.0), k).unwrap();
        let mask = detector.valid_mask(&frame);
        let detection = detector.detect(&frame).unwrap();
        assert_eq!(mask.count(), detection.num_valid_points);
        for (x, y) in mask.iter_valid() {
            assert!(detector.is_valid_pixel(&frame, x, y));
        }
        assert!(!detector.is_valid_pixel(&frame, 0, 0));
    }

    #[test]
    fn test_mismatched_frame_yields_nothing() {
        let k = CameraIntrinsics::default();
        let frame = DepthFrame::filled(320, 240, 1000, 0.001).unwrap();
        let detector = AngularSectorDetector::new(bounds(0.0, 20.0, 0.0, 20.0), k).unwrap();
        assert!(detector.detect(&frame).is_none());
    }

    #[test]
    fn test_bad_intrinsics_fail_at_construction() {
        let k = CameraIntrinsics {
            fy: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            AngularSectorDetector::new(bounds(0.0, 20.0, 0.0, 20.0), k),
            Err(ConfigError::InvalidIntrinsics { .. })
        ));
    }

    #[test]
    fn test_box_detector() {
        let k = CameraIntrinsics::default();
        let frame = disc_frame(&k, 320.0, 240.0, 40.0, 1000);
        let inside = BoxSectorDetector::new(
            BoxBounds {
                min: [-0.2, -0.2, 0.5],
                max: [0.2, 0.2, 1.5],
            },
            k,
        )
        .unwrap();
        let beside = BoxSectorDetector::new(
            BoxBounds {
                min: [0.5, -0.2, 0.5],
                max: [1.0, 0.2, 1.5],
            },
            k,
        )
        .unwrap();

        let detection = inside.detect(&frame).unwrap();
        assert!((detection.min_distance_m - 1.0).abs() < 1e-4);
        assert!(detection.azimuth_deg.abs() < 1.0);
        assert!(beside.detect(&frame).is_none());
        assert_eq!(inside.valid_mask(&frame).count(), detection.num_valid_points);
    }

    #[test]
    fn test_box_validation() {
        let inverted = BoxBounds {
            min: [0.0, 0.0, 2.0],
            max: [1.0, 1.0, 1.0],
        };
        assert!(inverted.validate().is_err());
    }
}
