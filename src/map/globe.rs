use glam::DVec3;
use std::f64::consts::TAU;

use crate::geodesy::{Ellipsoid, GeoExtent};

/// Smallest and largest sphere radius, as multiples of the canvas width.
const MIN_RADIUS_FACTOR: f64 = 0.35;
const MAX_RADIUS_FACTOR: f64 = 2000.0;
const ZOOM_STEP: f64 = 1.5;
/// Samples per canvas edge when tracing the visible outline.
const BOUNDS_SAMPLES: usize = 32;

/// Orthographic view of a unit sphere scaled to `radius` braille pixels.
///
/// Orientation is an orthonormal frame: `forward` points from the globe centre
/// at the camera, `right` east and `up` north on screen.
#[derive(Clone, Debug)]
pub struct GlobeViewport {
    forward: DVec3,
    right: DVec3,
    up: DVec3,
    /// Sphere radius in braille pixels
    pub radius: f64,
    /// Canvas size in braille pixels
    pub width: usize,
    pub height: usize,
}

impl GlobeViewport {
    pub fn new(center_lon: f64, center_lat: f64, radius: f64, width: usize, height: usize) -> Self {
        let (forward, right, up) = frame_at(center_lon, center_lat);
        Self { forward, right, up, radius, width, height }
    }

    /// Whole-earth view fitted to the canvas.
    pub fn world(center_lon: f64, center_lat: f64, width: usize, height: usize) -> Self {
        let radius = (width.min(height * 2) as f64 * MIN_RADIUS_FACTOR).max(1.0);
        Self::new(center_lon, center_lat, radius, width, height)
    }

    /// Re-centre on a point without changing the zoom.
    pub fn fly_to(&mut self, lon: f64, lat: f64) {
        let (forward, right, up) = frame_at(lon, lat);
        self.forward = forward;
        self.right = right;
        self.up = up;
    }

    fn center_lonlat(&self) -> (f64, f64) {
        vec3_to_lonlat(self.forward)
    }

    pub fn center_lon(&self) -> f64 {
        self.center_lonlat().0
    }

    pub fn center_lat(&self) -> f64 {
        self.center_lonlat().1
    }

    /// Screen pixel of a longitude/latitude. `None` on the far hemisphere.
    pub fn project(&self, lon: f64, lat: f64) -> Option<(i32, i32)> {
        let p = lonlat_to_vec3(lon, lat);
        if p.dot(self.forward) < 0.0 {
            return None;
        }
        let px = self.width as f64 / 2.0 + p.dot(self.right) * self.radius;
        let py = self.height as f64 / 2.0 - p.dot(self.up) * self.radius;
        Some((px as i32, py as i32))
    }

    /// Longitude/latitude under a screen pixel. `None` off the disc.
    pub fn unproject(&self, px: i32, py: i32) -> Option<(f64, f64)> {
        let (sx, sy) = self.to_disc(px, py);
        self.disc_to_sphere(sx, sy).map(vec3_to_lonlat)
    }

    /// Pixel offset from the canvas centre in sphere units, y up.
    fn to_disc(&self, px: i32, py: i32) -> (f64, f64) {
        (
            (px as f64 - self.width as f64 / 2.0) / self.radius,
            -(py as f64 - self.height as f64 / 2.0) / self.radius,
        )
    }

    /// Turn the globe so the surface follows a drag of `(dx, dy)` pixels.
    pub fn rotate_drag(&mut self, dx: i32, dy: i32) {
        self.turn_east(-(dx as f64) / self.radius);
        self.turn_north(dy as f64 / self.radius);
    }

    fn turn_east(&mut self, angle: f64) {
        if angle.abs() <= 1e-10 {
            return;
        }
        let (sin_a, cos_a) = angle.sin_cos();
        let forward = self.forward * cos_a + self.right * sin_a;
        self.right = (self.right * cos_a - self.forward * sin_a).normalize();
        self.forward = forward.normalize();
    }

    fn turn_north(&mut self, angle: f64) {
        if angle.abs() <= 1e-10 {
            return;
        }
        let (sin_a, cos_a) = angle.sin_cos();
        let forward = self.forward * cos_a + self.up * sin_a;
        self.up = (self.up * cos_a - self.forward * sin_a).normalize();
        self.forward = forward.normalize();
    }

    fn radius_bounds(&self) -> (f64, f64) {
        let w = self.width.max(1) as f64;
        (w * MIN_RADIUS_FACTOR, w * MAX_RADIUS_FACTOR)
    }

    pub fn zoom_in(&mut self) {
        let (min, max) = self.radius_bounds();
        self.radius = (self.radius * ZOOM_STEP).clamp(min, max);
    }

    pub fn zoom_out(&mut self) {
        let (min, max) = self.radius_bounds();
        self.radius = (self.radius / ZOOM_STEP).clamp(min, max);
    }

    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, ZOOM_STEP);
    }

    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, ZOOM_STEP.recip());
    }

    /// Scale the radius while keeping the point under the cursor in place.
    fn zoom_at(&mut self, px: i32, py: i32, factor: f64) {
        let target = self.unproject(px, py);
        let (min, max) = self.radius_bounds();
        self.radius = (self.radius * factor).clamp(min, max);

        if let Some((lon, lat)) = target {
            let p = lonlat_to_vec3(lon, lat);
            let (want_x, want_y) = self.to_disc(px, py);
            self.turn_east(turn_towards(p.dot(self.right), p.dot(self.forward), want_x));
            self.turn_north(turn_towards(p.dot(self.up), p.dot(self.forward), want_y));
        }
    }

    /// Conservative bounding box of the part of the globe on the canvas.
    ///
    /// Traces the outline of the canvas rectangle clipped to the disc: the
    /// canvas edges where they cross the globe and the limb where it is on
    /// screen. A pole on screen widens the box to every longitude.
    pub fn visible_bounds(&self) -> GeoExtent {
        let half_w = self.width as f64 / 2.0 / self.radius;
        let half_h = self.height as f64 / 2.0 / self.radius;
        let on_screen = |x: f64, y: f64| x.abs() <= half_w + 1e-12 && y.abs() <= half_h + 1e-12;

        let (clon, clat) = self.center_lonlat();
        let (mut west, mut east, mut south, mut north) = (clon, clon, clat, clat);
        let mut include = |p: DVec3| {
            let (lon, lat) = vec3_to_lonlat(p);
            west = west.min(lon);
            east = east.max(lon);
            south = south.min(lat);
            north = north.max(lat);
        };

        for i in 0..=BOUNDS_SAMPLES {
            let t = i as f64 / BOUNDS_SAMPLES as f64 * 2.0 - 1.0;
            for (x, y) in [(t * half_w, half_h), (t * half_w, -half_h), (half_w, t * half_h), (-half_w, t * half_h)] {
                if let Some(p) = self.disc_to_sphere(x, y) {
                    include(p);
                }
            }
        }
        for i in 0..BOUNDS_SAMPLES * 2 {
            let angle = i as f64 / (BOUNDS_SAMPLES * 2) as f64 * TAU;
            let (y, x) = angle.sin_cos();
            if on_screen(x, y) {
                include(self.right * x + self.up * y);
            }
        }

        let pole_on_screen =
            |pole: DVec3| pole.dot(self.forward) >= 0.0 && on_screen(pole.dot(self.right), pole.dot(self.up));
        if pole_on_screen(DVec3::Z) {
            north = 90.0;
        }
        if pole_on_screen(DVec3::NEG_Z) {
            south = -90.0;
        }
        if east - west > 180.0 || north >= 90.0 || south <= -90.0 {
            west = -180.0;
            east = 180.0;
        }

        GeoExtent {
            west: west.max(-180.0),
            south: south.max(-90.0),
            east: east.min(180.0),
            north: north.min(90.0),
        }
    }

    /// Front-hemisphere point at disc coordinates `(x, y)`. `None` off the disc.
    fn disc_to_sphere(&self, x: f64, y: f64) -> Option<DVec3> {
        let r2 = x * x + y * y;
        (r2 <= 1.0).then(|| self.right * x + self.up * y + self.forward * (1.0 - r2).sqrt())
    }

    /// Zoom relative to the whole-earth view.
    pub fn effective_zoom(&self) -> f64 {
        self.radius / (self.width.max(1) as f64 * MIN_RADIUS_FACTOR)
    }

    /// Ground metres covered by one braille pixel at the centre of the view.
    pub fn meters_per_pixel(&self) -> f64 {
        Ellipsoid::WGS84.radii.x / self.radius
    }

    pub fn set_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    /// Within the canvas, with a small margin for markers straddling the edge.
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10 && px < self.width as i32 + 10 && py >= -10 && py < self.height as i32 + 10
    }

    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        p1.0.max(p2.0) >= 0
            && p1.0.min(p2.0) < self.width as i32
            && p1.1.max(p2.1) >= 0
            && p1.1.min(p2.1) < self.height as i32
    }
}

/// Angle for `turn_east`/`turn_north` that moves a point with screen
/// coordinate `s` and depth `depth` to screen coordinate `want`.
fn turn_towards(s: f64, depth: f64, want: f64) -> f64 {
    let r = s.hypot(depth);
    if r < 1e-12 {
        return 0.0;
    }
    (want / r).clamp(-1.0, 1.0).acos() - depth.atan2(s)
}

/// Camera frame looking down at `(lon, lat)` with north up.
fn frame_at(lon: f64, lat: f64) -> (DVec3, DVec3, DVec3) {
    let (lon, lat) = (lon.to_radians(), lat.to_radians());
    let forward = DVec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin());
    let north = DVec3::new(-lat.sin() * lon.cos(), -lat.sin() * lon.sin(), lat.cos());
    let right = north.cross(forward).normalize();
    let up = forward.cross(right).normalize();
    (forward, right, up)
}

#[inline(always)]
fn lonlat_to_vec3(lon: f64, lat: f64) -> DVec3 {
    let (lon, lat) = (lon.to_radians(), lat.to_radians());
    DVec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

#[inline(always)]
fn vec3_to_lonlat(p: DVec3) -> (f64, f64) {
    (p.y.atan2(p.x).to_degrees(), p.z.clamp(-1.0, 1.0).asin().to_degrees())
}

/// Visit points along the great circle from `(lon0, lat0)` to `(lon1, lat1)`,
/// excluding the start, in ~2° steps.
#[inline]
pub fn walk_great_circle(lon0: f64, lat0: f64, lon1: f64, lat1: f64, mut visitor: impl FnMut(f64, f64)) {
    let a = lonlat_to_vec3(lon0, lat0);
    let b = lonlat_to_vec3(lon1, lat1);
    let angle = a.dot(b).clamp(-1.0, 1.0).acos();
    let steps = ((angle.to_degrees() / 2.0).ceil() as usize).max(1);
    let sin_angle = angle.sin();

    if steps == 1 || sin_angle.abs() < 1e-10 {
        visitor(lon1, lat1);
        return;
    }

    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        let p = a * (((1.0 - t) * angle).sin() / sin_angle) + b * ((t * angle).sin() / sin_angle);
        let (lon, lat) = vec3_to_lonlat(p);
        visitor(lon, lat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centre_round_trip() {
        let vp = GlobeViewport::new(10.0, 45.0, 100.0, 400, 300);
        let (x, y) = vp.project(10.0, 45.0).unwrap();
        assert!((x - 200).abs() <= 1 && (y - 150).abs() <= 1);
        let (lon, lat) = vp.unproject(200, 150).unwrap();
        assert!((lon - 10.0).abs() < 1e-9 && (lat - 45.0).abs() < 1e-9);
        assert!((vp.center_lon() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_far_side_and_off_disc() {
        let vp = GlobeViewport::new(0.0, 0.0, 100.0, 400, 300);
        assert!(vp.project(180.0, 0.0).is_none());
        assert!(vp.unproject(0, 0).is_none());
    }

    #[test]
    fn test_north_is_up_and_east_is_right() {
        let vp = GlobeViewport::new(0.0, 0.0, 100.0, 400, 300);
        let (_, y_north) = vp.project(0.0, 10.0).unwrap();
        let (x_east, _) = vp.project(10.0, 0.0).unwrap();
        assert!(y_north < 150);
        assert!(x_east > 200);
    }

    #[test]
    fn test_zoom_at_keeps_cursor_point() {
        let mut vp = GlobeViewport::new(0.0, 0.0, 200.0, 400, 400);
        let before = vp.unproject(260, 170).unwrap();
        vp.zoom_in_at(260, 170);
        let after = vp.unproject(260, 170).unwrap();
        assert!((before.0 - after.0).abs() < 1e-6);
        assert!((before.1 - after.1).abs() < 1e-6);
        assert!((vp.radius - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut vp = GlobeViewport::world(0.0, 0.0, 200, 100);
        for _ in 0..10 {
            vp.zoom_out();
        }
        assert!((vp.effective_zoom() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_drag_moves_surface_with_pointer() {
        let mut vp = GlobeViewport::new(0.0, 0.0, 500.0, 400, 400);
        let (x0, y0) = vp.project(0.0, 0.0).unwrap();
        vp.rotate_drag(40, 25);
        let (x1, y1) = vp.project(0.0, 0.0).unwrap();
        assert!((x1 - x0 - 40).abs() <= 1);
        assert!((y1 - y0 - 25).abs() <= 1);
        assert!(vp.center_lon() < 0.0 && vp.center_lat() > 0.0);
    }

    #[test]
    fn test_fly_to_keeps_radius() {
        let mut vp = GlobeViewport::new(0.0, 0.0, 500.0, 400, 400);
        vp.rotate_drag(30, -12);
        vp.fly_to(-70.5, -33.4);
        assert!((vp.center_lon() + 70.5).abs() < 1e-9);
        assert!((vp.center_lat() + 33.4).abs() < 1e-9);
        assert_eq!(vp.radius, 500.0);
    }

    #[test]
    fn test_visible_bounds_cover_centre() {
        let vp = GlobeViewport::new(10.0, 45.0, 100.0, 400, 300);
        let bounds = vp.visible_bounds();
        assert!(bounds.contains(10.0, 45.0));
        assert!(bounds.contains(10.0, 80.0));
    }

    #[test]
    fn test_visible_bounds_shrink_with_zoom() {
        let vp = GlobeViewport::new(11.5, 46.5, 40_000.0, 200, 200);
        let bounds = vp.visible_bounds();
        assert!(bounds.contains(11.5, 46.5));
        assert!(bounds.west > 11.0 && bounds.east < 12.0, "{bounds:?}");
        assert!(bounds.south > 46.0 && bounds.north < 47.0, "{bounds:?}");
    }

    #[test]
    fn test_visible_bounds_with_pole_on_screen() {
        let vp = GlobeViewport::new(0.0, 85.0, 2_000.0, 400, 400);
        let bounds = vp.visible_bounds();
        assert_eq!(bounds.north, 90.0);
        assert_eq!((bounds.west, bounds.east), (-180.0, 180.0));
        assert!(bounds.south > 70.0, "{bounds:?}");
    }

    #[test]
    fn test_great_circle_ends_at_target() {
        let mut points = Vec::new();
        walk_great_circle(0.0, 0.0, 90.0, 0.0, |lon, lat| points.push((lon, lat)));
        assert_eq!(points.len(), 45);
        let (lon, lat) = *points.last().unwrap();
        assert!((lon - 90.0).abs() < 1e-9 && lat.abs() < 1e-9);
    }
}
