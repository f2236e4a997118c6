//! In-process terrain: a synthetic height field and the picker that probes it.

use std::sync::Arc;

use anyhow::{bail, Result};
use glam::DVec3;
use rayon::prelude::*;
use tracing::debug;

use crate::config::TerrainConfig;
use crate::geodesy::{Cartographic, Ellipsoid};
use crate::hash::value_noise;
use crate::map::GlobeViewport;
use crate::picking::{HeightSampling, PickingAdapter, Ray, RayHit, ScreenPoint};

const MIN_MARCH_STEP_M: f64 = 5.0;
const MAX_MARCH_STEP_M: f64 = 250.0;
/// Rays start this far from their origin so a surface-bound observer does not hit itself.
const RAY_START_OFFSET_M: f64 = 1.0;
const BISECTION_EPSILON_M: f64 = 0.05;

/// Terrain height above the ellipsoid, metres, for a longitude/latitude in degrees.
pub trait HeightField: Send + Sync {
    fn height(&self, lon: f64, lat: f64) -> f64;
}

impl<F> HeightField for F
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn height(&self, lon: f64, lat: f64) -> f64 {
        self(lon, lat)
    }
}

/// Three octaves of value noise scaled to `[0, relief_m]`.
#[derive(Clone, Debug)]
pub struct SyntheticTerrain {
    seed: u64,
    relief_m: f64,
    feature_size_deg: f64,
}

impl SyntheticTerrain {
    pub fn new(config: &TerrainConfig) -> Self {
        Self {
            seed: config.seed,
            relief_m: config.relief_m.max(0.0),
            feature_size_deg: config.feature_size_deg.max(1.0e-6),
        }
    }
}

impl HeightField for SyntheticTerrain {
    fn height(&self, lon: f64, lat: f64) -> f64 {
        let (x, y) = (lon / self.feature_size_deg, lat / self.feature_size_deg);
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut total = 0.0;
        for octave in 0..3u64 {
            sum += value_noise(x * frequency, y * frequency, self.seed.wrapping_add(octave)) * amplitude;
            total += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        sum / total * self.relief_m
    }
}

/// [`PickingAdapter`] over a [`HeightField`] viewed through a [`GlobeViewport`].
pub struct TerrainPicker<H: HeightField + 'static> {
    terrain: Arc<H>,
    ellipsoid: Ellipsoid,
    viewport: GlobeViewport,
    max_ray_distance_m: f64,
}

impl<H: HeightField + 'static> TerrainPicker<H> {
    pub fn new(terrain: H, viewport: GlobeViewport, max_ray_distance_m: f64) -> Self {
        Self {
            terrain: Arc::new(terrain),
            ellipsoid: Ellipsoid::WGS84,
            viewport,
            max_ray_distance_m,
        }
    }

    /// Keep picking in sync with what is on screen.
    pub fn set_viewport(&mut self, viewport: &GlobeViewport) {
        self.viewport = viewport.clone();
    }

    pub fn terrain(&self) -> &H {
        &self.terrain
    }

    /// Signed height of `p` above the terrain below it.
    fn clearance(&self, p: DVec3) -> Result<f64> {
        let Some(c) = self.ellipsoid.cartesian_to_cartographic(p) else {
            bail!("ray passed too close to the earth's centre");
        };
        Ok(c.height - self.terrain.height(c.lon_degrees(), c.lat_degrees()))
    }

    /// Narrow a surface crossing in `(near, far]` down to the bisection tolerance.
    fn refine(&self, ray: &Ray, mut near: f64, mut far: f64) -> Result<f64> {
        while far - near > BISECTION_EPSILON_M {
            let mid = 0.5 * (near + far);
            if self.clearance(ray.point_at(mid))? > 0.0 {
                near = mid;
            } else {
                far = mid;
            }
        }
        Ok(far)
    }
}

impl<H: HeightField + 'static> PickingAdapter for TerrainPicker<H> {
    fn pick_surface_position(&self, screen: ScreenPoint) -> Option<DVec3> {
        let (lon, lat) = self.viewport.unproject(screen.x, screen.y)?;
        let height = self.terrain.height(lon, lat);
        let position = Cartographic::from_degrees(lon, lat, height);
        Some(self.ellipsoid.cartographic_to_cartesian(&position))
    }

    fn cast_ray(&self, ray: &Ray) -> Result<Option<RayHit>> {
        let mut t = RAY_START_OFFSET_M;
        let mut clearance = self.clearance(ray.point_at(t))?;
        if clearance <= 0.0 {
            return Ok(Some(RayHit { distance: t, point: ray.point_at(t) }));
        }

        while t < self.max_ray_distance_m {
            let step = (clearance * 0.5).clamp(MIN_MARCH_STEP_M, MAX_MARCH_STEP_M);
            let next = (t + step).min(self.max_ray_distance_m);
            let next_clearance = self.clearance(ray.point_at(next))?;
            if next_clearance <= 0.0 {
                let distance = self.refine(ray, t, next)?;
                debug!(distance, "ray hit terrain");
                return Ok(Some(RayHit { distance, point: ray.point_at(distance) }));
            }
            t = next;
            clearance = next_clearance;
        }
        Ok(None)
    }

    fn sample_terrain_heights(&self, points: Vec<Cartographic>) -> HeightSampling {
        let (tx, sampling) = HeightSampling::channel();
        let terrain = Arc::clone(&self.terrain);
        rayon::spawn(move || {
            let heights: Vec<f64> = points
                .par_iter()
                .map(|p| terrain.height(p.lon_degrees(), p.lat_degrees()))
                .collect();
            // The receiver is gone when the request was superseded
            let _ = tx.send(Ok(heights));
        });
        sampling
    }

    fn surface_height(&self, point: &Cartographic) -> Option<f64> {
        Some(self.terrain.height(point.lon_degrees(), point.lat_degrees()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn viewport() -> GlobeViewport {
        GlobeViewport::new(10.0, 45.0, 50.0, 200, 200)
    }

    fn surface(lon: f64, lat: f64, h: f64) -> DVec3 {
        Ellipsoid::WGS84.cartographic_to_cartesian(&Cartographic::from_degrees(lon, lat, h))
    }

    #[test]
    fn test_pick_centre_of_screen() {
        let picker = TerrainPicker::new(|_: f64, _: f64| 250.0, viewport(), 100_000.0);
        let p = picker.pick_surface_position(ScreenPoint::new(100, 100)).unwrap();
        let c = Ellipsoid::WGS84.cartesian_to_cartographic(p).unwrap();
        assert!((c.lon_degrees() - 10.0).abs() < 0.5);
        assert!((c.lat_degrees() - 45.0).abs() < 0.5);
        assert!((c.height - 250.0).abs() < 1e-3);
        assert!(picker.pick_surface_position(ScreenPoint::new(0, 0)).is_none());
    }

    #[test]
    fn test_ray_over_flat_ground_is_clear() {
        let picker = TerrainPicker::new(|_: f64, _: f64| 0.0, viewport(), 20_000.0);
        let from = surface(10.0, 45.0, 50.0);
        let to = surface(10.02, 45.0, 50.0);
        let ray = Ray::between(from, to).unwrap();
        let hit = picker.cast_ray(&ray).unwrap();
        // The straight ray climbs away from the curved surface
        assert!(hit.is_none());
    }

    #[test]
    fn test_ray_hits_ridge() {
        // 300 m wall at longitude 10.01..10.012
        let ridge = |lon: f64, _lat: f64| if (10.01..10.012).contains(&lon) { 300.0 } else { 0.0 };
        let picker = TerrainPicker::new(ridge, viewport(), 20_000.0);
        let from = surface(10.0, 45.0, 20.0);
        let to = surface(10.02, 45.0, 20.0);
        let ray = Ray::between(from, to).unwrap();
        let hit = picker.cast_ray(&ray).unwrap().unwrap();
        let total = from.distance(to);
        assert!(hit.distance > 0.4 * total && hit.distance < 0.6 * total);
        let wall = Ellipsoid::WGS84.cartesian_to_cartographic(hit.point).unwrap();
        assert!((wall.lon_degrees() - 10.01).abs() < 1e-3);
    }

    #[test]
    fn test_heights_arrive_in_order() {
        let picker = TerrainPicker::new(|lon: f64, lat: f64| lon * 10.0 + lat, viewport(), 1000.0);
        let points: Vec<Cartographic> =
            (0..50).map(|i| Cartographic::from_degrees(i as f64 * 0.1, 1.0, 0.0)).collect();
        let sampling = picker.sample_terrain_heights(points);

        let deadline = Instant::now() + Duration::from_secs(5);
        let heights = loop {
            if let Some(result) = sampling.try_take() {
                break result.unwrap();
            }
            assert!(Instant::now() < deadline, "height sampling timed out");
            std::thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(heights.len(), 50);
        for (i, h) in heights.iter().enumerate() {
            assert!((h - (i as f64 + 1.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_synthetic_terrain_within_relief() {
        let terrain = SyntheticTerrain::new(&TerrainConfig::default());
        for i in 0..100 {
            let h = terrain.height(10.0 + i as f64 * 0.003, 45.0 - i as f64 * 0.002);
            assert!((0.0..=1200.0).contains(&h));
        }
    }
}
