//! Contract between the measurement tools and whatever renders the globe.
//!
//! The engine never talks to a renderer directly: it asks a [`PickingAdapter`]
//! to resolve screen input into world positions and to probe the terrain.

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use glam::DVec3;

use crate::geodesy::Cartographic;

/// Position of an input event on the rendering surface, in surface pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Half-line in world space. `direction` is expected to be normalized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    /// Ray from `from` through `to`. `None` if the points coincide.
    pub fn between(from: DVec3, to: DVec3) -> Option<Self> {
        let direction = (to - from).try_normalize()?;
        Some(Self { origin: from, direction })
    }

    #[inline]
    pub fn point_at(&self, distance: f64) -> DVec3 {
        self.origin + self.direction * distance
    }
}

/// Nearest terrain intersection along a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub distance: f64,
    pub point: DVec3,
}

/// Completion side of a [`HeightSampling`].
pub type HeightSender = Sender<Result<Vec<f64>>>;

/// In-flight batch terrain height lookup.
///
/// The adapter answers on the paired [`HeightSender`] whenever the heights are
/// ready; the engine checks with [`HeightSampling::try_take`] without blocking.
pub struct HeightSampling {
    rx: Receiver<Result<Vec<f64>>>,
}

impl HeightSampling {
    /// A sampling that the adapter completes later through the returned sender.
    pub fn channel() -> (HeightSender, Self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (tx, Self { rx })
    }

    /// A sampling that is already resolved.
    pub fn ready(result: Result<Vec<f64>>) -> Self {
        let (tx, sampling) = Self::channel();
        // Bounded(1) with a live receiver cannot be full or disconnected here
        let _ = tx.send(result);
        sampling
    }

    /// `None` while the lookup is still running.
    pub fn try_take(&self) -> Option<Result<Vec<f64>>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(anyhow!("terrain sampler dropped the request")))
            }
        }
    }
}

/// Point picking and terrain queries offered by the 3D scene.
pub trait PickingAdapter {
    /// Whether the scene can turn screen positions into world positions at all.
    fn supports_picking(&self) -> bool {
        true
    }

    /// World position under a screen point, if anything pickable is there.
    fn pick_surface_position(&self, screen: ScreenPoint) -> Option<DVec3>;

    /// Nearest intersection of `ray` with the terrain, `None` when unobstructed.
    fn cast_ray(&self, ray: &Ray) -> Result<Option<RayHit>>;

    /// Batch height lookup, one height per point in input order.
    fn sample_terrain_heights(&self, points: Vec<Cartographic>) -> HeightSampling;

    /// Best-effort synchronous terrain height at a point.
    fn surface_height(&self, point: &Cartographic) -> Option<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_between() {
        let ray = Ray::between(DVec3::ZERO, DVec3::new(0.0, 10.0, 0.0)).unwrap();
        assert_eq!(ray.point_at(5.0), DVec3::new(0.0, 5.0, 0.0));
        assert!(Ray::between(DVec3::ONE, DVec3::ONE).is_none());
    }

    #[test]
    fn test_height_sampling_pending_then_ready() {
        let (tx, sampling) = HeightSampling::channel();
        assert!(sampling.try_take().is_none());
        tx.send(Ok(vec![1.0, 2.0])).unwrap();
        assert_eq!(sampling.try_take().unwrap().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_height_sampling_dropped_sender_is_error() {
        let (tx, sampling) = HeightSampling::channel();
        drop(tx);
        assert!(sampling.try_take().unwrap().is_err());
    }

    #[test]
    fn test_ready_sampling() {
        let sampling = HeightSampling::ready(Ok(vec![3.0]));
        assert_eq!(sampling.try_take().unwrap().unwrap(), vec![3.0]);
    }
}
