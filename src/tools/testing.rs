//! Scripted collaborators for the tool tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use anyhow::{anyhow, Result};
use glam::DVec3;

use super::MeasurementToolEngine;
use crate::config::ToolConfig;
use crate::geodesy::{Cartographic, Ellipsoid};
use crate::picking::{HeightSampling, HeightSender, PickingAdapter, Ray, RayHit, ScreenPoint};
pub use crate::scene::MarkerSink;
use crate::scene::{MarkerHandle, MarkerStore, Visual};

/// World position of a point on the WGS84 surface.
pub fn surface(lon: f64, lat: f64, height: f64) -> DVec3 {
    Ellipsoid::WGS84.cartographic_to_cartesian(&Cartographic::from_degrees(lon, lat, height))
}

pub enum RayScript {
    Clear,
    /// Terrain is hit this many metres along every ray
    HitAt(f64),
    Fail,
}

pub enum HeightScript {
    /// Answer right away with `f(lon, lat)`
    Immediate(fn(f64, f64) -> f64),
    /// Hold requests until the test completes them
    Deferred,
    Fail,
}

/// Picking adapter whose answers are fixed up front.
pub struct ScriptedPicker {
    pub supports: bool,
    pub picks: HashMap<(i32, i32), DVec3>,
    pub ray: RayScript,
    pub heights: HeightScript,
    pub surface: fn(f64, f64) -> Option<f64>,
    pub rays_cast: Cell<usize>,
    pub deferred: RefCell<Vec<(Vec<Cartographic>, HeightSender)>>,
}

impl ScriptedPicker {
    pub fn new() -> Self {
        Self {
            supports: true,
            picks: HashMap::new(),
            ray: RayScript::Clear,
            heights: HeightScript::Immediate(|_, _| 0.0),
            surface: |_, _| Some(0.0),
            rays_cast: Cell::new(0),
            deferred: RefCell::new(Vec::new()),
        }
    }

    /// Screen `(i, 0)` picks the ground at longitude `10 + 0.01 * i`, latitude 45.
    pub fn grid() -> Self {
        let mut picker = Self::new();
        for i in 0..10 {
            picker.picks.insert((i, 0), surface(10.0 + 0.01 * i as f64, 45.0, 0.0));
        }
        picker
    }

    pub fn with_pick(mut self, x: i32, position: DVec3) -> Self {
        self.picks.insert((x, 0), position);
        self
    }

    /// Resolve the oldest deferred height request with `f(lon, lat)`.
    pub fn complete_next(&self, f: fn(f64, f64) -> f64) -> bool {
        let mut deferred = self.deferred.borrow_mut();
        if deferred.is_empty() {
            return false;
        }
        let (points, tx) = deferred.remove(0);
        let heights = points.iter().map(|p| f(p.lon_degrees(), p.lat_degrees())).collect();
        tx.send(Ok(heights)).is_ok()
    }
}

impl PickingAdapter for ScriptedPicker {
    fn supports_picking(&self) -> bool {
        self.supports
    }

    fn pick_surface_position(&self, screen: ScreenPoint) -> Option<DVec3> {
        self.picks.get(&(screen.x, screen.y)).copied()
    }

    fn cast_ray(&self, ray: &Ray) -> Result<Option<RayHit>> {
        self.rays_cast.set(self.rays_cast.get() + 1);
        match self.ray {
            RayScript::Clear => Ok(None),
            RayScript::HitAt(distance) => Ok(Some(RayHit { distance, point: ray.point_at(distance) })),
            RayScript::Fail => Err(anyhow!("globe is not ready")),
        }
    }

    fn sample_terrain_heights(&self, points: Vec<Cartographic>) -> HeightSampling {
        match self.heights {
            HeightScript::Immediate(f) => {
                HeightSampling::ready(Ok(points.iter().map(|p| f(p.lon_degrees(), p.lat_degrees())).collect()))
            }
            HeightScript::Deferred => {
                let (tx, sampling) = HeightSampling::channel();
                self.deferred.borrow_mut().push((points, tx));
                sampling
            }
            HeightScript::Fail => HeightSampling::ready(Err(anyhow!("terrain provider offline"))),
        }
    }

    fn surface_height(&self, point: &Cartographic) -> Option<f64> {
        (self.surface)(point.lon_degrees(), point.lat_degrees())
    }
}

/// Marker store that also counts removals of handles it no longer holds.
#[derive(Default)]
pub struct RecordingSink {
    pub store: MarkerStore,
    pub added: usize,
    pub double_removals: usize,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<&str> {
        self.store.texts()
    }

    pub fn visuals(&self) -> Vec<&Visual> {
        self.store.iter().map(|(_, v)| v).collect()
    }

    pub fn get(&self, handle: MarkerHandle) -> Option<&Visual> {
        self.store.get(handle)
    }
}

impl MarkerSink for RecordingSink {
    fn add(&mut self, visual: Visual) -> MarkerHandle {
        self.added += 1;
        self.store.add(visual)
    }

    fn update(&mut self, handle: MarkerHandle, visual: Visual) -> bool {
        self.store.update(handle, visual)
    }

    fn remove(&mut self, handle: MarkerHandle) -> bool {
        let removed = self.store.remove(handle);
        if !removed {
            self.double_removals += 1;
        }
        removed
    }

    fn len(&self) -> usize {
        self.store.len()
    }
}

pub type TestEngine = MeasurementToolEngine<ScriptedPicker, RecordingSink>;

pub fn engine(picker: ScriptedPicker) -> TestEngine {
    MeasurementToolEngine::new(picker, RecordingSink::default(), ToolConfig::default())
}

pub fn engine_with(picker: ScriptedPicker, config: ToolConfig) -> TestEngine {
    MeasurementToolEngine::new(picker, RecordingSink::default(), config)
}
