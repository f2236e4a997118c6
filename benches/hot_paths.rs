use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use glam::DVec3;

use sar_map::config::{TerrainConfig, ToolConfig};
use sar_map::geodesy::{polygon_area, Cartographic, Ellipsoid};
use sar_map::map::GlobeViewport;
use sar_map::picking::{PickingAdapter, Ray, ScreenPoint};
use sar_map::scene::MarkerStore;
use sar_map::terrain::{SyntheticTerrain, TerrainPicker};
use sar_map::tools::{MeasurementToolEngine, ToolKind};

fn surface(lon: f64, lat: f64, height: f64) -> DVec3 {
    Ellipsoid::WGS84.cartographic_to_cartesian(&Cartographic::from_degrees(lon, lat, height))
}

fn picker() -> TerrainPicker<SyntheticTerrain> {
    let viewport = GlobeViewport::new(11.5, 46.5, 50_000.0, 400, 400);
    TerrainPicker::new(SyntheticTerrain::new(&TerrainConfig::default()), viewport, 200_000.0)
}

fn bench_geodesy(c: &mut Criterion) {
    let ring: Vec<DVec3> = (0..64)
        .map(|i| {
            let a = i as f64 / 64.0 * std::f64::consts::TAU;
            surface(11.5 + 0.2 * a.cos(), 46.5 + 0.2 * a.sin(), 0.0)
        })
        .collect();
    c.bench_function("polygon_area_64", |b| b.iter(|| polygon_area(black_box(&ring))));

    let points: Vec<DVec3> = (0..1000).map(|i| surface(i as f64 * 0.3 - 150.0, 45.0, 100.0)).collect();
    c.bench_function("cartesian_to_cartographic_1000", |b| {
        b.iter(|| {
            for p in &points {
                black_box(Ellipsoid::WGS84.cartesian_to_cartographic(*p));
            }
        })
    });
}

fn bench_terrain(c: &mut Criterion) {
    let picker = picker();
    let from = surface(11.5, 46.5, 2000.0);
    let to = surface(11.6, 46.55, 0.0);
    let Some(ray) = Ray::between(from, to) else {
        return;
    };
    c.bench_function("cast_ray", |b| b.iter(|| picker.cast_ray(black_box(&ray))));

    c.bench_function("viewshed_36x20", |b| {
        let mut engine = MeasurementToolEngine::new(crate::picker(), MarkerStore::new(), ToolConfig::default());
        b.iter(|| {
            engine.select_tool(ToolKind::Viewshed);
            engine.on_click(ScreenPoint::new(200, 200));
            engine.deactivate();
        })
    });
}

criterion_group!(benches, bench_geodesy, bench_terrain);
criterion_main!(benches);
