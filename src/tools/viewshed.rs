use std::f64::consts::TAU;

use anyhow::Result;
use glam::DVec3;
use tracing::debug;

use super::{raise, to_cartographic, MeasurementResult, Step, ToolContext};
use crate::config::ToolConfig;
use crate::geodesy::{lerp, Cartographic, Ellipsoid};
use crate::picking::PickingAdapter;
use crate::scene::{LabelAnchor, MarkerColor, MarkerSink, Visual};

/// How far the observer sees along one bearing.
#[derive(Clone, Debug, PartialEq)]
pub struct BearingVisibility {
    /// Counter-clockwise from east, degrees
    pub bearing_deg: f64,
    /// Unobstructed share of the ray, `0.0..=1.0`
    pub fraction: f64,
    pub obstruction: Option<DVec3>,
    /// Obstruction point, or the ring point when unobstructed
    pub reach: DVec3,
}

pub fn visibility_color(fraction: f64) -> MarkerColor {
    if fraction >= 0.95 {
        MarkerColor::Green
    } else if fraction >= 0.5 {
        MarkerColor::Yellow
    } else {
        MarkerColor::Red
    }
}

/// Ring end point `radius` metres from `observer` along `angle` (radians,
/// counter-clockwise from east).
///
/// Flat-earth offset: the radius is divided by the equatorial radius, so
/// this is not a geodesic destination and drifts at long range or near
/// the poles.
fn ring_point(observer: &Cartographic, radius: f64, angle: f64) -> Cartographic {
    let a = Ellipsoid::WGS84.radii.x;
    let b = Ellipsoid::WGS84.radii.y;
    Cartographic::new(
        observer.longitude + radius * angle.cos() / (a * observer.latitude.cos()),
        observer.latitude + radius * angle.sin() / b,
        observer.height,
    )
}

/// March from `eye` to `end` and stop at the first sample below the terrain.
fn march<P: PickingAdapter>(picker: &P, eye: DVec3, end: DVec3, steps: usize) -> Result<(f64, Option<DVec3>)> {
    for i in 1..=steps {
        let fraction = i as f64 / steps as f64;
        let sample = lerp(eye, end, fraction);
        let c = to_cartographic(sample)?;
        let terrain = picker.surface_height(&c).unwrap_or(0.0);
        if c.height < terrain {
            return Ok((fraction, Some(sample)));
        }
    }
    Ok((1.0, None))
}

pub(crate) fn compute<P: PickingAdapter>(
    picker: &P,
    config: &ToolConfig,
    observer: DVec3,
) -> Result<Vec<BearingVisibility>> {
    let eye = raise(observer, config.observer_eye_height_m)?;
    let origin = to_cartographic(eye)?;
    let steps = config.viewshed_steps.max(1);
    let bearings = config.viewshed_bearings.max(1);

    (0..bearings)
        .map(|i| {
            let angle = i as f64 * TAU / bearings as f64;
            let end = Ellipsoid::WGS84.cartographic_to_cartesian(&ring_point(&origin, config.viewshed_radius_m, angle));
            let (fraction, obstruction) = march(picker, eye, end, steps)?;
            Ok(BearingVisibility {
                bearing_deg: angle.to_degrees(),
                fraction,
                obstruction,
                reach: obstruction.unwrap_or(end),
            })
        })
        .collect()
}

/// Single click: replace any previous viewshed and finish.
pub(super) fn add_vertex<P: PickingAdapter, M: MarkerSink>(
    ctx: &mut ToolContext<'_, P, M>,
    position: DVec3,
) -> Result<Step> {
    let bearings = compute(ctx.picker, ctx.config, position)?;
    let eye = raise(position, ctx.config.observer_eye_height_m)?;

    let session = &mut *ctx.session;
    session.remove_all(ctx.sink);
    session.vertices.push(position);
    session.add(ctx.sink, Visual::point(position, MarkerColor::Purple, 12));

    let stride = ctx.config.viewshed_marker_stride.max(1);
    for (i, bearing) in bearings.iter().enumerate() {
        let line = Visual::polyline(vec![eye, bearing.reach], visibility_color(bearing.fraction), 2);
        session.add(ctx.sink, line);
        if let Some(point) = bearing.obstruction.filter(|_| i % stride == 0) {
            session.add(ctx.sink, Visual::point(point, MarkerColor::Red, 8));
        }
    }
    session.add(ctx.sink, Visual::label(position, "Viewpoint", MarkerColor::White, LabelAnchor::Above));
    session.finalized = true;

    let blocked = bearings.iter().filter(|b| b.obstruction.is_some()).count();
    debug!(bearings = bearings.len(), blocked, "viewshed computed");

    Ok(Step::Measured(MeasurementResult::Viewshed(bearings)))
}
