use anyhow::Result;
use glam::DVec3;
use tracing::debug;

use super::{raise, MeasurementResult, Step, ToolContext};
use crate::geodesy::{distance, midpoint};
use crate::picking::{PickingAdapter, Ray};
use crate::scene::{LabelAnchor, MarkerColor, MarkerSink, Visual};

/// First click places the observer, second click the target and runs the test.
pub(super) fn add_vertex<P: PickingAdapter, M: MarkerSink>(
    ctx: &mut ToolContext<'_, P, M>,
    position: DVec3,
) -> Result<Step> {
    match ctx.session.vertices.len() {
        0 => {
            ctx.session.vertices.push(position);
            ctx.session.add(ctx.sink, Visual::point(position, MarkerColor::Green, 10));
            Ok(Step::Idle)
        }
        1 => resolve(ctx, position),
        _ => Ok(Step::Idle),
    }
}

fn resolve<P: PickingAdapter, M: MarkerSink>(
    ctx: &mut ToolContext<'_, P, M>,
    target: DVec3,
) -> Result<Step> {
    let observer = ctx.session.vertices[0];
    // Eye level, so that a target on open ground is not hidden by the ground under the observer
    let eye = raise(observer, ctx.config.observer_eye_height_m)?;
    let range = distance(eye, target);

    let hit = match Ray::between(eye, target) {
        Some(ray) => ctx.picker.cast_ray(&ray)?,
        None => None,
    };
    let blocked_at = hit
        .filter(|h| h.distance < range - ctx.config.los_target_tolerance_m)
        .map(|h| h.point);
    let visible = blocked_at.is_none();
    debug!(visible, range, "line of sight resolved");

    let session = &mut *ctx.session;
    session.vertices.push(target);
    session.add(ctx.sink, Visual::point(target, MarkerColor::Red, 10));
    session.path = Some(session.add(
        ctx.sink,
        Visual::polyline(vec![observer, target], MarkerColor::Yellow, 2),
    ));

    let (text, color) = if visible {
        ("Visible", MarkerColor::Green)
    } else {
        ("Not Visible", MarkerColor::Red)
    };
    session.add(ctx.sink, Visual::label(midpoint(observer, target), text, color, LabelAnchor::Above));

    if let Some(point) = blocked_at {
        session.add(ctx.sink, Visual::labeled_point(point, MarkerColor::Red, 10, "Blocked"));
    }
    session.finalized = true;

    Ok(Step::Measured(MeasurementResult::LineOfSight { visible, distance: range, blocked_at }))
}
