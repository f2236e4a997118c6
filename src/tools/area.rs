use glam::DVec3;

use super::{MeasurementResult, Step, ToolContext};
use crate::geodesy::{centroid, convert_area, polygon_area};
use crate::picking::PickingAdapter;
use crate::scene::{LabelAnchor, MarkerColor, MarkerSink, Visual};

const FILL_ALPHA: f32 = 0.3;

pub(super) fn add_vertex<P: PickingAdapter, M: MarkerSink>(
    ctx: &mut ToolContext<'_, P, M>,
    position: DVec3,
) -> Step {
    ctx.session.vertices.push(position);
    ctx.session.add(ctx.sink, Visual::point(position, MarkerColor::Lime, 8));
    refresh(ctx)
}

pub(super) fn finish<P: PickingAdapter, M: MarkerSink>(ctx: &mut ToolContext<'_, P, M>) -> Step {
    if ctx.session.vertices.len() < 3 {
        return Step::Idle;
    }
    let step = refresh(ctx);
    ctx.session.finalized = true;
    step
}

/// Redraw outline, fill and area label from the current vertices.
fn refresh<P: PickingAdapter, M: MarkerSink>(ctx: &mut ToolContext<'_, P, M>) -> Step {
    let session = &mut *ctx.session;

    let mut outline = session.vertices.clone();
    if outline.len() > 1 {
        outline.push(outline[0]);
    }
    let path = Visual::polyline(outline, MarkerColor::Lime, 3);
    session.path = Some(session.upsert(ctx.sink, session.path, path));

    if session.vertices.len() < 3 {
        return Step::Idle;
    }

    let fill = Visual::Polygon {
        positions: session.vertices.clone(),
        color: MarkerColor::Lime,
        alpha: FILL_ALPHA,
    };
    session.polygon = Some(session.upsert(ctx.sink, session.polygon, fill));

    let square_meters = polygon_area(&session.vertices);
    let text = format!("Area: {}", convert_area(square_meters, session.units));
    let label = Visual::label(centroid(&session.vertices), text, MarkerColor::White, LabelAnchor::Center);
    session.replace_summary(ctx.sink, label);

    Step::Measured(MeasurementResult::Area { square_meters })
}
