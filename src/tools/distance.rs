use glam::DVec3;

use super::{MeasurementResult, Step, ToolContext};
use crate::geodesy::{convert_distance, cumulative_distance, distance, midpoint};
use crate::picking::PickingAdapter;
use crate::scene::{LabelAnchor, MarkerColor, MarkerSink, Visual};

pub(super) fn add_vertex<P: PickingAdapter, M: MarkerSink>(
    ctx: &mut ToolContext<'_, P, M>,
    position: DVec3,
) -> Step {
    let session = &mut *ctx.session;
    session.vertices.push(position);
    session.add(ctx.sink, Visual::point(position, MarkerColor::Yellow, 8));

    let path = Visual::polyline(session.vertices.clone(), MarkerColor::Yellow, 3);
    session.path = Some(session.upsert(ctx.sink, session.path, path));

    let n = session.vertices.len();
    if n < 2 {
        return Step::Idle;
    }

    let previous = session.vertices[n - 2];
    let segment = distance(previous, position);
    session.add(
        ctx.sink,
        Visual::label(
            midpoint(previous, position),
            convert_distance(segment, session.units).to_string(),
            MarkerColor::White,
            LabelAnchor::Above,
        ),
    );

    let total = cumulative_distance(&session.vertices);
    let text = format!("Total: {}", convert_distance(total, session.units));
    session.replace_summary(ctx.sink, Visual::label(position, text, MarkerColor::Yellow, LabelAnchor::Right));

    Step::Measured(MeasurementResult::Distance { segment, total })
}

pub(super) fn finish<P: PickingAdapter, M: MarkerSink>(ctx: &mut ToolContext<'_, P, M>) -> Step {
    ctx.session.finalized = true;
    Step::Idle
}
