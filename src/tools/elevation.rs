use anyhow::Result;
use glam::DVec3;

use super::{to_cartographic, MeasurementResult, Step, ToolContext};
use crate::geodesy::convert_height;
use crate::picking::PickingAdapter;
use crate::scene::{LabelAnchor, MarkerColor, MarkerSink, Visual};

/// Single-point readout. Each click replaces the previous marker and label.
pub(super) fn add_vertex<P: PickingAdapter, M: MarkerSink>(
    ctx: &mut ToolContext<'_, P, M>,
    position: DVec3,
) -> Result<Step> {
    let c = to_cartographic(position)?;
    let (longitude, latitude) = (c.lon_degrees(), c.lat_degrees());

    let session = &mut *ctx.session;
    session.remove_all(ctx.sink);
    session.vertices.push(position);

    let text = format!("Elevation: {}", convert_height(c.height, session.units));
    session.add(ctx.sink, Visual::labeled_point(position, MarkerColor::DeepSkyBlue, 10, text));
    session.add(
        ctx.sink,
        Visual::label(
            position,
            format!("Lat: {latitude:.6}, Lon: {longitude:.6}"),
            MarkerColor::White,
            LabelAnchor::Below,
        ),
    );

    Ok(Step::Measured(MeasurementResult::Elevation { longitude, latitude, height: c.height }))
}
