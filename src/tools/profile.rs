use anyhow::{bail, Result};
use glam::DVec3;

use super::{to_cartographic, Step, ToolContext};
use crate::config::ToolConfig;
use crate::geodesy::{
    convert_height, distance, sample_segment, Cartographic, Ellipsoid, UnitSystem, FEET_PER_METER, METERS_PER_MILE,
};
use crate::picking::PickingAdapter;
use crate::scene::{LabelAnchor, MarkerColor, MarkerSink, Visual};

/// Terrain statistics along the first-to-last chord of a profile path.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileSummary {
    pub min: f64,
    pub max: f64,
    /// `max - min`
    pub rise: f64,
    /// Chord length, metres
    pub distance: f64,
    pub heights: Vec<f64>,
}

impl ProfileSummary {
    fn from_heights(heights: &[f64], distance: f64) -> Self {
        let min = heights.iter().copied().fold(f64::INFINITY, f64::min);
        let max = heights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self { min, max, rise: max - min, distance, heights: heights.to_vec() }
    }
}

/// Two-line summary label. Heights in metres or feet; distance in metres,
/// feet below one mile, miles from there.
pub fn profile_summary_text(summary: &ProfileSummary, units: UnitSystem) -> String {
    match units {
        UnitSystem::Metric => format!(
            "Profile: Min {:.1} m, Max {:.1} m\nRise: {:.1} m, Distance: {:.1} m",
            summary.min, summary.max, summary.rise, summary.distance
        ),
        UnitSystem::Imperial => {
            let miles = summary.distance / METERS_PER_MILE;
            let distance = if miles < 1.0 {
                format!("{:.1} ft", summary.distance * FEET_PER_METER)
            } else {
                format!("{miles:.2} mi")
            };
            format!(
                "Profile: Min {:.1} ft, Max {:.1} ft\nRise: {:.1} ft, Distance: {distance}",
                summary.min * FEET_PER_METER,
                summary.max * FEET_PER_METER,
                summary.rise * FEET_PER_METER,
            )
        }
    }
}

pub(super) fn add_vertex<P: PickingAdapter, M: MarkerSink>(
    ctx: &mut ToolContext<'_, P, M>,
    position: DVec3,
) -> Step {
    let session = &mut *ctx.session;
    session.vertices.push(position);
    session.add(ctx.sink, Visual::point(position, MarkerColor::OrangeRed, 8));

    let path = Visual::polyline(session.vertices.clone(), MarkerColor::OrangeRed, 3);
    session.path = Some(session.upsert(ctx.sink, session.path, path));

    if session.vertices.len() >= 2 {
        Step::Resample
    } else {
        Step::Idle
    }
}

pub(super) fn finish<P: PickingAdapter, M: MarkerSink>(ctx: &mut ToolContext<'_, P, M>) -> Step {
    if ctx.session.vertices.len() < 2 {
        return Step::Idle;
    }
    ctx.session.finalized = true;
    Step::Resample
}

pub(super) struct ProfileRequest {
    pub points: Vec<Cartographic>,
    pub distance: f64,
}

/// Evenly spaced sample positions between the first and last vertex.
pub(super) fn sample_points(config: &ToolConfig, vertices: &[DVec3]) -> Result<ProfileRequest> {
    let [first, .., last] = vertices else {
        bail!("profile needs two vertices, got {}", vertices.len());
    };
    let (first, last) = (*first, *last);

    let distance = distance(first, last);
    let count = if config.profile_spacing_m > 0.0 {
        (distance / config.profile_spacing_m).floor() as usize
    } else {
        0
    };
    let count = count.max(config.profile_min_samples).min(config.profile_max_samples).max(2);

    let points = sample_segment(first, last, count)
        .into_iter()
        .map(to_cartographic)
        .collect::<Result<Vec<_>>>()?;
    Ok(ProfileRequest { points, distance })
}

/// Draw the sample markers and summary for a completed height lookup,
/// replacing those of any earlier lookup.
pub(super) fn apply_samples<P: PickingAdapter, M: MarkerSink>(
    ctx: &mut ToolContext<'_, P, M>,
    points: &[Cartographic],
    heights: &[f64],
    distance: f64,
) -> ProfileSummary {
    let session = &mut *ctx.session;
    session.remove_samples(ctx.sink);

    let summary = ProfileSummary::from_heights(heights, distance);
    let last = heights.len().saturating_sub(1);
    let on_terrain = |i: usize| Ellipsoid::WGS84.cartographic_to_cartesian(&points[i].with_height(heights[i]));

    for i in (0..heights.len()).filter(|&i| i % 2 == 0 || i == last) {
        let position = on_terrain(i);
        let visual = if i == 0 || i == last || i % 10 == 0 {
            let text = convert_height(heights[i], session.units).format(1);
            Visual::labeled_point(position, MarkerColor::OrangeRed, 6, text)
        } else {
            Visual::point(position, MarkerColor::OrangeRed, 6)
        };
        let handle = session.add(ctx.sink, visual);
        session.samples.push(handle);
    }

    if let Some(peak) = heights.iter().position(|&h| h == summary.max) {
        let text = profile_summary_text(&summary, session.units);
        session.replace_summary(
            ctx.sink,
            Visual::label(on_terrain(peak), text, MarkerColor::White, LabelAnchor::Above),
        );
    }

    summary
}
