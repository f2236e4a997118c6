//! Interactive measurement tools driven by scene picking.
//!
//! A [`MeasurementToolEngine`] owns at most one [`ToolSession`]. Every visual a
//! session creates is tracked by handle and removed when the session ends, so
//! switching tools never leaks markers into the scene.

mod area;
mod distance;
mod elevation;
mod line_of_sight;
mod profile;
mod viewshed;

#[cfg(test)]
pub(crate) mod testing;

pub use profile::{profile_summary_text, ProfileSummary};
pub use viewshed::BearingVisibility;

use anyhow::{anyhow, Result};
use glam::DVec3;
use tracing::{debug, info, warn};

use crate::config::ToolConfig;
use crate::geodesy::{Cartographic, Ellipsoid, UnitSystem};
use crate::picking::{HeightSampling, PickingAdapter, ScreenPoint};
use crate::scene::{MarkerHandle, MarkerSink, Visual};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ToolKind {
    #[default]
    None,
    Distance,
    Area,
    LineOfSight,
    Elevation,
    Profile,
    Viewshed,
}

impl ToolKind {
    /// Every selectable tool, in toolbar order.
    pub const ALL: [ToolKind; 6] = [
        ToolKind::Distance,
        ToolKind::Area,
        ToolKind::LineOfSight,
        ToolKind::Elevation,
        ToolKind::Profile,
        ToolKind::Viewshed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ToolKind::None => "None",
            ToolKind::Distance => "Distance",
            ToolKind::Area => "Area",
            ToolKind::LineOfSight => "Line of Sight",
            ToolKind::Elevation => "Elevation",
            ToolKind::Profile => "Profile",
            ToolKind::Viewshed => "Viewshed",
        }
    }

    /// One-line usage hint for the status bar.
    pub fn hint(self) -> &'static str {
        match self {
            ToolKind::None => "",
            ToolKind::Distance => "click points, double-click to finish",
            ToolKind::Area => "click 3+ points, double-click to close",
            ToolKind::LineOfSight => "click observer, then target",
            ToolKind::Elevation => "click a point",
            ToolKind::Profile => "click a path, double-click to finish",
            ToolKind::Viewshed => "click the observer position",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolState {
    Idle,
    Active { kind: ToolKind, vertex_count: usize },
}

/// Structured outcome of the latest measurement step.
#[derive(Clone, Debug, PartialEq)]
pub enum MeasurementResult {
    Distance { segment: f64, total: f64 },
    Area { square_meters: f64 },
    LineOfSight { visible: bool, distance: f64, blocked_at: Option<DVec3> },
    /// Longitude/latitude in degrees, height in metres
    Elevation { longitude: f64, latitude: f64, height: f64 },
    Profile(ProfileSummary),
    Viewshed(Vec<BearingVisibility>),
}

/// State of the one active measurement.
#[derive(Debug)]
pub struct ToolSession {
    kind: ToolKind,
    vertices: Vec<DVec3>,
    units: UnitSystem,
    generation: u64,
    finalized: bool,
    /// Every handle this session created and has not yet removed
    markers: Vec<MarkerHandle>,
    /// Polyline through the vertices
    path: Option<MarkerHandle>,
    polygon: Option<MarkerHandle>,
    /// Running total, area or profile summary label
    summary: Option<MarkerHandle>,
    samples: Vec<MarkerHandle>,
}

impl ToolSession {
    fn new(kind: ToolKind, units: UnitSystem, generation: u64) -> Self {
        Self {
            kind,
            vertices: Vec::new(),
            units,
            generation,
            finalized: false,
            markers: Vec::new(),
            path: None,
            polygon: None,
            summary: None,
            samples: Vec::new(),
        }
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    pub fn units(&self) -> UnitSystem {
        self.units
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Handles currently owned by the session.
    pub fn markers(&self) -> &[MarkerHandle] {
        &self.markers
    }

    fn add<M: MarkerSink>(&mut self, sink: &mut M, visual: Visual) -> MarkerHandle {
        let handle = sink.add(visual);
        self.markers.push(handle);
        handle
    }

    fn remove<M: MarkerSink>(&mut self, sink: &mut M, handle: MarkerHandle) {
        if let Some(idx) = self.markers.iter().position(|h| *h == handle) {
            self.markers.swap_remove(idx);
            sink.remove(handle);
        }
    }

    /// Update a tracked visual in place, or create it if the slot is empty or stale.
    fn upsert<M: MarkerSink>(
        &mut self,
        sink: &mut M,
        slot: Option<MarkerHandle>,
        visual: Visual,
    ) -> MarkerHandle {
        match slot {
            Some(handle) if sink.update(handle, visual.clone()) => handle,
            Some(stale) => {
                self.remove(sink, stale);
                self.add(sink, visual)
            }
            None => self.add(sink, visual),
        }
    }

    /// Swap the summary label for a new one.
    fn replace_summary<M: MarkerSink>(&mut self, sink: &mut M, visual: Visual) {
        if let Some(old) = self.summary.take() {
            self.remove(sink, old);
        }
        self.summary = Some(self.add(sink, visual));
    }

    fn remove_samples<M: MarkerSink>(&mut self, sink: &mut M) {
        for handle in std::mem::take(&mut self.samples) {
            self.remove(sink, handle);
        }
    }

    /// Remove every visual and forget the vertices.
    fn remove_all<M: MarkerSink>(&mut self, sink: &mut M) {
        for handle in self.markers.drain(..) {
            sink.remove(handle);
        }
        self.vertices.clear();
        self.path = None;
        self.polygon = None;
        self.summary = None;
        self.samples.clear();
    }
}

/// What a tool asks of the engine after handling input.
enum Step {
    Idle,
    Measured(MeasurementResult),
    /// Profile needs fresh terrain samples along its chord
    Resample,
}

/// Borrowed view of the engine handed to the per-kind handlers.
struct ToolContext<'a, P, M> {
    picker: &'a P,
    sink: &'a mut M,
    config: &'a ToolConfig,
    session: &'a mut ToolSession,
}

struct PendingProfile {
    generation: u64,
    points: Vec<Cartographic>,
    distance: f64,
    sampling: HeightSampling,
}

/// Drives the measurement tools against a picking adapter and a marker sink.
pub struct MeasurementToolEngine<P: PickingAdapter, M: MarkerSink> {
    picker: P,
    sink: M,
    config: ToolConfig,
    units: UnitSystem,
    session: Option<ToolSession>,
    generation: u64,
    pending: Option<PendingProfile>,
    last_result: Option<MeasurementResult>,
}

impl<P: PickingAdapter, M: MarkerSink> MeasurementToolEngine<P, M> {
    pub fn new(picker: P, sink: M, config: ToolConfig) -> Self {
        Self {
            picker,
            sink,
            units: config.units,
            config,
            session: None,
            generation: 0,
            pending: None,
            last_result: None,
        }
    }

    pub fn state(&self) -> ToolState {
        match &self.session {
            Some(session) => ToolState::Active {
                kind: session.kind,
                vertex_count: session.vertices.len(),
            },
            None => ToolState::Idle,
        }
    }

    pub fn active_kind(&self) -> ToolKind {
        self.session.as_ref().map_or(ToolKind::None, |s| s.kind)
    }

    pub fn session(&self) -> Option<&ToolSession> {
        self.session.as_ref()
    }

    pub fn last_result(&self) -> Option<&MeasurementResult> {
        self.last_result.as_ref()
    }

    pub fn units(&self) -> UnitSystem {
        self.units
    }

    pub fn has_pending_profile(&self) -> bool {
        self.pending.is_some()
    }

    pub fn picker(&self) -> &P {
        &self.picker
    }

    pub fn picker_mut(&mut self) -> &mut P {
        &mut self.picker
    }

    pub fn sink(&self) -> &M {
        &self.sink
    }

    /// Switch tools. Selecting the active tool again, or [`ToolKind::None`], goes idle.
    pub fn select_tool(&mut self, kind: ToolKind) {
        let previous = self.active_kind();
        self.teardown();

        if kind == ToolKind::None || kind == previous {
            info!(tool = previous.label(), "measurement tool deactivated");
            return;
        }
        self.start_session(kind);
        info!(tool = kind.label(), "measurement tool selected");
    }

    /// End any session without selecting another tool.
    pub fn deactivate(&mut self) {
        self.select_tool(ToolKind::None);
    }

    /// Discard the current measurement but keep the tool selected.
    pub fn clear(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.remove_all(&mut self.sink);
        session.finalized = false;
        self.generation += 1;
        session.generation = self.generation;
        self.last_result = None;
        debug!(tool = session.kind.label(), "measurement cleared");
    }

    /// Change units; an active tool restarts in the new unit system.
    pub fn set_units(&mut self, units: UnitSystem) {
        if units == self.units {
            return;
        }
        self.units = units;
        info!(units = units.name(), "units changed");

        let kind = self.active_kind();
        if kind != ToolKind::None {
            self.teardown();
            self.start_session(kind);
        }
    }

    pub fn on_click(&mut self, screen: ScreenPoint) {
        let Self { picker, sink, config, session, .. } = &mut *self;
        let Some(session) = session.as_mut() else {
            return;
        };
        if session.finalized {
            debug!(tool = session.kind.label(), "measurement already finished");
            return;
        }
        if !picker.supports_picking() {
            warn!("scene does not support position picking");
            return;
        }
        let Some(position) = picker.pick_surface_position(screen) else {
            debug!(x = screen.x, y = screen.y, "nothing to pick under cursor");
            return;
        };

        let kind = session.kind;
        let mut ctx = ToolContext { picker: &*picker, sink, config: &*config, session };
        let step = match kind {
            ToolKind::Distance => Ok(distance::add_vertex(&mut ctx, position)),
            ToolKind::Area => Ok(area::add_vertex(&mut ctx, position)),
            ToolKind::LineOfSight => line_of_sight::add_vertex(&mut ctx, position),
            ToolKind::Elevation => elevation::add_vertex(&mut ctx, position),
            ToolKind::Profile => Ok(profile::add_vertex(&mut ctx, position)),
            ToolKind::Viewshed => viewshed::add_vertex(&mut ctx, position),
            ToolKind::None => Ok(Step::Idle),
        };
        self.handle_step(kind, step);
    }

    pub fn on_double_click(&mut self) {
        let Self { picker, sink, config, session, .. } = &mut *self;
        let Some(session) = session.as_mut() else {
            return;
        };
        if session.finalized {
            return;
        }

        let kind = session.kind;
        let mut ctx = ToolContext { picker: &*picker, sink, config: &*config, session };
        let step = match kind {
            ToolKind::Distance => distance::finish(&mut ctx),
            ToolKind::Area => area::finish(&mut ctx),
            ToolKind::Profile => profile::finish(&mut ctx),
            _ => Step::Idle,
        };
        self.handle_step(kind, Ok(step));
    }

    /// Apply a finished terrain sampling if it still belongs to the current session.
    /// Returns `true` when new profile visuals were drawn.
    pub fn poll(&mut self) -> bool {
        let Some(result) = self.pending.as_ref().and_then(|p| p.sampling.try_take()) else {
            return false;
        };
        let Some(pending) = self.pending.take() else {
            return false;
        };

        let Self { picker, sink, config, session, .. } = &mut *self;
        let session = match session.as_mut() {
            Some(s) if s.generation == pending.generation && s.kind == ToolKind::Profile => s,
            _ => {
                debug!(generation = pending.generation, "discarding stale terrain samples");
                return false;
            }
        };

        let heights = match result {
            Ok(heights) if heights.len() == pending.points.len() => heights,
            Ok(heights) => {
                warn!(expected = pending.points.len(), got = heights.len(), "terrain sampler returned a short batch");
                return false;
            }
            Err(err) => {
                warn!("terrain sampling failed: {err:#}");
                return false;
            }
        };

        let mut ctx = ToolContext { picker: &*picker, sink, config: &*config, session };
        let summary = profile::apply_samples(&mut ctx, &pending.points, &heights, pending.distance);
        self.last_result = Some(MeasurementResult::Profile(summary));
        true
    }

    fn handle_step(&mut self, kind: ToolKind, step: Result<Step>) {
        match step {
            Ok(Step::Idle) => {}
            Ok(Step::Measured(result)) => self.last_result = Some(result),
            Ok(Step::Resample) => self.request_profile(),
            Err(err) => warn!(tool = kind.label(), "measurement step failed: {err:#}"),
        }
    }

    /// Ask for terrain heights along the current profile chord. Supersedes any pending request.
    fn request_profile(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let request = match profile::sample_points(&self.config, session.vertices()) {
            Ok(request) => request,
            Err(err) => {
                warn!("cannot sample profile: {err:#}");
                return;
            }
        };

        debug!(samples = request.points.len(), distance = request.distance, "requesting terrain profile");
        let sampling = self.picker.sample_terrain_heights(request.points.clone());
        self.pending = Some(PendingProfile {
            generation: session.generation,
            points: request.points,
            distance: request.distance,
            sampling,
        });
        // Synchronous adapters answer immediately
        self.poll();
    }

    fn start_session(&mut self, kind: ToolKind) {
        self.generation += 1;
        self.session = Some(ToolSession::new(kind, self.units, self.generation));
        self.last_result = None;
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            let removed = session.markers.len();
            session.remove_all(&mut self.sink);
            debug!(tool = session.kind.label(), removed, "session torn down");
        }
    }
}

/// Cartographic position of a world point.
fn to_cartographic(position: DVec3) -> Result<Cartographic> {
    Ellipsoid::WGS84
        .cartesian_to_cartographic(position)
        .ok_or_else(|| anyhow!("position {position} has no geodetic coordinates"))
}

/// The same point moved `meters` along the local vertical.
fn raise(position: DVec3, meters: f64) -> Result<DVec3> {
    let c = to_cartographic(position)?;
    Ok(Ellipsoid::WGS84.cartographic_to_cartesian(&c.with_height(c.height + meters)))
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::scene::MarkerColor;

    #[test]
    fn test_select_same_tool_toggles_idle() {
        let mut engine = engine(ScriptedPicker::grid());
        engine.select_tool(ToolKind::Distance);
        assert_eq!(engine.state(), ToolState::Active { kind: ToolKind::Distance, vertex_count: 0 });
        engine.select_tool(ToolKind::Distance);
        assert_eq!(engine.state(), ToolState::Idle);
        engine.select_tool(ToolKind::None);
        assert_eq!(engine.state(), ToolState::Idle);
    }

    #[test]
    fn test_switching_tools_leaks_no_handles() {
        let mut engine = engine(ScriptedPicker::grid());
        for kind in ToolKind::ALL {
            engine.select_tool(kind);
            for i in 0..4 {
                engine.on_click(ScreenPoint::new(i, 0));
            }
            engine.on_double_click();
            assert!(!engine.sink().is_empty(), "{kind:?} drew nothing");
        }
        engine.select_tool(ToolKind::Distance);
        assert_eq!(engine.sink().len(), 0);
        engine.deactivate();
        assert_eq!(engine.sink().len(), 0);
        assert_eq!(engine.sink().double_removals, 0);
    }

    #[test]
    fn test_click_while_idle_is_noop() {
        let mut engine = engine(ScriptedPicker::grid());
        engine.on_click(ScreenPoint::new(0, 0));
        engine.on_double_click();
        assert!(engine.sink().is_empty());
        assert_eq!(engine.state(), ToolState::Idle);
    }

    #[test]
    fn test_missed_pick_keeps_measurement() {
        let mut engine = engine(ScriptedPicker::grid());
        engine.select_tool(ToolKind::Elevation);
        engine.on_click(ScreenPoint::new(1, 0));
        let before = engine.sink().len();
        engine.on_click(ScreenPoint::new(-5, -5));
        assert_eq!(engine.sink().len(), before);
        assert_eq!(engine.state(), ToolState::Active { kind: ToolKind::Elevation, vertex_count: 1 });
    }

    #[test]
    fn test_unsupported_picking_is_noop() {
        let mut picker = ScriptedPicker::grid();
        picker.supports = false;
        let mut engine = engine(picker);
        engine.select_tool(ToolKind::Distance);
        engine.on_click(ScreenPoint::new(0, 0));
        assert!(engine.sink().is_empty());
        assert_eq!(engine.state(), ToolState::Active { kind: ToolKind::Distance, vertex_count: 0 });
    }

    #[test]
    fn test_clear_keeps_tool_selected() {
        let mut engine = engine(ScriptedPicker::grid());
        engine.clear();
        engine.select_tool(ToolKind::Area);
        for i in 0..3 {
            engine.on_click(ScreenPoint::new(i, 0));
        }
        engine.on_double_click();
        let generation = engine.session().unwrap().generation();
        engine.clear();
        assert!(engine.sink().is_empty());
        assert_eq!(engine.state(), ToolState::Active { kind: ToolKind::Area, vertex_count: 0 });
        assert!(engine.session().unwrap().generation() > generation);
        assert!(engine.last_result().is_none());
        // finalized flag is reset, so clicks count again
        engine.on_click(ScreenPoint::new(0, 0));
        assert_eq!(engine.state(), ToolState::Active { kind: ToolKind::Area, vertex_count: 1 });
    }

    #[test]
    fn test_set_units_reapplies_tool() {
        let mut engine = engine(ScriptedPicker::grid());
        engine.select_tool(ToolKind::Distance);
        engine.on_click(ScreenPoint::new(0, 0));
        engine.on_click(ScreenPoint::new(1, 0));
        assert!(!engine.sink().is_empty());

        engine.set_units(UnitSystem::Imperial);
        assert!(engine.sink().is_empty());
        assert_eq!(engine.state(), ToolState::Active { kind: ToolKind::Distance, vertex_count: 0 });
        assert_eq!(engine.session().unwrap().units(), UnitSystem::Imperial);

        engine.on_click(ScreenPoint::new(0, 0));
        engine.on_click(ScreenPoint::new(1, 0));
        assert!(engine.sink().texts().iter().any(|t| t.starts_with("Total: ") && t.ends_with(" ft")));
    }

    #[test]
    fn test_set_units_while_idle() {
        let mut engine = engine(ScriptedPicker::grid());
        engine.set_units(UnitSystem::Imperial);
        assert_eq!(engine.units(), UnitSystem::Imperial);
        assert_eq!(engine.state(), ToolState::Idle);
    }

    #[test]
    fn test_upsert_recreates_stale_handle() {
        let mut sink = RecordingSink::default();
        let mut session = ToolSession::new(ToolKind::Distance, UnitSystem::Metric, 1);
        let handle = session.add(&mut sink, Visual::point(DVec3::X, MarkerColor::Yellow, 8));
        sink.store.remove(handle);
        let replacement =
            session.upsert(&mut sink, Some(handle), Visual::point(DVec3::Y, MarkerColor::Yellow, 8));
        assert_ne!(replacement, handle);
        assert_eq!(session.markers(), &[replacement]);
    }
}
