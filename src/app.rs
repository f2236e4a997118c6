use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use sar_map::catalog::{Catalog, ImageRecord, SarQuery};
use sar_map::config::Config;
use sar_map::geodesy::{convert_area, convert_distance, convert_height};
use sar_map::layers::{LayerLifecycleCoordinator, OverlayStack};
use sar_map::map::{GlobeViewport, SceneRenderer};
use sar_map::picking::ScreenPoint;
use sar_map::scene::MarkerStore;
use sar_map::telemetry::StatusLog;
use sar_map::terrain::{SyntheticTerrain, TerrainPicker};
use sar_map::tools::{profile_summary_text, MeasurementResult, MeasurementToolEngine, ToolKind};

/// Width of the results/log panel right of the map, in cells
pub const PANEL_WIDTH: u16 = 38;
/// Second click on the same cell within this window is a double-click
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);
const SEARCH_SPAN_DAYS: i64 = 3 * 365;

pub type Tools = MeasurementToolEngine<TerrainPicker<SyntheticTerrain>, MarkerStore>;

/// Braille pixel under a terminal cell of the map. The map sits inside a
/// one-cell border at the top left of the screen.
pub fn cell_to_pixel(col: u16, row: u16) -> (i32, i32) {
    (col.saturating_sub(1) as i32 * 2, row.saturating_sub(1) as i32 * 4)
}

/// Map canvas size in braille pixels for a terminal of `width` x `height` cells.
pub fn map_pixels(width: usize, height: usize) -> (usize, usize) {
    // border on both sides plus the side panel; border and status bar below
    let inner_width = width.saturating_sub(PANEL_WIDTH as usize + 2);
    let inner_height = height.saturating_sub(3);
    (inner_width * 2, inner_height * 4)
}

/// Application state
pub struct App {
    pub viewport: GlobeViewport,
    pub renderer: SceneRenderer,
    pub tools: Tools,
    pub layers: LayerLifecycleCoordinator<OverlayStack>,
    pub catalog: Catalog,
    /// Records of the latest search
    pub results: Vec<ImageRecord>,
    pub selected: Option<usize>,
    pub status: StatusLog,
    pub search_start: NaiveDate,
    pub search_end: NaiveDate,
    /// Restrict searches to the visible part of the globe
    pub search_in_view: bool,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    dragged: bool,
    last_click: Option<(Instant, (u16, u16))>,
    config: Config,
}

impl App {
    pub fn new(width: usize, height: usize, config: Config, catalog: Catalog, status: StatusLog) -> Self {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        let viewport = GlobeViewport::world(config.map.center_lon, config.map.center_lat, pixel_width, pixel_height);

        let picker = TerrainPicker::new(
            SyntheticTerrain::new(&config.terrain),
            viewport.clone(),
            config.terrain.max_ray_distance_m,
        );
        let tools = MeasurementToolEngine::new(picker, MarkerStore::new(), config.tools.clone());
        let layers = LayerLifecycleCoordinator::with_base_layer(OverlayStack::new(), config.map.base_layer);

        let mut renderer = SceneRenderer::new();
        renderer.settings.show_footprints = config.map.show_footprints;

        let search_end = Utc::now().date_naive();
        let search_start = search_end - chrono::Duration::days(SEARCH_SPAN_DAYS);

        Self {
            viewport,
            renderer,
            tools,
            layers,
            catalog,
            results: Vec::new(),
            selected: None,
            status,
            search_start,
            search_end,
            search_in_view: false,
            should_quit: false,
            last_mouse: None,
            mouse_pos: None,
            dragged: false,
            last_click: None,
            config,
        }
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        self.viewport.set_size(pixel_width, pixel_height);
        self.sync_picker();
    }

    /// Picking has to see exactly what is on screen.
    fn sync_picker(&mut self) {
        self.tools.picker_mut().set_viewport(&self.viewport);
    }

    /// Move the view by `(dx, dy)` braille pixels.
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.rotate_drag(-dx, -dy);
        self.sync_picker();
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.sync_picker();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.sync_picker();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = cell_to_pixel(col, row);
        self.viewport.zoom_in_at(px, py);
        self.sync_picker();
    }

    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = cell_to_pixel(col, row);
        self.viewport.zoom_out_at(px, py);
        self.sync_picker();
    }

    /// Back to the whole-earth view at the configured start centre.
    pub fn reset_view(&mut self) {
        self.viewport = GlobeViewport::world(
            self.config.map.center_lon,
            self.config.map.center_lat,
            self.viewport.width,
            self.viewport.height,
        );
        self.sync_picker();
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn mouse_down(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.dragged = false;
    }

    /// Drag rotates the globe with the pointer.
    pub fn handle_drag(&mut self, col: u16, row: u16) {
        if let Some((last_col, last_row)) = self.last_mouse {
            let dx = (col as i32 - last_col as i32) * 2;
            let dy = (row as i32 - last_row as i32) * 4;
            if dx != 0 || dy != 0 {
                self.viewport.rotate_drag(dx, dy);
                self.sync_picker();
                self.dragged = true;
            }
        }
        self.last_mouse = Some((col, row));
    }

    /// Release without a drag is a click for the active tool.
    pub fn mouse_up(&mut self, col: u16, row: u16, now: Instant) {
        if self.last_mouse.is_some() && !self.dragged {
            self.click(col, row, now);
        }
        self.last_mouse = None;
        self.dragged = false;
    }

    fn click(&mut self, col: u16, row: u16, now: Instant) {
        let is_double = self
            .last_click
            .is_some_and(|(at, cell)| cell == (col, row) && now.duration_since(at) <= DOUBLE_CLICK_WINDOW);
        if is_double {
            self.last_click = None;
            self.tools.on_double_click();
            return;
        }
        self.last_click = Some((now, (col, row)));

        // centre of the cell
        let (px, py) = cell_to_pixel(col, row);
        self.tools.on_click(ScreenPoint::new(px + 1, py + 2));
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// Mouse position in braille pixel coordinates (for the cursor marker)
    pub fn mouse_pixel_pos(&self) -> Option<(i32, i32)> {
        self.mouse_pos.map(|(col, row)| cell_to_pixel(col, row))
    }

    pub fn select_tool(&mut self, kind: ToolKind) {
        self.tools.select_tool(kind);
        self.last_click = None;
    }

    pub fn toggle_units(&mut self) {
        self.tools.set_units(self.tools.units().toggled());
    }

    /// Apply finished background work. Call once per frame.
    pub fn tick(&mut self) {
        self.tools.poll();
    }

    /// Run a catalog search and show the result footprints.
    pub fn search(&mut self) {
        let mut query = SarQuery::between_days(self.search_start, self.search_end);
        if self.search_in_view {
            let b = self.viewport.visible_bounds();
            query = query.with_bbox([b.west, b.south, b.east, b.north]);
        }

        match self.catalog.search(&query) {
            Ok(results) => {
                let footprints = self.layers.replace_footprints(&results);
                info!(results = results.len(), footprints, "search finished");
                self.selected = (!results.is_empty()).then_some(0);
                self.results = results;
            }
            Err(err) => warn!("search failed: {err}"),
        }
    }

    pub fn toggle_search_in_view(&mut self) {
        self.search_in_view = !self.search_in_view;
    }

    pub fn select_next(&mut self) {
        if self.results.is_empty() {
            return;
        }
        self.selected = Some(self.selected.map_or(0, |i| (i + 1) % self.results.len()));
    }

    pub fn select_prev(&mut self) {
        if self.results.is_empty() {
            return;
        }
        let len = self.results.len();
        self.selected = Some(self.selected.map_or(0, |i| (i + len - 1) % len));
    }

    pub fn selected_record(&self) -> Option<&ImageRecord> {
        self.results.get(self.selected?)
    }

    /// Put the selected image on the globe and centre on it.
    pub fn show_selected(&mut self) {
        let Some(record) = self.selected_record().cloned() else {
            return;
        };
        let center = match self.layers.add_or_get_overlay(&record) {
            Ok(overlay) => overlay.extent.center(),
            Err(err) => {
                warn!("cannot show image: {err}");
                return;
            }
        };
        self.viewport.fly_to(center.0, center.1);
        self.sync_picker();
    }

    pub fn toggle_selected(&mut self) {
        let Some(image_id) = self.selected_record().map(|r| r.image_id.clone()) else {
            return;
        };
        if self.layers.toggle_visibility(&image_id).is_none() {
            debug!(image_id = %image_id, "image is not on the map");
        }
    }

    pub fn remove_selected(&mut self) {
        if let Some(image_id) = self.selected_record().map(|r| r.image_id.clone()) {
            self.layers.remove_overlay(&image_id);
        }
    }

    pub fn clear_overlays(&mut self) {
        self.layers.clear_overlays();
    }

    pub fn cycle_base_layer(&mut self) {
        let next = self.layers.base_layer().unwrap_or_default().next();
        self.layers.set_base_layer(next);
    }

    pub fn zoom_level(&self) -> String {
        format!("{:.1}x", self.viewport.effective_zoom())
    }

    pub fn center_coords(&self) -> String {
        let (lon, lat) = (self.viewport.center_lon(), self.viewport.center_lat());
        format!(
            "{:.1}°{}, {:.1}°{}",
            lat.abs(),
            if lat >= 0.0 { "N" } else { "S" },
            lon.abs(),
            if lon >= 0.0 { "E" } else { "W" }
        )
    }

    /// One-line readout of the latest measurement.
    pub fn measurement_text(&self) -> Option<String> {
        let units = self.tools.units();
        let text = match self.tools.last_result()? {
            MeasurementResult::Distance { segment, total } => format!(
                "Segment {}, Total {}",
                convert_distance(*segment, units),
                convert_distance(*total, units)
            ),
            MeasurementResult::Area { square_meters } => format!("Area {}", convert_area(*square_meters, units)),
            MeasurementResult::LineOfSight { visible, distance, .. } => format!(
                "{} over {}",
                if *visible { "Visible" } else { "Not visible" },
                convert_distance(*distance, units)
            ),
            MeasurementResult::Elevation { longitude, latitude, height } => {
                format!("{} at {latitude:.5}, {longitude:.5}", convert_height(*height, units))
            }
            MeasurementResult::Profile(summary) => profile_summary_text(summary, units).replace('\n', ", "),
            MeasurementResult::Viewshed(bearings) => {
                let clear = bearings.iter().filter(|b| b.obstruction.is_none()).count();
                format!("{clear}/{} bearings clear", bearings.len())
            }
        };
        Some(text)
    }
}
